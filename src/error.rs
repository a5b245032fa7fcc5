use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a failure, used for exit codes and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied something unusable: a malformed address, secret, digest or config.
    InvalidInput,
    /// The operation ran fine but the thing asked for does not exist.
    NotFound,
    /// Network, filesystem or store failure; retrying later may succeed.
    Io,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InvalidInput => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::Io => 4,
        }
    }
}

/// Configuration errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to parse {what}: {reason}")]
    Malformed { what: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("image error for {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{failed} of {total} conversions failed")]
    ConversionFailed { failed: usize, total: usize },

    #[error("failed to encode QR code: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] rusqlite::Error),
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::InvalidInput(_) | Error::Qr(_) => ErrorKind::InvalidInput,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Http { source, .. } => match source.status() {
                Some(status) if status == reqwest::StatusCode::NOT_FOUND => ErrorKind::NotFound,
                _ => ErrorKind::Io,
            },
            Error::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                _ => ErrorKind::Io,
            },
            Error::Image { source, .. } => match source {
                image::ImageError::IoError(_) => ErrorKind::Io,
                _ => ErrorKind::InvalidInput,
            },
            Error::Malformed { .. } | Error::ConversionFailed { .. } | Error::Warehouse(_) => {
                ErrorKind::Io
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = Error::io(
            "reading ranges",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.kind().exit_code(), 3);
    }

    #[test]
    fn denied_file_is_io() {
        let err = Error::io(
            "writing output",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn malformed_documents_are_io() {
        let err = Error::Malformed {
            what: "https://example.test/ranges.json".into(),
            reason: "expected value at line 1 column 1".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.kind().exit_code(), 4);
    }

    #[test]
    fn failed_conversions_are_io() {
        let err = Error::ConversionFailed { failed: 1, total: 3 };
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "1 of 3 conversions failed");
    }

    #[test]
    fn config_errors_are_invalid_input() {
        let err: Error = ConfigError::InvalidValue {
            field: "http.timeout_secs",
            reason: "must be greater than 0".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("http.timeout_secs"));
    }
}
