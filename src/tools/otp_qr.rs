use crate::error::{Error, Result};
use clap::ValueEnum;
use image::{GrayImage, Luma};
use qrcode::{EcLevel, QrCode};
use std::fmt;
use std::path::Path;
use tracing::info;
use url::form_urlencoded;

/// Pixels per QR module
pub const MODULE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OtpKind {
    /// Time-based one-time password
    Totp,
    /// Counter-based one-time password
    Hotp,
}

impl fmt::Display for OtpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpKind::Totp => write!(f, "totp"),
            OtpKind::Hotp => write!(f, "hotp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OtpAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl fmt::Display for OtpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpAlgorithm::Sha1 => write!(f, "SHA1"),
            OtpAlgorithm::Sha256 => write!(f, "SHA256"),
            OtpAlgorithm::Sha512 => write!(f, "SHA512"),
        }
    }
}

/// Everything needed to provision an authenticator app
#[derive(Debug, Clone)]
pub struct OtpKey {
    pub kind: OtpKind,
    pub label: String,
    pub user: String,
    pub secret: String,
    pub issuer: String,
    pub counter: Option<u64>,
    pub digits: Option<u8>,
    pub period: Option<u32>,
    pub algorithm: Option<OtpAlgorithm>,
}

impl OtpKey {
    pub fn new(
        kind: OtpKind,
        label: impl Into<String>,
        user: impl Into<String>,
        secret: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            user: user.into(),
            secret: secret.into(),
            issuer: issuer.into(),
            counter: None,
            digits: None,
            period: None,
            algorithm: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("label", &self.label), ("user", &self.user)] {
            if value.is_empty() {
                return Err(Error::InvalidInput(format!("{} must not be empty", field)));
            }
            if value.contains(':') {
                return Err(Error::InvalidInput(format!(
                    "{} must not contain ':'",
                    field
                )));
            }
        }

        if !is_base32(&self.secret) {
            return Err(Error::InvalidInput(
                "secret must be base32 (A-Z, 2-7, optional '=' padding)".into(),
            ));
        }

        if self.kind == OtpKind::Hotp && self.counter.is_none() {
            return Err(Error::InvalidInput("hotp keys require a counter".into()));
        }

        if let Some(digits) = self.digits {
            if !(6..=8).contains(&digits) {
                return Err(Error::InvalidInput("digits must be 6, 7 or 8".into()));
            }
        }

        if self.period == Some(0) {
            return Err(Error::InvalidInput("period must be greater than 0".into()));
        }

        Ok(())
    }

    /// Key URI: `otpauth://TYPE/LABEL:USER?secret=SECRET&issuer=ISSUER[&...]`
    pub fn uri(&self) -> Result<String> {
        self.validate()?;

        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("secret", &self.secret);
        query.append_pair("issuer", &self.issuer);
        if let Some(algorithm) = self.algorithm {
            query.append_pair("algorithm", &algorithm.to_string());
        }
        if let Some(digits) = self.digits {
            query.append_pair("digits", &digits.to_string());
        }
        if let Some(counter) = self.counter {
            query.append_pair("counter", &counter.to_string());
        }
        if let Some(period) = self.period {
            query.append_pair("period", &period.to_string());
        }

        Ok(format!(
            "otpauth://{}/{}:{}?{}",
            self.kind,
            encode_path_segment(&self.label),
            encode_path_segment(&self.user),
            query.finish()
        ))
    }
}

fn encode_path_segment(value: &str) -> String {
    // form encoding writes spaces as '+', which is literal in a path
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn is_base32(secret: &str) -> bool {
    let body = secret.trim_end_matches('=');
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphabetic() || ('2'..='7').contains(&c))
}

/// Encode `data` as a black-on-white QR code with high error correction
pub fn render_qr(data: &str) -> Result<GrayImage> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)?;
    Ok(code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_SIZE, MODULE_SIZE)
        .quiet_zone(true)
        .dark_color(Luma([0]))
        .light_color(Luma([255]))
        .build())
}

/// Build the key URI, render it and save the image to `output`
pub fn generate(key: &OtpKey, output: &Path) -> Result<String> {
    let uri = key.uri()?;
    let image = render_qr(&uri)?;

    image.save(output).map_err(|source| Error::Image {
        path: output.to_path_buf(),
        source,
    })?;

    info!(
        action = "saved",
        component = "otp_qr",
        path = ?output,
        width = image.width(),
        "QR code written"
    );
    Ok(uri)
}

/// Open the image in the platform viewer
pub fn show(path: &Path) -> Result<()> {
    open::that(path).map_err(|e| Error::io(format!("failed to open {}", path.display()), e))
}
