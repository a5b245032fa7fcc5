//! Configuration loading and validation.
//!
//! Every field has a default, so running without a config file is the normal
//! case. A TOML file overrides any subset of the sections below.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "scriptkit.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub ip_ranges: IpRangesConfig,
    pub covid: CovidConfig,
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset and `-v` is not passed.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "pretty".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "ScriptKit".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IpRangesConfig {
    pub url: String,
}

impl Default for IpRangesConfig {
    fn default() -> Self {
        Self {
            url: "https://ip-ranges.amazonaws.com/ip-ranges.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CovidConfig {
    pub ni_url: String,
    pub ie_url: String,
}

impl Default for CovidConfig {
    fn default() -> Self {
        Self {
            ni_url: "https://www.publichealth.hscni.net/news/covid-19-coronavirus".into(),
            ie_url: "https://www.gov.ie/en/news/7e0924-latest-updates-on-covid-19-coronavirus/"
                .into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Directory holding one SQLite file per dataset.
    pub root: PathBuf,
    pub project: String,
    pub dataset: String,
    pub table: String,
    pub location: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("warehouse"),
            project: "covid19-20200312".into(),
            dataset: "covid_collector".into(),
            table: "uki_covid19_confirmed_cases".into(),
            location: "EU".into(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] when it
    /// exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_file = Path::new(DEFAULT_CONFIG_FILE);
                if default_file.exists() {
                    Self::from_file(default_file)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content).map_err(ConfigError::Parse)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(invalid("http.timeout_secs", "must be greater than 0"));
        }
        for (field, value) in [
            ("ip_ranges.url", &self.ip_ranges.url),
            ("covid.ni_url", &self.covid.ni_url),
            ("covid.ie_url", &self.covid.ie_url),
            ("warehouse.project", &self.warehouse.project),
            ("warehouse.dataset", &self.warehouse.dataset),
            ("warehouse.table", &self.warehouse.table),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }
        // Dataset and table names end up in SQL identifiers and file names.
        for (field, value) in [
            ("warehouse.dataset", &self.warehouse.dataset),
            ("warehouse.table", &self.warehouse.table),
        ] {
            if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(field, "only letters, digits and '_' are allowed"));
            }
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(invalid(
                "logging.format",
                &format!("expected 'pretty' or 'json', got '{}'", other),
            )),
        }
    }

    /// Install the global tracing subscriber. Logs go to stderr so command
    /// output on stdout stays clean.
    pub fn init_logging(&self, verbose: bool) {
        let level: &str = if verbose { "info" } else { &self.logging.level };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        match self.logging.format.as_str() {
            "json" => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}
