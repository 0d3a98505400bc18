//! Runtime configuration following 12-factor app principles
//!
//! Everything is read from environment variables (optionally seeded from a
//! `.env` file). Service-specific settings live next to their services;
//! this struct only carries what every binary needs.

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{Error, Result};

/// Default client-side timeout for remote calls, shared by service configs
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Configuration(format!(
                "Unknown LOG_FORMAT: {}. Supported formats: pretty, json",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// tracing `EnvFilter` directive
    pub rust_log: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rust_log: "gigboard=info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Self::default();

        let log_format = match env::var("LOG_FORMAT") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.log_format,
        };

        Ok(Self {
            rust_log: env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            log_format,
        })
    }
}

/// Parse a timeout in whole seconds; zero is rejected
pub fn parse_timeout(value: &str) -> Result<u64> {
    let secs: u64 = value.trim().parse().map_err(|_| {
        Error::Configuration(format!("Timeout must be a whole number of seconds: {}", value))
    })?;
    if secs == 0 {
        return Err(Error::Configuration(
            "Timeout must be at least 1 second".to_string(),
        ));
    }
    Ok(secs)
}
