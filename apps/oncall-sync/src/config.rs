//! Configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use thiserror::Error;
use xavyo_connector_incidentio::{IncidentIoConfig, RateLimitConfig, DEFAULT_BASE_URL};

use crate::logging::LogFormat;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub incidentio: IncidentIoConfig,
    /// Overrides the bindings file's `max_concurrency` when set.
    pub max_concurrency: Option<usize>,
    pub log_format: LogFormat,
    pub rust_log: String,
}

fn parse_var<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var: var.to_string(),
        message: e.to_string(),
    })
}

impl Config {
    /// Loads configuration from the environment.
    ///
    /// # Required Variables
    ///
    /// - `INCIDENTIO_API_KEY` - incident.io API key
    ///
    /// # Optional Variables
    ///
    /// - `INCIDENTIO_BASE_URL` - API base URL (default: `https://api.incident.io`)
    /// - `INCIDENTIO_RATE_LIMIT_RPS` - requests per second (default: 20)
    /// - `ONCALL_SYNC_MAX_CONCURRENCY` - concurrent target groups
    /// - `ONCALL_SYNC_LOG_FORMAT` - `json` or `pretty` (default: `json`)
    /// - `RUST_LOG` - log filter (default: `info`)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("INCIDENTIO_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("INCIDENTIO_API_KEY".to_string()))?;

        let base_url = lookup("INCIDENTIO_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let rate_limit = match lookup("INCIDENTIO_RATE_LIMIT_RPS") {
            Some(value) => RateLimitConfig::new(parse_var("INCIDENTIO_RATE_LIMIT_RPS", &value)?),
            None => RateLimitConfig::default(),
        };

        let max_concurrency = lookup("ONCALL_SYNC_MAX_CONCURRENCY")
            .map(|value| parse_var::<usize>("ONCALL_SYNC_MAX_CONCURRENCY", &value))
            .transpose()?;
        if max_concurrency == Some(0) {
            return Err(ConfigError::InvalidValue {
                var: "ONCALL_SYNC_MAX_CONCURRENCY".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        let log_format = match lookup("ONCALL_SYNC_LOG_FORMAT") {
            Some(value) => parse_var("ONCALL_SYNC_LOG_FORMAT", &value)?,
            None => LogFormat::Json,
        };

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let incidentio = IncidentIoConfig::builder()
            .api_key(api_key)
            .base_url(base_url)
            .rate_limit(rate_limit)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                var: "INCIDENTIO_*".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            incidentio,
            max_concurrency,
            log_format,
            rust_log,
        })
    }
}
