//! Connector configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;
use crate::{IncidentIoError, IncidentIoResult};

/// Public incident.io API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.incident.io";

/// Hard cap on buffered response bodies (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for one incident.io integration instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct IncidentIoConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer API key. Never logged.
    pub api_key: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// End-to-end timeout of a single attempt, in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Response body cap in bytes (default: 10 MiB).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Retries after a 429, on top of the first attempt (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait used when `Retry-After` is missing or unparseable, in seconds (default: 5).
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,

    /// Page cap for cursor-following list calls (default: 100).
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Page size requested from list endpoints (default: 250).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    concat!("xavyo-oncall-sync/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_after_secs() -> u64 {
    5
}

fn default_max_pages() -> usize {
    100
}

fn default_page_size() -> u32 {
    250
}

impl std::fmt::Debug for IncidentIoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentIoConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("max_retries", &self.max_retries)
            .field("default_retry_after_secs", &self.default_retry_after_secs)
            .field("max_pages", &self.max_pages)
            .field("page_size", &self.page_size)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl IncidentIoConfig {
    /// Starts a builder with every default filled in.
    #[must_use]
    pub fn builder() -> IncidentIoConfigBuilder {
        IncidentIoConfigBuilder::default()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> IncidentIoResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(IncidentIoError::Config("api_key is required".into()));
        }
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| IncidentIoError::Config(format!("invalid base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IncidentIoError::Config(
                "base_url must use http or https".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(IncidentIoError::Config(
                "request_timeout_secs must be > 0".into(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(IncidentIoError::Config("max_body_bytes must be > 0".into()));
        }
        if self.max_pages == 0 {
            return Err(IncidentIoError::Config("max_pages must be > 0".into()));
        }
        if self.page_size == 0 {
            return Err(IncidentIoError::Config("page_size must be > 0".into()));
        }
        self.rate_limit.validate().map_err(IncidentIoError::Config)
    }
}

/// Builder for [`IncidentIoConfig`].
#[derive(Debug, Clone)]
pub struct IncidentIoConfigBuilder {
    config: IncidentIoConfig,
}

impl Default for IncidentIoConfigBuilder {
    fn default() -> Self {
        Self {
            config: IncidentIoConfig {
                base_url: default_base_url(),
                api_key: String::new(),
                user_agent: default_user_agent(),
                request_timeout_secs: default_request_timeout_secs(),
                max_body_bytes: default_max_body_bytes(),
                max_retries: default_max_retries(),
                default_retry_after_secs: default_retry_after_secs(),
                max_pages: default_max_pages(),
                page_size: default_page_size(),
                rate_limit: RateLimitConfig::default(),
            },
        }
    }
}

impl IncidentIoConfigBuilder {
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    #[must_use]
    pub fn default_retry_after_secs(mut self, secs: u64) -> Self {
        self.config.default_retry_after_secs = secs;
        self
    }

    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = page_size;
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> IncidentIoResult<IncidentIoConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
