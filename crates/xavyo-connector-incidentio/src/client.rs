//! Resilient HTTP client for the incident.io API.

use reqwest::header::{ACCEPT, LOCATION, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::body::read_capped;
use crate::clock::{Clock, SystemClock};
use crate::error::ApiError;
use crate::metrics::RequestMetrics;
use crate::rate_limit::RateLimiter;
use crate::retry::{backoff, RetryDecision, RetryPolicy, RetryState};
use crate::{IncidentIoConfig, IncidentIoError, IncidentIoResult};

/// incident.io API client.
///
/// Every request goes through the shared [`RateLimiter`]. Redirects are
/// never followed, bodies are capped and 429 responses are retried with
/// cancellation-aware waits.
#[derive(Debug, Clone)]
pub struct IncidentIoClient {
    http: reqwest::Client,
    config: Arc<IncidentIoConfig>,
    rate_limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    metrics: Arc<RwLock<RequestMetrics>>,
}

impl IncidentIoClient {
    /// Creates a client with its own rate limiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be created.
    pub fn new(config: IncidentIoConfig) -> IncidentIoResult<Self> {
        let rate_limiter = RateLimiter::new(config.rate_limit.clone())
            .map_err(|e| IncidentIoError::Config(format!("Invalid rate limit config: {e}")))?;
        Self::with_rate_limiter(config, Arc::new(rate_limiter))
    }

    /// Creates a client that draws tokens from an existing limiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be created.
    pub fn with_rate_limiter(
        config: IncidentIoConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> IncidentIoResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| IncidentIoError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            config: Arc::new(config),
            rate_limiter,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(RwLock::new(RequestMetrics::default())),
        })
    }

    /// Replaces the clock used for retry waits and window computation.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &IncidentIoConfig {
        &self.config
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Returns a snapshot of the request counters.
    pub async fn metrics(&self) -> RequestMetrics {
        self.metrics.read().await.clone()
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_retries,
            default_wait: self.config.default_retry_after(),
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> IncidentIoResult<url::Url> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = url::Url::parse(&format!("{base}{path}"))
            .map_err(|e| IncidentIoError::InvalidRequest(format!("invalid URL: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Issues an authenticated GET and decodes the JSON body.
    ///
    /// `path` must already have its caller-supplied segments escaped.
    #[instrument(skip(self, query, cancel))]
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> IncidentIoResult<T> {
        let result = self.execute(path, query, cancel).await;
        if let Err(error) = &result {
            self.metrics.write().await.increment_failures();
            debug!(error = %error, "Request failed");
        }
        result
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> IncidentIoResult<T> {
        let url = self.url(path, query)?;
        let mut state = RetryState::new(self.retry_policy());

        loop {
            self.rate_limiter.acquire(cancel).await?;

            state.record_sent();
            self.metrics.write().await.increment_requests_sent();

            let response = tokio::select! {
                () = cancel.cancelled() => return Err(IncidentIoError::Cancelled),
                response = self.send(url.clone()) => response?,
            };
            let status = response.status();

            if status.is_redirection() {
                state.on_response(status.as_u16());
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                warn!(
                    status = status.as_u16(),
                    location = location.as_deref().unwrap_or(""),
                    "Upstream answered with a redirect; not following"
                );
                return Err(IncidentIoError::RedirectBlocked {
                    status: status.as_u16(),
                    location,
                });
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                self.metrics
                    .write()
                    .await
                    .increment_rate_limited(self.clock.now());

                match state.on_rate_limited(retry_after.as_deref()) {
                    RetryDecision::Exhausted => {
                        let body = self.read_body(response, cancel).await.unwrap_or_default();
                        warn!(attempts = state.attempt, "Rate limit retries exhausted");
                        return Err(state.exhausted(ApiError::from_response(429, &body)));
                    }
                    RetryDecision::Wait(wait) => {
                        drop(response);
                        backoff(self.clock.as_ref(), wait, state.attempt, cancel).await?;
                        self.metrics
                            .write()
                            .await
                            .record_retry(wait.as_millis() as u64);
                        continue;
                    }
                }
            }

            state.on_response(status.as_u16());
            let body = self.read_body(response, cancel).await?;

            if !status.is_success() {
                let error = ApiError::from_response(status.as_u16(), &body);
                debug!(
                    status = error.status,
                    error_type = %error.error_type,
                    request_id = error.request_id.as_deref().unwrap_or(""),
                    "Upstream returned an error"
                );
                return Err(IncidentIoError::from_api_error(error));
            }

            let decoded = serde_json::from_slice(&body)
                .map_err(|e| IncidentIoError::Decode(format!("invalid response body: {e}")))?;
            self.metrics.write().await.increment_successes();
            return Ok(decoded);
        }
    }

    async fn send(&self, url: url::Url) -> IncidentIoResult<reqwest::Response> {
        let mut request = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "application/json");
        if !self.config.user_agent.is_empty() {
            request = request.header(USER_AGENT, &self.config.user_agent);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                IncidentIoError::Network(format!(
                    "request timed out after {}s",
                    self.config.request_timeout_secs
                ))
            } else {
                IncidentIoError::Network(e.to_string())
            }
        })
    }

    async fn read_body(
        &self,
        response: reqwest::Response,
        cancel: &CancellationToken,
    ) -> IncidentIoResult<bytes::Bytes> {
        tokio::select! {
            () = cancel.cancelled() => Err(IncidentIoError::Cancelled),
            body = read_capped(response, self.config.max_body_bytes) => body,
        }
    }
}
