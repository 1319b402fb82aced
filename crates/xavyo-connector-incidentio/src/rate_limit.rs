//! Token-bucket admission control for outbound incident.io requests.
//!
//! One [`RateLimiter`] belongs to one integration instance and is shared by
//! every request that instance issues. The bucket's burst always equals its
//! refill rate: several instances may draw from the same account-wide upstream
//! quota, so a single instance must never burst above its sustained rate.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::{IncidentIoError, IncidentIoResult};

/// Configuration for request admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second, also the bucket capacity (default: 20).
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_requests_per_second() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl RateLimitConfig {
    /// Creates a config with a custom rate.
    #[must_use]
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            requests_per_second,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.requests_per_second == 0 {
            return Err("requests_per_second must be > 0".to_string());
        }
        Ok(())
    }
}

/// Bucket state: available tokens and the instant they were last topped up.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(tokens_per_second: u32) -> Self {
        Self {
            tokens: f64::from(tokens_per_second),
            capacity: f64::from(tokens_per_second),
            refill_rate: f64::from(tokens_per_second),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes a token, or returns how long until one is available.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let wait_secs = (1.0 - self.tokens) / self.refill_rate;
            Err(Duration::from_secs_f64(wait_secs))
        }
    }
}

/// Shared token bucket, safe for concurrent acquisition.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Creates a limiter with a full bucket.
    pub fn new(config: RateLimitConfig) -> Result<Self, String> {
        config.validate()?;
        let bucket = Mutex::new(TokenBucket::new(config.requests_per_second));
        Ok(Self { config, bucket })
    }

    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Waits for a token.
    ///
    /// Returns [`IncidentIoError::Cancelled`] as soon as `cancel` fires, even
    /// in the middle of a wait.
    pub async fn acquire(&self, cancel: &CancellationToken) -> IncidentIoResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(IncidentIoError::Cancelled);
            }

            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.try_acquire() {
                    Ok(()) => return Ok(()),
                    Err(wait) => wait,
                }
            };

            trace!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit token");
            tokio::select! {
                () = cancel.cancelled() => return Err(IncidentIoError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Tokens currently available, after refill.
    pub async fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_config_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.requests_per_second, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(RateLimitConfig::new(0).validate().is_err());
        assert!(RateLimiter::new(RateLimitConfig::new(0)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_equals_rate() {
        let limiter = RateLimiter::new(RateLimitConfig::new(5)).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Sixth token needs one refill interval (1/5 s).
        limiter.acquire(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_rate() {
        let limiter = RateLimiter::new(RateLimitConfig::new(10)).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        // 10 from the bucket, 20 more at 10/s.
        for _ in 0..30 {
            limiter.acquire(&cancel).await.unwrap();
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1990), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(2200), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_never_exceeds_capacity() {
        let limiter = RateLimiter::new(RateLimitConfig::new(4)).unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.available_tokens().await <= 4.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new(1)).unwrap());
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };

        tokio::task::yield_now().await;
        cancel.cancel();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(IncidentIoError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_fails_fast() {
        let limiter = RateLimiter::new(RateLimitConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            limiter.acquire(&cancel).await,
            Err(IncidentIoError::Cancelled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquisition_shares_bucket() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new(20)).unwrap());
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move { limiter.acquire(&cancel).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // 20 immediately, 20 more over one second.
        assert!(start.elapsed() >= Duration::from_millis(950));
    }
}
