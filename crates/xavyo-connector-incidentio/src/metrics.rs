//! Request counters for observability.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters kept by the client across every call it makes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestMetrics {
    /// HTTP requests sent, retries included.
    pub requests_sent: u64,
    /// Responses with status 2xx.
    pub successes: u64,
    /// 429 responses received.
    pub rate_limited_count: u64,
    /// Attempts issued after a 429 wait.
    pub retry_count: u64,
    /// Logical calls that ended in an error.
    pub failures: u64,
    /// Sum of all 429 waits in milliseconds.
    total_retry_delay_ms: u64,
    /// When the last 429 was received.
    pub last_rate_limited_at: Option<DateTime<Utc>>,
}

impl RequestMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests_sent(&mut self) {
        self.requests_sent += 1;
    }

    pub fn increment_successes(&mut self) {
        self.successes += 1;
    }

    pub fn increment_rate_limited(&mut self, at: DateTime<Utc>) {
        self.rate_limited_count += 1;
        self.last_rate_limited_at = Some(at);
    }

    /// Records one retry and the wait that preceded it.
    pub fn record_retry(&mut self, delay_ms: u64) {
        self.retry_count += 1;
        self.total_retry_delay_ms += delay_ms;
    }

    pub fn increment_failures(&mut self) {
        self.failures += 1;
    }

    /// Average wait before a retry, in milliseconds.
    #[must_use]
    pub fn average_retry_delay_ms(&self) -> f64 {
        if self.retry_count == 0 {
            0.0
        } else {
            self.total_retry_delay_ms as f64 / self.retry_count as f64
        }
    }

    /// Share of sent requests answered with 429.
    #[must_use]
    pub fn rate_limit_ratio(&self) -> f64 {
        if self.requests_sent == 0 {
            0.0
        } else {
            self.rate_limited_count as f64 / self.requests_sent as f64
        }
    }
}
