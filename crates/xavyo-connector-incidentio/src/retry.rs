//! Retry state for rate-limited (429) responses.
//!
//! A logical call moves `Init -> Sent -> {Success | RateLimited -> Wait -> Sent | Failed}`.
//! [`RetryState`] carries the only back-edge (`Wait -> Sent`) and bounds it by
//! [`RetryPolicy::max_retries`]; the client drives the transitions.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::Clock;
use crate::error::ApiError;
use crate::{IncidentIoError, IncidentIoResult};

/// Retry limits for rate-limited responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait used when `Retry-After` is absent or not an integer.
    pub default_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            default_wait: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Total attempts a call may make.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Wait derived from a `Retry-After` header value.
    ///
    /// Only the integer-seconds form is honoured; HTTP dates and garbage fall
    /// back to [`RetryPolicy::default_wait`].
    #[must_use]
    pub fn wait_for(&self, retry_after: Option<&str>) -> Duration {
        retry_after
            .and_then(parse_retry_after)
            .map_or(self.default_wait, Duration::from_secs)
    }
}

/// Parses a `Retry-After` value in integer seconds.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}

/// What the client does after a 429.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the duration, then send again.
    Wait(Duration),
    /// No attempts left.
    Exhausted,
}

/// Per-call retry bookkeeping. Lives for one logical API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts sent so far. Never exceeds the policy's maximum.
    pub attempt: u32,
    pub last_status: Option<u16>,
    pub next_wait: Option<Duration>,
    policy: RetryPolicy,
}

impl RetryState {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            attempt: 0,
            last_status: None,
            next_wait: None,
            policy,
        }
    }

    /// Marks an attempt as sent.
    pub fn record_sent(&mut self) {
        self.attempt += 1;
        self.next_wait = None;
    }

    /// Records a 429 and decides whether another attempt is allowed.
    pub fn on_rate_limited(&mut self, retry_after: Option<&str>) -> RetryDecision {
        self.last_status = Some(429);
        if self.attempt >= self.policy.max_attempts() {
            self.next_wait = None;
            return RetryDecision::Exhausted;
        }
        let wait = self.policy.wait_for(retry_after);
        self.next_wait = Some(wait);
        RetryDecision::Wait(wait)
    }

    /// Records a terminal, non-429 status.
    pub fn on_response(&mut self, status: u16) {
        self.last_status = Some(status);
        self.next_wait = None;
    }

    /// Builds the terminal error for an exhausted call.
    #[must_use]
    pub fn exhausted(&self, last: ApiError) -> IncidentIoError {
        IncidentIoError::RetryExhausted {
            attempts: self.attempt,
            last,
        }
    }
}

/// Sleeps on `clock` for `wait`, returning early with
/// [`IncidentIoError::Cancelled`] if `cancel` fires first.
pub async fn backoff(
    clock: &dyn Clock,
    wait: Duration,
    attempt: u32,
    cancel: &CancellationToken,
) -> IncidentIoResult<()> {
    info!(
        wait_secs = wait.as_secs_f64(),
        attempt, "Rate limited, waiting before retry"
    );
    tokio::select! {
        () = cancel.cancelled() => Err(IncidentIoError::Cancelled),
        () = clock.sleep(wait) => Ok(()),
    }
}
