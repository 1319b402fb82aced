//! Time source used for retry backoff.
//!
//! The client never calls `tokio::time::sleep` directly for backoff waits; it
//! goes through a [`Clock`] so tests can observe and skip the waits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of wall-clock time and suspension.
#[async_trait]
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspends the caller for `duration`.
    ///
    /// Callers race this future against their cancellation token, so an
    /// implementation only needs to be cancel-safe when dropped.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the system time and the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
