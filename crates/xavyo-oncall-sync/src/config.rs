//! Reconciliation configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{SyncError, SyncResult};

/// How a batch reacts to a per-item failure.
///
/// Consumed by both the on-call aggregator and the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    ContinueOnError,
    /// Stop starting new work after the first failure.
    FailFast,
}

/// Log level used when a guard preserves a group's membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardSeverity {
    Info,
    Warn,
}

/// How on-call users are matched to platform accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// Match the user's email against the account directory.
    #[default]
    Email,
    /// Use a pre-established incident.io user to account alias mapping.
    IdentityAlias,
}

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Width of the on-call query window starting now, in seconds (default: 60).
    #[serde(default = "default_lookahead_secs")]
    pub lookahead_secs: u64,
    /// Target groups reconciled at the same time (default: 4).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub identity_mode: IdentityMode,
    /// Lifetime of cached email resolutions, in seconds (default: 3600).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Severity when nobody is on call (default: info).
    #[serde(default = "default_shift_gap_severity")]
    pub shift_gap_severity: GuardSeverity,
    /// Severity when no on-call user resolves to an account (default: warn).
    #[serde(default = "default_unresolvable_severity")]
    pub unresolvable_severity: GuardSeverity,
    /// Compute and report diffs without mutating groups.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_lookahead_secs() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    4
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_shift_gap_severity() -> GuardSeverity {
    GuardSeverity::Info
}

fn default_unresolvable_severity() -> GuardSeverity {
    GuardSeverity::Warn
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: default_lookahead_secs(),
            max_concurrency: default_max_concurrency(),
            failure_policy: FailurePolicy::default(),
            identity_mode: IdentityMode::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            shift_gap_severity: default_shift_gap_severity(),
            unresolvable_severity: default_unresolvable_severity(),
            dry_run: false,
        }
    }
}

impl ReconciliationConfig {
    #[must_use]
    pub fn lookahead(&self) -> Duration {
        Duration::from_secs(self.lookahead_secs)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.lookahead_secs == 0 {
            return Err(SyncError::Config("lookahead_secs must be > 0".into()));
        }
        if self.max_concurrency == 0 {
            return Err(SyncError::Config("max_concurrency must be > 0".into()));
        }
        Ok(())
    }
}
