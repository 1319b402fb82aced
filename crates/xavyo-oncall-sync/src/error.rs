//! Error types for on-call synchronization.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xavyo_connector_incidentio::IncidentIoError;

/// Result type alias using `SyncError`.
pub type SyncResult<T> = Result<T, SyncError>;

/// One failed schedule in an aggregate outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleFailure {
    pub schedule_id: String,
    pub error: String,
}

impl std::fmt::Display for ScheduleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.schedule_id, self.error)
    }
}

fn join_failures(failures: &[ScheduleFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while reconciling on-call schedules.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid engine or binding configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream schedule inventory could not be listed. Fatal for a run.
    #[error("Schedule inventory unavailable: {0}")]
    Inventory(#[source] IncidentIoError),

    /// An upstream call failed while processing one schedule.
    #[error(transparent)]
    Upstream(#[from] IncidentIoError),

    /// A schedule bound to a group no longer exists upstream.
    #[error("Schedule {schedule_id} no longer exists upstream")]
    ScheduleNotFound { schedule_id: String },

    /// Identity lookup infrastructure failed (not a missing mapping).
    #[error("Identity resolution failed: {0}")]
    Resolution(String),

    /// The target group capability failed.
    #[error("Group {group_id}: {message}")]
    Group { group_id: String, message: String },

    /// Tracked schedules could not be loaded from the configuration layer.
    #[error("Tracked schedules unavailable: {0}")]
    TrackedSchedules(String),

    /// Aggregate outcome of a run in which some schedules failed.
    #[error("{} of {total} schedules failed: {}", .failures.len(), join_failures(.failures))]
    ScheduleFailures {
        failures: Vec<ScheduleFailure>,
        total: usize,
    },

    /// The caller's cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// A reconciliation task panicked or was aborted.
    #[error("Task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Builds a group capability error.
    pub fn group(group_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Group {
            group_id: group_id.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Upstream(e) | Self::Inventory(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
