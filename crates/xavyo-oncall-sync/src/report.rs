//! Reconciliation run reports.
//!
//! A run produces one [`ReconciliationResult`] per tracked schedule plus
//! totals. Reports serialize to JSON and render a short text summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

use crate::{ScheduleFailure, SyncError, SyncResult, UnresolvedUser};

/// Outcome of reconciling one tracked schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Membership was changed to match the on-call set.
    Applied,
    /// Membership already matched.
    Unchanged,
    /// A guard kept the current membership.
    Skipped,
    /// Changes were computed but not applied.
    DryRun,
    Failed,
    /// Not processed because an earlier schedule failed under fail-fast.
    NotAttempted,
}

impl ResultStatus {
    #[must_use]
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed | Self::NotAttempted)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
            Self::DryRun => "dry_run",
            Self::Failed => "failed",
            Self::NotAttempted => "not_attempted",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result for one tracked schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub schedule_id: String,
    /// Fresh upstream name, when the schedule was found.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schedule_name: Option<String>,
    /// Previously cached name, set when the schedule was renamed upstream.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_name: Option<String>,
    pub target_group_id: String,
    pub status: ResultStatus,
    /// Account ids the group should contain.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub desired_members: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub removed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub unresolved_users: Vec<UnresolvedUser>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ReconciliationResult {
    pub(crate) fn new(schedule_id: &str, target_group_id: &str) -> Self {
        Self {
            schedule_id: schedule_id.to_string(),
            schedule_name: None,
            previous_name: None,
            target_group_id: target_group_id.to_string(),
            status: ResultStatus::Unchanged,
            desired_members: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
            unresolved_users: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn fail(mut self, error: &SyncError) -> Self {
        self.status = ResultStatus::Failed;
        self.error = Some(error.to_string());
        self
    }

    pub(crate) fn not_attempted(schedule_id: &str, target_group_id: &str) -> Self {
        let mut result = Self::new(schedule_id, target_group_id);
        result.status = ResultStatus::NotAttempted;
        result.error = Some("not attempted after an earlier failure".to_string());
        result
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Counts per status and membership changes across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub schedules: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub members_added: usize,
    pub members_removed: usize,
    pub unresolved_users: usize,
}

impl RunTotals {
    fn from_results(results: &[ReconciliationResult]) -> Self {
        let mut totals = Self {
            schedules: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.status {
                ResultStatus::Applied => totals.applied += 1,
                ResultStatus::Unchanged => totals.unchanged += 1,
                ResultStatus::Skipped => totals.skipped += 1,
                ResultStatus::DryRun => totals.dry_run += 1,
                ResultStatus::Failed => totals.failed += 1,
                ResultStatus::NotAttempted => totals.not_attempted += 1,
            }
            totals.members_added += result.added.len();
            totals.members_removed += result.removed.len();
            totals.unresolved_users += result.unresolved_users.len();
        }
        totals
    }
}

/// Complete report of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub dry_run: bool,
    pub totals: RunTotals,
    /// One entry per tracked schedule, in input order.
    pub results: Vec<ReconciliationResult>,
}

impl RunReport {
    pub(crate) fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        dry_run: bool,
        results: Vec<ReconciliationResult>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            completed_at,
            dry_run,
            totals: RunTotals::from_results(&results),
            results,
        }
    }

    /// Result for `schedule_id`, if it was tracked.
    #[must_use]
    pub fn result(&self, schedule_id: &str) -> Option<&ReconciliationResult> {
        self.results.iter().find(|r| r.schedule_id == schedule_id)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results.iter().all(ReconciliationResult::is_success)
    }

    /// Every failed or unattempted schedule.
    #[must_use]
    pub fn failures(&self) -> Vec<ScheduleFailure> {
        self.results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| ScheduleFailure {
                schedule_id: r.schedule_id.clone(),
                error: r.error.clone().unwrap_or_else(|| r.status.to_string()),
            })
            .collect()
    }

    /// `Ok` when every schedule succeeded, otherwise one error listing all failures.
    pub fn outcome(&self) -> SyncResult<()> {
        let failures = self.failures();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::ScheduleFailures {
                failures,
                total: self.results.len(),
            })
        }
    }

    /// Human-readable summary, one line per schedule.
    #[must_use]
    pub fn summary(&self) -> String {
        let t = &self.totals;
        let mut out = format!(
            "Run {}{}: {} schedules, {} applied, {} unchanged, {} skipped, {} dry-run, {} failed, {} not attempted (+{} / -{} members, {} unresolved users)\n",
            self.run_id,
            if self.dry_run { " (dry run)" } else { "" },
            t.schedules,
            t.applied,
            t.unchanged,
            t.skipped,
            t.dry_run,
            t.failed,
            t.not_attempted,
            t.members_added,
            t.members_removed,
            t.unresolved_users,
        );
        for result in &self.results {
            let _ = write!(
                out,
                "  {} -> {}: {}",
                result.schedule_name.as_deref().unwrap_or(&result.schedule_id),
                result.target_group_id,
                result.status
            );
            if !result.added.is_empty() {
                let _ = write!(out, " +[{}]", result.added.join(", "));
            }
            if !result.removed.is_empty() {
                let _ = write!(out, " -[{}]", result.removed.join(", "));
            }
            if let Some(error) = &result.error {
                let _ = write!(out, " ({error})");
            }
            out.push('\n');
            for warning in &result.warnings {
                let _ = writeln!(out, "    warning: {warning}");
            }
        }
        out
    }
}
