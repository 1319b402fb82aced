//! Reconciliation engine.
//!
//! Drives one run: lists the upstream schedule inventory, then reconciles
//! every tracked schedule into its target group. Target groups are processed
//! concurrently up to `max_concurrency`; schedules sharing a group run one
//! after another so a group never sees interleaved mutations.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use xavyo_connector_incidentio::{IncidentIoClient, Schedule};

use crate::{
    FailurePolicy, GroupMembership, GuardSeverity, IdentityResolver, OnCallAggregator,
    ReconciliationConfig, ReconciliationResult, Resolution, ResultStatus, RunReport,
    ScheduleFailure, SyncError, SyncResult, TrackedSchedule, TrackedScheduleSource,
};

/// Display name reported for the all-on-call binding.
pub const ALL_ON_CALL_NAME: &str = "All on-call users";

/// Upstream schedules listed at the start of a run.
#[derive(Debug, Default)]
struct Inventory {
    schedules: Vec<Schedule>,
    by_id: HashMap<String, usize>,
}

impl Inventory {
    fn new(schedules: Vec<Schedule>) -> Self {
        let by_id = schedules
            .iter()
            .enumerate()
            .map(|(index, s)| (s.id.clone(), index))
            .collect();
        Self { schedules, by_id }
    }

    fn get(&self, id: &str) -> Option<&Schedule> {
        self.by_id.get(id).map(|&index| &self.schedules[index])
    }

    fn ids(&self) -> Vec<String> {
        self.schedules.iter().map(|s| s.id.clone()).collect()
    }
}

type GroupBatch = (String, Vec<(usize, TrackedSchedule)>);

/// Groups tracked schedules by target group, keeping first-seen order.
fn group_by_target(tracked: &[TrackedSchedule]) -> Vec<GroupBatch> {
    let mut batches: Vec<GroupBatch> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, schedule) in tracked.iter().enumerate() {
        let group_id = schedule.target_group_id.as_str();
        match positions.get(group_id) {
            Some(&position) => batches[position].1.push((index, schedule.clone())),
            None => {
                positions.insert(group_id, batches.len());
                batches.push((group_id.to_string(), vec![(index, schedule.clone())]));
            }
        }
    }
    batches
}

fn log_guard(severity: GuardSeverity, message: &str) {
    match severity {
        GuardSeverity::Info => info!("{message}"),
        GuardSeverity::Warn => warn!("{message}"),
    }
}

/// Reconciles tracked schedules into platform groups.
#[derive(Clone)]
pub struct ReconciliationEngine {
    client: IncidentIoClient,
    aggregator: OnCallAggregator,
    resolver: Arc<IdentityResolver>,
    groups: Arc<dyn GroupMembership>,
    config: ReconciliationConfig,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Creates an engine after validating `config`.
    pub fn new(
        client: IncidentIoClient,
        resolver: IdentityResolver,
        groups: Arc<dyn GroupMembership>,
        config: ReconciliationConfig,
    ) -> SyncResult<Self> {
        config.validate()?;
        let aggregator =
            OnCallAggregator::new(client.clone(), config.lookahead(), config.failure_policy);
        Ok(Self {
            client,
            aggregator,
            resolver: Arc::new(resolver),
            groups,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Loads the tracked schedules from `source` and runs them.
    pub async fn run_from_source(
        &self,
        source: &dyn TrackedScheduleSource,
        cancel: &CancellationToken,
    ) -> SyncResult<RunReport> {
        let tracked = source.tracked_schedules().await?;
        self.run(&tracked, cancel).await
    }

    /// Runs one reconciliation pass over `tracked`.
    ///
    /// Fails as a whole only when the schedule inventory cannot be listed or
    /// the run is cancelled. Per-schedule failures are recorded in the report;
    /// use [`RunReport::outcome`] to turn them into an error.
    pub async fn run(
        &self,
        tracked: &[TrackedSchedule],
        cancel: &CancellationToken,
    ) -> SyncResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = self.client.clock().now();
        info!(
            %run_id,
            schedules = tracked.len(),
            dry_run = self.config.dry_run,
            "Starting on-call reconciliation"
        );

        let inventory = self.client.list_all_schedules(cancel).await.map_err(|e| {
            if e.is_cancelled() {
                SyncError::Cancelled
            } else {
                error!(%run_id, error = %e, "Failed to list schedule inventory");
                SyncError::Inventory(e)
            }
        })?;
        let inventory = Arc::new(Inventory::new(inventory));

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let halted = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for (group_id, batch) in group_by_target(tracked) {
            if batch.len() > 1 {
                warn!(
                    group_id = %group_id,
                    schedules = batch.len(),
                    "Several schedules target one group; they are applied in turn"
                );
            }
            let engine = self.clone();
            let inventory = inventory.clone();
            let semaphore = semaphore.clone();
            let halted = halted.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let permit = tokio::select! {
                    () = cancel.cancelled() => return Vec::new(),
                    permit = semaphore.acquire_owned() => permit,
                };
                let Ok(_permit) = permit else {
                    return Vec::new();
                };
                engine.reconcile_batch(batch, &inventory, &halted, &cancel).await
            });
        }

        let mut slots: Vec<Option<ReconciliationResult>> = vec![None; tracked.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(results) => {
                    for (index, result) in results {
                        slots[index] = Some(result);
                    }
                }
                Err(e) => error!(%run_id, error = %e, "Reconciliation task panicked"),
            }
        }

        if cancel.is_cancelled() {
            warn!(%run_id, "On-call reconciliation cancelled");
            return Err(SyncError::Cancelled);
        }

        let results = slots
            .into_iter()
            .zip(tracked)
            .map(|(slot, schedule)| {
                slot.unwrap_or_else(|| {
                    ReconciliationResult::new(&schedule.schedule_id, &schedule.target_group_id)
                        .fail(&SyncError::Task("reconciliation task did not complete".into()))
                })
            })
            .collect();

        let report = RunReport::new(
            run_id,
            started_at,
            self.client.clock().now(),
            self.config.dry_run,
            results,
        );
        info!(
            %run_id,
            applied = report.totals.applied,
            unchanged = report.totals.unchanged,
            skipped = report.totals.skipped,
            failed = report.totals.failed,
            not_attempted = report.totals.not_attempted,
            "On-call reconciliation completed"
        );
        Ok(report)
    }

    /// Reconciles the schedules of one target group in order.
    async fn reconcile_batch(
        &self,
        batch: Vec<(usize, TrackedSchedule)>,
        inventory: &Inventory,
        halted: &AtomicBool,
        cancel: &CancellationToken,
    ) -> Vec<(usize, ReconciliationResult)> {
        let mut results = Vec::with_capacity(batch.len());
        for (index, tracked) in batch {
            if halted.load(Ordering::SeqCst) {
                results.push((
                    index,
                    ReconciliationResult::not_attempted(
                        &tracked.schedule_id,
                        &tracked.target_group_id,
                    ),
                ));
                continue;
            }

            let result = self.reconcile_schedule(&tracked, inventory, cancel).await;
            if !result.is_success() && self.config.failure_policy == FailurePolicy::FailFast {
                halted.store(true, Ordering::SeqCst);
            }
            results.push((index, result));
        }
        results
    }

    #[instrument(
        skip(self, tracked, inventory, cancel),
        fields(schedule_id = %tracked.schedule_id, group_id = %tracked.target_group_id)
    )]
    async fn reconcile_schedule(
        &self,
        tracked: &TrackedSchedule,
        inventory: &Inventory,
        cancel: &CancellationToken,
    ) -> ReconciliationResult {
        let mut result =
            ReconciliationResult::new(&tracked.schedule_id, &tracked.target_group_id);
        match self.reconcile_into(tracked, inventory, &mut result, cancel).await {
            Ok(()) => {
                debug!(status = %result.status, "Schedule reconciled");
                result
            }
            Err(e) => {
                warn!(error = %e, "Schedule reconciliation failed");
                result.fail(&e)
            }
        }
    }

    async fn reconcile_into(
        &self,
        tracked: &TrackedSchedule,
        inventory: &Inventory,
        result: &mut ReconciliationResult,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        if tracked.target_group_id.is_empty() {
            return Err(SyncError::Config("tracked schedule has no target group".into()));
        }

        let users = if tracked.is_all_on_call() {
            result.schedule_name = Some(ALL_ON_CALL_NAME.to_string());
            let ids = inventory.ids();
            let aggregate = self.aggregator.collect(&ids, cancel).await;
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            if !aggregate.is_complete() {
                // Partial data would evict users of the failed schedules.
                let mut failures: Vec<ScheduleFailure> = aggregate
                    .failures
                    .iter()
                    .map(|f| ScheduleFailure {
                        schedule_id: f.schedule_id.clone(),
                        error: f.error.to_string(),
                    })
                    .collect();
                failures.extend(aggregate.not_attempted.iter().map(|id| ScheduleFailure {
                    schedule_id: id.clone(),
                    error: "not attempted after an earlier failure".to_string(),
                }));
                return Err(SyncError::ScheduleFailures {
                    failures,
                    total: ids.len(),
                });
            }
            aggregate.union()
        } else {
            let schedule =
                inventory
                    .get(&tracked.schedule_id)
                    .ok_or_else(|| SyncError::ScheduleNotFound {
                        schedule_id: tracked.schedule_id.clone(),
                    })?;
            result.schedule_name = Some(schedule.name.clone());
            if let Some(cached) = tracked.cached_name.as_deref() {
                if cached != schedule.name {
                    info!(previous = cached, current = %schedule.name, "Schedule renamed upstream");
                    result.previous_name = Some(cached.to_string());
                    result
                        .warnings
                        .push(format!("schedule renamed from '{cached}' to '{}'", schedule.name));
                }
            }
            self.aggregator
                .on_call_users(&tracked.schedule_id, cancel)
                .await?
        };

        if users.is_empty() {
            let message = "no users on call; membership left unchanged";
            log_guard(self.config.shift_gap_severity, message);
            result.status = ResultStatus::Skipped;
            result.warnings.push(message.to_string());
            return Ok(());
        }

        let mut desired = Vec::with_capacity(users.len());
        let mut seen = HashSet::new();
        for user in &users {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            match self.resolver.resolve(user, cancel).await? {
                Resolution::Resolved(member) => {
                    if seen.insert(member.target_account_id.clone()) {
                        desired.push(member.target_account_id);
                    }
                }
                Resolution::Unresolvable(unresolved) => {
                    debug!(
                        user_id = %unresolved.user_id,
                        reason = %unresolved.reason,
                        "On-call user has no platform account"
                    );
                    result.unresolved_users.push(unresolved);
                }
            }
        }

        if desired.is_empty() {
            let message = format!(
                "none of {} on-call users resolved to an account; membership left unchanged",
                users.len()
            );
            log_guard(self.config.unresolvable_severity, &message);
            result.status = ResultStatus::Skipped;
            result.warnings.push(message);
            return Ok(());
        }
        if !result.unresolved_users.is_empty() {
            result.warnings.push(format!(
                "{} on-call users could not be resolved",
                result.unresolved_users.len()
            ));
        }

        let current = self.groups.get_members(&tracked.target_group_id).await?;
        let desired_set: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
        let to_add: Vec<String> = desired
            .iter()
            .filter(|account| !current.contains(*account))
            .cloned()
            .collect();
        let to_remove: Vec<String> = current
            .iter()
            .filter(|account| !desired_set.contains(account.as_str()))
            .cloned()
            .collect();

        result.desired_members = desired_set.iter().map(|s| (*s).to_string()).collect();

        if to_add.is_empty() && to_remove.is_empty() {
            result.status = ResultStatus::Unchanged;
            return Ok(());
        }

        if self.config.dry_run {
            info!(add = ?to_add, remove = ?to_remove, "Dry run: membership changes not applied");
            result.added = to_add;
            result.removed = to_remove;
            result.status = ResultStatus::DryRun;
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // Additions first so a failed removal never leaves the group short.
        if !to_add.is_empty() {
            self.groups
                .add_members(&tracked.target_group_id, &to_add)
                .await?;
            result.added = to_add;
        }
        if !to_remove.is_empty() {
            self.groups
                .remove_members(&tracked.target_group_id, &to_remove)
                .await?;
            result.removed = to_remove;
        }

        info!(
            added = result.added.len(),
            removed = result.removed.len(),
            "Group membership updated"
        );
        result.status = ResultStatus::Applied;
        Ok(())
    }
}
