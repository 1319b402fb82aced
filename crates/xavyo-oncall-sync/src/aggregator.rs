//! Current on-call users per schedule.

use chrono::Duration as ChronoDuration;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use xavyo_connector_incidentio::{IncidentIoClient, IncidentIoError, IncidentIoResult};

use crate::{FailurePolicy, OnCallUser};

/// On-call users of one schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOnCall {
    pub schedule_id: String,
    pub users: Vec<OnCallUser>,
}

/// A schedule whose entries could not be fetched.
#[derive(Debug)]
pub struct ScheduleFetchFailure {
    pub schedule_id: String,
    pub error: IncidentIoError,
}

/// Result of querying several schedules.
#[derive(Debug, Default)]
pub struct AggregateOnCall {
    pub successes: Vec<ScheduleOnCall>,
    pub failures: Vec<ScheduleFetchFailure>,
    /// Schedules skipped after a failure under [`FailurePolicy::FailFast`].
    pub not_attempted: Vec<String>,
}

impl AggregateOnCall {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.not_attempted.is_empty()
    }

    /// Distinct users across all successful schedules, in first-seen order.
    #[must_use]
    pub fn union(&self) -> Vec<OnCallUser> {
        dedupe_users(self.successes.iter().flat_map(|s| s.users.iter().cloned()))
    }
}

/// Drops users without an id and collapses repeats, keeping the first occurrence.
fn dedupe_users(users: impl IntoIterator<Item = OnCallUser>) -> Vec<OnCallUser> {
    let mut seen = HashSet::new();
    users
        .into_iter()
        .filter(|u| !u.user_id.is_empty() && seen.insert(u.user_id.clone()))
        .collect()
}

/// Queries schedule entries in a short window starting now.
#[derive(Debug, Clone)]
pub struct OnCallAggregator {
    client: IncidentIoClient,
    lookahead: Duration,
    failure_policy: FailurePolicy,
}

impl OnCallAggregator {
    pub fn new(client: IncidentIoClient, lookahead: Duration, failure_policy: FailurePolicy) -> Self {
        Self {
            client,
            lookahead,
            failure_policy,
        }
    }

    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Users on call for `schedule_id` between now and now plus the lookahead.
    #[instrument(skip(self, cancel))]
    pub async fn on_call_users(
        &self,
        schedule_id: &str,
        cancel: &CancellationToken,
    ) -> IncidentIoResult<Vec<OnCallUser>> {
        let window_start = self.client.clock().now();
        let lookahead = ChronoDuration::from_std(self.lookahead)
            .map_err(|e| IncidentIoError::Config(format!("lookahead out of range: {e}")))?;
        let window_end = window_start + lookahead;

        let entries = self
            .client
            .list_entries(schedule_id, Some(window_start), Some(window_end), cancel)
            .await?;
        let users = dedupe_users(entries.into_iter().map(|e| OnCallUser::from(e.user)));

        debug!(schedule_id, count = users.len(), "Resolved on-call users");
        Ok(users)
    }

    /// On-call users for each schedule, honouring the failure policy.
    #[instrument(skip(self, schedule_ids, cancel), fields(schedules = schedule_ids.len()))]
    pub async fn collect(
        &self,
        schedule_ids: &[String],
        cancel: &CancellationToken,
    ) -> AggregateOnCall {
        let mut aggregate = AggregateOnCall::default();

        for (index, schedule_id) in schedule_ids.iter().enumerate() {
            match self.on_call_users(schedule_id, cancel).await {
                Ok(users) => aggregate.successes.push(ScheduleOnCall {
                    schedule_id: schedule_id.clone(),
                    users,
                }),
                Err(error) => {
                    warn!(schedule_id = %schedule_id, error = %error, "Failed to fetch on-call users");
                    aggregate.failures.push(ScheduleFetchFailure {
                        schedule_id: schedule_id.clone(),
                        error,
                    });
                    if self.failure_policy == FailurePolicy::FailFast {
                        aggregate.not_attempted = schedule_ids[index + 1..].to_vec();
                        break;
                    }
                }
            }
        }

        aggregate
    }
}
