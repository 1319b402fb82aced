//! Domain types shared by the aggregator, resolver and engine.

use serde::{Deserialize, Serialize};
use xavyo_connector_incidentio::EntryUser;

/// Schedule id meaning "every schedule in the upstream inventory".
pub const ALL_ON_CALL: &str = "*";

/// Binding of one upstream schedule to the platform group that mirrors it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSchedule {
    pub schedule_id: String,
    pub target_group_id: String,
    /// Schedule name as last seen upstream, refreshed on every run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_name: Option<String>,
}

impl TrackedSchedule {
    pub fn new(schedule_id: impl Into<String>, target_group_id: impl Into<String>) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            target_group_id: target_group_id.into(),
            cached_name: None,
        }
    }

    #[must_use]
    pub fn with_cached_name(mut self, name: impl Into<String>) -> Self {
        self.cached_name = Some(name.into());
        self
    }

    /// Whether this binding mirrors the union of all schedules.
    #[must_use]
    pub fn is_all_on_call(&self) -> bool {
        self.schedule_id == ALL_ON_CALL
    }
}

/// An upstream user currently on call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnCallUser {
    pub user_id: String,
    pub name: String,
    /// May be empty when the entry snapshot carries no email.
    pub email: String,
}

impl From<EntryUser> for OnCallUser {
    fn from(user: EntryUser) -> Self {
        Self {
            user_id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

/// How an on-call user was matched to a platform account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Email,
    IdentityAlias,
}

/// An on-call user matched to a platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMember {
    pub user_id: String,
    pub target_account_id: String,
    pub method: ResolutionMethod,
}

/// An on-call user with no platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedUser {
    pub user_id: String,
    pub reason: String,
}

/// Outcome of resolving one user. Infrastructure failures are errors, not variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedMember),
    Unresolvable(UnresolvedUser),
}
