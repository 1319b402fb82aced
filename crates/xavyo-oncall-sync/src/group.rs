//! Target group capability.
//!
//! The engine only needs to read and mutate membership of platform groups;
//! the platform's group service sits behind [`GroupMembership`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::{SyncError, SyncResult, TrackedSchedule};

/// Membership operations on platform groups. Members are account ids.
#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn get_members(&self, group_id: &str) -> SyncResult<BTreeSet<String>>;

    async fn add_members(&self, group_id: &str, account_ids: &[String]) -> SyncResult<()>;

    async fn remove_members(&self, group_id: &str, account_ids: &[String]) -> SyncResult<()>;
}

/// Source of the schedule-to-group bindings owned by the integration.
#[async_trait]
pub trait TrackedScheduleSource: Send + Sync {
    async fn tracked_schedules(&self) -> SyncResult<Vec<TrackedSchedule>>;
}

/// Fixed list of bindings.
#[derive(Debug, Clone, Default)]
pub struct StaticScheduleSource {
    schedules: Vec<TrackedSchedule>,
}

impl StaticScheduleSource {
    #[must_use]
    pub fn new(schedules: Vec<TrackedSchedule>) -> Self {
        Self { schedules }
    }
}

#[async_trait]
impl TrackedScheduleSource for StaticScheduleSource {
    async fn tracked_schedules(&self) -> SyncResult<Vec<TrackedSchedule>> {
        Ok(self.schedules.clone())
    }
}

/// A membership change applied to a [`MemoryGroupStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GroupMutation {
    Add {
        group_id: String,
        account_ids: Vec<String>,
    },
    Remove {
        group_id: String,
        account_ids: Vec<String>,
    },
}

/// In-memory group store.
///
/// Each group has its own lock so mutations of one group are serialized
/// while different groups proceed independently.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    groups: RwLock<HashMap<String, Arc<Mutex<BTreeSet<String>>>>>,
    unavailable: RwLock<HashSet<String>>,
    mutations: Mutex<Vec<GroupMutation>>,
}

impl MemoryGroupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a group with the given members.
    pub async fn insert_group<I, S>(&self, group_id: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members.into_iter().map(Into::into).collect();
        self.groups
            .write()
            .await
            .insert(group_id.to_string(), Arc::new(Mutex::new(members)));
    }

    /// Makes every operation on `group_id` fail until cleared.
    pub async fn set_unavailable(&self, group_id: &str, unavailable: bool) {
        let mut set = self.unavailable.write().await;
        if unavailable {
            set.insert(group_id.to_string());
        } else {
            set.remove(group_id);
        }
    }

    /// Current members of a group, empty if unknown.
    pub async fn members(&self, group_id: &str) -> BTreeSet<String> {
        match self.group(group_id).await {
            Some(group) => group.lock().await.clone(),
            None => BTreeSet::new(),
        }
    }

    /// Every mutation applied so far, in order.
    pub async fn mutations(&self) -> Vec<GroupMutation> {
        self.mutations.lock().await.clone()
    }

    async fn group(&self, group_id: &str) -> Option<Arc<Mutex<BTreeSet<String>>>> {
        self.groups.read().await.get(group_id).cloned()
    }

    async fn check_available(&self, group_id: &str) -> SyncResult<()> {
        if self.unavailable.read().await.contains(group_id) {
            return Err(SyncError::group(group_id, "group service unavailable"));
        }
        Ok(())
    }

    async fn existing_group(&self, group_id: &str) -> SyncResult<Arc<Mutex<BTreeSet<String>>>> {
        self.check_available(group_id).await?;
        self.group(group_id)
            .await
            .ok_or_else(|| SyncError::group(group_id, "group not found"))
    }
}

#[async_trait]
impl GroupMembership for MemoryGroupStore {
    async fn get_members(&self, group_id: &str) -> SyncResult<BTreeSet<String>> {
        let group = self.existing_group(group_id).await?;
        let members = group.lock().await.clone();
        Ok(members)
    }

    async fn add_members(&self, group_id: &str, account_ids: &[String]) -> SyncResult<()> {
        let group = self.existing_group(group_id).await?;
        let mut members = group.lock().await;
        members.extend(account_ids.iter().cloned());
        self.mutations.lock().await.push(GroupMutation::Add {
            group_id: group_id.to_string(),
            account_ids: account_ids.to_vec(),
        });
        Ok(())
    }

    async fn remove_members(&self, group_id: &str, account_ids: &[String]) -> SyncResult<()> {
        let group = self.existing_group(group_id).await?;
        let mut members = group.lock().await;
        for account_id in account_ids {
            members.remove(account_id);
        }
        self.mutations.lock().await.push(GroupMutation::Remove {
            group_id: group_id.to_string(),
            account_ids: account_ids.to_vec(),
        });
        Ok(())
    }
}
