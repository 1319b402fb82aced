//! File-backed binding set.
//!
//! A bindings file holds the tracked schedules together with the platform
//! state the engine needs: current group memberships, the email directory and
//! identity aliases. It is loaded into the in-memory stores for one run and
//! can be written back with refreshed memberships and schedule names.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use xavyo_connector_incidentio::IncidentIoClient;
use xavyo_oncall_sync::{
    IdentityMode, IdentityResolver, MemoryAccountDirectory, MemoryAliasStore, MemoryGroupStore,
    MemoryResolutionCache, ReconciliationConfig, RunReport, TrackedSchedule,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingsFile {
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    pub tracked_schedules: Vec<TrackedSchedule>,
    /// Group id to member account ids.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    /// Email to account id, used in email mode.
    #[serde(default)]
    pub accounts: BTreeMap<String, String>,
    /// incident.io user id to account id, used in identity alias mode.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl BindingsFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bindings file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("failed to parse bindings file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut raw = serde_json::to_string_pretty(self)?;
        raw.push('\n');
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write bindings file {}", path.display()))
    }

    /// Group store seeded with the file's memberships. Target groups
    /// missing from the file start empty.
    pub async fn group_store(&self) -> Arc<MemoryGroupStore> {
        let store = Arc::new(MemoryGroupStore::new());
        for (group_id, members) in &self.groups {
            store.insert_group(group_id, members.iter().cloned()).await;
        }
        for tracked in &self.tracked_schedules {
            if !self.groups.contains_key(&tracked.target_group_id) {
                store
                    .insert_group(&tracked.target_group_id, Vec::<String>::new())
                    .await;
            }
        }
        store
    }

    /// Resolver for the configured identity mode.
    pub async fn resolver(
        &self,
        client: &IncidentIoClient,
        config: &ReconciliationConfig,
    ) -> IdentityResolver {
        match config.identity_mode {
            IdentityMode::Email => {
                let directory = Arc::new(MemoryAccountDirectory::new());
                for (email, account_id) in &self.accounts {
                    directory.insert(email, account_id).await;
                }
                IdentityResolver::email(directory)
                    .with_cache(Arc::new(MemoryResolutionCache::new()), config.cache_ttl())
                    .with_user_lookup(client.clone())
            }
            IdentityMode::IdentityAlias => {
                let aliases = Arc::new(MemoryAliasStore::new());
                for (user_id, account_id) in &self.aliases {
                    aliases.insert(user_id, account_id).await;
                }
                IdentityResolver::identity_alias(aliases).with_user_lookup(client.clone())
            }
        }
    }

    /// Copies refreshed schedule names and current memberships back into the file.
    pub async fn apply_report(&mut self, report: &RunReport, groups: &MemoryGroupStore) {
        for tracked in &mut self.tracked_schedules {
            if tracked.is_all_on_call() {
                continue;
            }
            if let Some(name) = report
                .result(&tracked.schedule_id)
                .and_then(|r| r.schedule_name.clone())
            {
                tracked.cached_name = Some(name);
            }
        }

        let group_ids: Vec<String> = self
            .tracked_schedules
            .iter()
            .map(|t| t.target_group_id.clone())
            .chain(self.groups.keys().cloned())
            .collect();
        for group_id in group_ids {
            let members = groups.members(&group_id).await.into_iter().collect();
            self.groups.insert(group_id, members);
        }
    }
}
