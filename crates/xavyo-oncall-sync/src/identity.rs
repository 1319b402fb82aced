//! Mapping of upstream on-call users to platform accounts.
//!
//! Two mutually exclusive strategies are supported. Email matching looks the
//! user's email up in the account directory, optionally through a TTL cache.
//! Alias matching uses a pre-established user id to account id mapping.
//!
//! A user with no account is *unresolvable* and simply left out of the
//! desired membership. Failures of the lookup infrastructure itself are
//! returned as errors and fail the schedule being processed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use xavyo_connector_incidentio::IncidentIoClient;

use crate::{
    IdentityMode, OnCallUser, Resolution, ResolutionMethod, ResolvedMember, SyncError,
    SyncResult, UnresolvedUser,
};

/// Platform account directory keyed by email.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Account id owning `email`, if any.
    async fn find_account_by_email(&self, email: &str) -> SyncResult<Option<String>>;
}

/// Pre-established incident.io user id to account id mapping.
#[async_trait]
pub trait AliasStore: Send + Sync {
    async fn account_for_user(&self, user_id: &str) -> SyncResult<Option<String>>;
}

/// Cache of email resolutions.
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    async fn get(&self, email: &str) -> SyncResult<Option<String>>;

    async fn put(&self, email: &str, account_id: &str, ttl: Duration) -> SyncResult<()>;
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

enum Strategy {
    Email {
        directory: Arc<dyn AccountDirectory>,
        cache: Option<Arc<dyn ResolutionCache>>,
        cache_ttl: Duration,
    },
    IdentityAlias {
        aliases: Arc<dyn AliasStore>,
    },
}

/// Resolves on-call users to platform accounts.
pub struct IdentityResolver {
    strategy: Strategy,
    user_lookup: Option<IncidentIoClient>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("mode", &self.mode())
            .field("hydrates_users", &self.user_lookup.is_some())
            .finish()
    }
}

impl IdentityResolver {
    /// Email matching against `directory`.
    pub fn email(directory: Arc<dyn AccountDirectory>) -> Self {
        Self {
            strategy: Strategy::Email {
                directory,
                cache: None,
                cache_ttl: Duration::ZERO,
            },
            user_lookup: None,
        }
    }

    /// Alias matching against `aliases`.
    pub fn identity_alias(aliases: Arc<dyn AliasStore>) -> Self {
        Self {
            strategy: Strategy::IdentityAlias { aliases },
            user_lookup: None,
        }
    }

    /// Caches email resolutions for `ttl`. Ignored in alias mode.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResolutionCache>, ttl: Duration) -> Self {
        if let Strategy::Email {
            cache: slot,
            cache_ttl,
            ..
        } = &mut self.strategy
        {
            *slot = Some(cache);
            *cache_ttl = ttl;
        }
        self
    }

    /// Fetches every on-call user's full record before resolving it.
    ///
    /// Users the upstream no longer knows are unresolvable even when a
    /// still-valid entry references them. The record's email takes
    /// precedence over the entry snapshot.
    #[must_use]
    pub fn with_user_lookup(mut self, client: IncidentIoClient) -> Self {
        self.user_lookup = Some(client);
        self
    }

    #[must_use]
    pub fn mode(&self) -> IdentityMode {
        match self.strategy {
            Strategy::Email { .. } => IdentityMode::Email,
            Strategy::IdentityAlias { .. } => IdentityMode::IdentityAlias,
        }
    }

    /// Resolves one on-call user.
    pub async fn resolve(
        &self,
        user: &OnCallUser,
        cancel: &CancellationToken,
    ) -> SyncResult<Resolution> {
        let user = match self.hydrate(user, cancel).await? {
            Ok(user) => user,
            Err(unresolved) => return Ok(Resolution::Unresolvable(unresolved)),
        };

        match &self.strategy {
            Strategy::IdentityAlias { aliases } => {
                let resolution = match aliases.account_for_user(&user.user_id).await? {
                    Some(account_id) => Resolution::Resolved(ResolvedMember {
                        user_id: user.user_id.clone(),
                        target_account_id: account_id,
                        method: ResolutionMethod::IdentityAlias,
                    }),
                    None => unresolvable(&user, "no identity alias"),
                };
                Ok(resolution)
            }
            Strategy::Email {
                directory,
                cache,
                cache_ttl,
            } => {
                if user.email.trim().is_empty() {
                    return Ok(unresolvable(&user, "no email on record"));
                }
                let key = normalize_email(&user.email);

                if let Some(cache) = cache {
                    match cache.get(&key).await {
                        Ok(Some(account_id)) => {
                            debug!(user_id = %user.user_id, "Resolved from cache");
                            return Ok(Resolution::Resolved(ResolvedMember {
                                user_id: user.user_id.clone(),
                                target_account_id: account_id,
                                method: ResolutionMethod::Email,
                            }));
                        }
                        Ok(None) => {}
                        Err(e) => debug!(error = %e, "Resolution cache read failed, treating as miss"),
                    }
                }

                let Some(account_id) = directory.find_account_by_email(&key).await? else {
                    return Ok(unresolvable(&user, "no account with matching email"));
                };

                if let Some(cache) = cache {
                    if let Err(e) = cache.put(&key, &account_id, *cache_ttl).await {
                        warn!(user_id = %user.user_id, error = %e, "Failed to cache resolution");
                    }
                }

                Ok(Resolution::Resolved(ResolvedMember {
                    user_id: user.user_id.clone(),
                    target_account_id: account_id,
                    method: ResolutionMethod::Email,
                }))
            }
        }
    }

    /// Current upstream record of `user`, or the snapshot when no lookup is configured.
    async fn hydrate(
        &self,
        user: &OnCallUser,
        cancel: &CancellationToken,
    ) -> SyncResult<Result<OnCallUser, UnresolvedUser>> {
        let Some(client) = &self.user_lookup else {
            return Ok(Ok(user.clone()));
        };

        match client.get_user(&user.user_id, cancel).await {
            Ok(full) => {
                let email = if full.email.trim().is_empty() {
                    user.email.clone()
                } else {
                    full.email
                };
                let name = if full.name.is_empty() {
                    user.name.clone()
                } else {
                    full.name
                };
                Ok(Ok(OnCallUser {
                    user_id: user.user_id.clone(),
                    name,
                    email,
                }))
            }
            Err(e) if e.is_not_found() => {
                debug!(user_id = %user.user_id, "On-call user no longer exists upstream");
                Ok(Err(unresolved(user, "user deleted upstream")))
            }
            Err(e) => Err(SyncError::Upstream(e)),
        }
    }
}

fn unresolved(user: &OnCallUser, reason: &str) -> UnresolvedUser {
    UnresolvedUser {
        user_id: user.user_id.clone(),
        reason: reason.to_string(),
    }
}

fn unresolvable(user: &OnCallUser, reason: &str) -> Resolution {
    Resolution::Unresolvable(unresolved(user, reason))
}

/// In-memory account directory. Emails match case-insensitively.
#[derive(Debug, Default)]
pub struct MemoryAccountDirectory {
    accounts: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryAccountDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, email: &str, account_id: &str) {
        self.accounts
            .write()
            .await
            .insert(normalize_email(email), account_id.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookups served so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn find_account_by_email(&self, email: &str) -> SyncResult<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SyncError::Resolution("account directory unavailable".into()));
        }
        Ok(self.accounts.read().await.get(&normalize_email(email)).cloned())
    }
}

/// In-memory alias mapping.
#[derive(Debug, Default)]
pub struct MemoryAliasStore {
    aliases: RwLock<HashMap<String, String>>,
}

impl MemoryAliasStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: &str, account_id: &str) {
        self.aliases
            .write()
            .await
            .insert(user_id.to_string(), account_id.to_string());
    }
}

#[async_trait]
impl AliasStore for MemoryAliasStore {
    async fn account_for_user(&self, user_id: &str) -> SyncResult<Option<String>> {
        Ok(self.aliases.read().await.get(user_id).cloned())
    }
}

/// In-memory TTL cache. Expired entries are dropped on read.
#[derive(Debug, Default)]
pub struct MemoryResolutionCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    reject_writes: AtomicBool,
}

impl MemoryResolutionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `put` fail.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResolutionCache for MemoryResolutionCache {
    async fn get(&self, email: &str) -> SyncResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(email) {
                Some((account_id, expires_at)) if *expires_at > now => {
                    return Ok(Some(account_id.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.entries.write().await.remove(email);
        Ok(None)
    }

    async fn put(&self, email: &str, account_id: &str, ttl: Duration) -> SyncResult<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Resolution("resolution cache is read-only".into()));
        }
        self.entries.write().await.insert(
            email.to_string(),
            (account_id.to_string(), Instant::now() + ttl),
        );
        Ok(())
    }
}
