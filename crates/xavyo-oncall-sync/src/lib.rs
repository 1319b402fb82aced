//! On-call Synchronization for xavyo
//!
//! Mirrors incident.io on-call schedules into platform access groups so that
//! whoever is on call right now holds the group's entitlements.
//!
//! # Features
//!
//! - Per-schedule reconciliation with failure isolation
//! - Union of every schedule through the `*` binding
//! - Email or identity-alias matching of upstream users to accounts
//! - Guards that keep membership during shift gaps and identity outages
//! - Dry runs and JSON-serializable run reports
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use xavyo_connector_incidentio::{IncidentIoClient, IncidentIoConfig};
//! use xavyo_oncall_sync::{
//!     IdentityResolver, MemoryAccountDirectory, MemoryGroupStore, ReconciliationConfig,
//!     ReconciliationEngine, TrackedSchedule,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = IncidentIoClient::new(IncidentIoConfig::builder().api_key("key").build()?)?;
//! let groups = Arc::new(MemoryGroupStore::new());
//! let resolver = IdentityResolver::email(Arc::new(MemoryAccountDirectory::new()));
//!
//! let engine =
//!     ReconciliationEngine::new(client, resolver, groups, ReconciliationConfig::default())?;
//! let tracked = vec![TrackedSchedule::new("01HSCHEDULE", "oncall-primary")];
//!
//! let report = engine.run(&tracked, &CancellationToken::new()).await?;
//! println!("{}", report.summary());
//! report.outcome()?;
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod config;
mod engine;
mod error;
mod group;
mod identity;
mod model;
mod report;

// Re-exports
pub use aggregator::{AggregateOnCall, OnCallAggregator, ScheduleFetchFailure, ScheduleOnCall};
pub use config::{FailurePolicy, GuardSeverity, IdentityMode, ReconciliationConfig};
pub use engine::{ReconciliationEngine, ALL_ON_CALL_NAME};
pub use error::{ScheduleFailure, SyncError, SyncResult};
pub use group::{
    GroupMembership, GroupMutation, MemoryGroupStore, StaticScheduleSource, TrackedScheduleSource,
};
pub use identity::{
    AccountDirectory, AliasStore, IdentityResolver, MemoryAccountDirectory, MemoryAliasStore,
    MemoryResolutionCache, ResolutionCache,
};
pub use model::{
    OnCallUser, Resolution, ResolutionMethod, ResolvedMember, TrackedSchedule, UnresolvedUser,
    ALL_ON_CALL,
};
pub use report::{ReconciliationResult, ResultStatus, RunReport, RunTotals};
