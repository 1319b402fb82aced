//! incident.io Connector for xavyo
//!
//! A read-only client for the incident.io v2 API, built to survive an
//! unreliable upstream: slow responses, oversized bodies, redirects,
//! malformed error payloads and rate limiting.
//!
//! # Features
//!
//! - Token-bucket admission control shared per integration instance
//! - 429 retries honouring `Retry-After`, with cancellable waits on an injectable clock
//! - Size-capped body reads, redirect blocking and percent-escaped path segments
//! - Cursor pagination with a hard page cap
//! - Structured error envelope decoding
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use xavyo_connector_incidentio::{IncidentIoClient, IncidentIoConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IncidentIoConfig::builder().api_key("your-api-key").build()?;
//! let client = IncidentIoClient::new(config)?;
//!
//! let cancel = CancellationToken::new();
//! for schedule in client.list_all_schedules(&cancel).await? {
//!     println!("{} ({})", schedule.name, schedule.id);
//! }
//! # Ok(())
//! # }
//! ```

mod body;
mod client;
mod clock;
mod config;
mod entries;
mod error;
mod metrics;
mod models;
mod pagination;
mod rate_limit;
mod retry;
mod schedules;
mod users;

// Re-exports
pub use body::{escape_path_segment, read_capped};
pub use client::IncidentIoClient;
pub use clock::{Clock, SystemClock};
pub use config::{
    IncidentIoConfig, IncidentIoConfigBuilder, DEFAULT_BASE_URL, DEFAULT_MAX_BODY_BYTES,
};
pub use error::{
    ApiError, FieldError, IncidentIoError, IncidentIoResult, RAW_BODY_MESSAGE_LIMIT,
    TRUNCATION_MARKER,
};
pub use metrics::RequestMetrics;
pub use models::{
    EntryUser, ListEntriesResponse, ListSchedulesResponse, ListUsersResponse, PaginationMeta,
    Schedule, ScheduleEntry, User,
};
pub use pagination::{collect_pages, Page};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::{parse_retry_after, RetryDecision, RetryPolicy, RetryState};
