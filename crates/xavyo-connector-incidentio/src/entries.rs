//! Schedule entry (on-call assignment) operations.

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::models::{ListEntriesResponse, ScheduleEntry};
use crate::pagination::{collect_pages, Page};
use crate::{IncidentIoClient, IncidentIoError, IncidentIoResult};

const OPERATION: &str = "list schedule entries";

fn entries_query(
    schedule_id: &str,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    after: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![("schedule_id", schedule_id.to_string())];
    if let Some(start) = window_start {
        query.push((
            "entry_window_start",
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }
    if let Some(end) = window_end {
        query.push((
            "entry_window_end",
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }
    if let Some(after) = after.filter(|a| !a.is_empty()) {
        query.push(("after", after.to_string()));
    }
    query
}

impl IncidentIoClient {
    /// Lists entries of `schedule_id` overlapping the given window, across all pages.
    ///
    /// An empty `schedule_id` is rejected before any request is sent. Omitted
    /// window bounds are left to the server's defaults.
    #[instrument(skip(self, cancel))]
    pub async fn list_entries(
        &self,
        schedule_id: &str,
        window_start: Option<DateTime<Utc>>,
        window_end: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> IncidentIoResult<Vec<ScheduleEntry>> {
        if schedule_id.is_empty() {
            return Err(IncidentIoError::InvalidRequest("schedule ID is required".into())
                .with_operation(OPERATION));
        }

        let entries = collect_pages(self.config().max_pages, |after| async move {
            let query = entries_query(schedule_id, window_start, window_end, after.as_deref());
            let response: ListEntriesResponse = self
                .get_json("/v2/schedule_entries", &query, cancel)
                .await?;
            Ok(Page {
                next: response.pagination_meta.next_cursor().map(str::to_string),
                items: response.schedule_entries,
            })
        })
        .await
        .map_err(|e| e.with_operation(OPERATION))?;

        debug!(schedule_id, count = entries.len(), "Listed schedule entries");
        Ok(entries)
    }
}
