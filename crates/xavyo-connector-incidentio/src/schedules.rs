//! Schedule operations.

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::body::escape_path_segment;
use crate::models::{GetScheduleResponse, ListSchedulesResponse, Schedule};
use crate::pagination::{collect_pages, Page};
use crate::{IncidentIoClient, IncidentIoResult};

pub(crate) fn page_query(page_size: u32, after: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if page_size > 0 {
        query.push(("page_size", page_size.to_string()));
    }
    if let Some(after) = after.filter(|a| !a.is_empty()) {
        query.push(("after", after.to_string()));
    }
    query
}

impl IncidentIoClient {
    /// Fetches one page of schedules. A `page_size` of 0 uses the server default.
    #[instrument(skip(self, cancel))]
    pub async fn list_schedules(
        &self,
        page_size: u32,
        after: Option<&str>,
        cancel: &CancellationToken,
    ) -> IncidentIoResult<ListSchedulesResponse> {
        self.get_json("/v2/schedules", &page_query(page_size, after), cancel)
            .await
            .map_err(|e| e.with_operation("list schedules"))
    }

    /// Fetches every schedule, following cursors up to the configured page cap.
    #[instrument(skip(self, cancel))]
    pub async fn list_all_schedules(
        &self,
        cancel: &CancellationToken,
    ) -> IncidentIoResult<Vec<Schedule>> {
        let page_size = self.config().page_size;
        let schedules = collect_pages(self.config().max_pages, |after| async move {
            let response = self.list_schedules(page_size, after.as_deref(), cancel).await?;
            Ok(Page {
                next: response.pagination_meta.next_cursor().map(str::to_string),
                items: response.schedules,
            })
        })
        .await
        .map_err(|e| e.or_operation("list schedules"))?;

        debug!(count = schedules.len(), "Listed schedules");
        Ok(schedules)
    }

    /// Fetches one schedule by id.
    #[instrument(skip(self, cancel))]
    pub async fn get_schedule(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> IncidentIoResult<Schedule> {
        const OPERATION: &str = "get schedule";
        let path = format!(
            "/v2/schedules/{}",
            escape_path_segment(id).map_err(|e| e.with_operation(OPERATION))?
        );
        self.get_json::<GetScheduleResponse>(&path, &[], cancel)
            .await
            .map(|r| r.schedule)
            .map_err(|e| e.with_operation(OPERATION))
    }
}
