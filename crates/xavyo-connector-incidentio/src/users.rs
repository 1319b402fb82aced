//! User operations.

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::body::escape_path_segment;
use crate::models::{GetUserResponse, ListUsersResponse, User};
use crate::pagination::{collect_pages, Page};
use crate::schedules::page_query;
use crate::{IncidentIoClient, IncidentIoError, IncidentIoResult};

impl IncidentIoClient {
    /// Fetches one user by id.
    ///
    /// A user deleted upstream yields a `NotFound` root error.
    #[instrument(skip(self, cancel))]
    pub async fn get_user(&self, id: &str, cancel: &CancellationToken) -> IncidentIoResult<User> {
        const OPERATION: &str = "get user";
        if id.is_empty() {
            return Err(
                IncidentIoError::InvalidRequest("user ID is required".into())
                    .with_operation(OPERATION),
            );
        }
        let path = format!(
            "/v2/users/{}",
            escape_path_segment(id).map_err(|e| e.with_operation(OPERATION))?
        );
        self.get_json::<GetUserResponse>(&path, &[], cancel)
            .await
            .map(|r| r.user)
            .map_err(|e| e.with_operation(OPERATION))
    }

    /// Fetches one page of users. A `page_size` of 0 uses the server default.
    #[instrument(skip(self, cancel))]
    pub async fn list_users(
        &self,
        page_size: u32,
        after: Option<&str>,
        cancel: &CancellationToken,
    ) -> IncidentIoResult<ListUsersResponse> {
        self.get_json("/v2/users", &page_query(page_size, after), cancel)
            .await
            .map_err(|e| e.with_operation("list users"))
    }

    /// Fetches every user, following cursors up to the configured page cap.
    #[instrument(skip(self, cancel))]
    pub async fn list_all_users(&self, cancel: &CancellationToken) -> IncidentIoResult<Vec<User>> {
        let page_size = self.config().page_size;
        let users = collect_pages(self.config().max_pages, |after| async move {
            let response = self.list_users(page_size, after.as_deref(), cancel).await?;
            Ok(Page {
                next: response.pagination_meta.next_cursor().map(str::to_string),
                items: response.users,
            })
        })
        .await
        .map_err(|e| e.or_operation("list users"))?;

        debug!(count = users.len(), "Listed users");
        Ok(users)
    }
}
