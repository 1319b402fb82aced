//! Cursor-following pagination with a hard page cap.

use std::future::Future;
use tracing::debug;

use crate::{IncidentIoError, IncidentIoResult};

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// Walks pages by calling `fetch` with the previous page's cursor until the
/// cursor comes back empty.
///
/// Fails with [`IncidentIoError::PaginationExceeded`] once `max_pages` pages
/// have been fetched and the server still returns a cursor, so a cursor that
/// never terminates cannot loop forever.
pub async fn collect_pages<T, F, Fut>(max_pages: usize, mut fetch: F) -> IncidentIoResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = IncidentIoResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    for page_number in 1..=max_pages {
        let page = fetch(cursor.take()).await?;
        debug!(
            page = page_number,
            items = page.items.len(),
            has_more = page.next.is_some(),
            "Fetched page"
        );
        items.extend(page.items);

        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(items),
        }
    }

    Err(IncidentIoError::PaginationExceeded { max_pages })
}
