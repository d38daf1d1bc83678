//! Exhaustive cursor-based listing of one window.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::{FetchError, SourceError};
use crate::source::BillingSource;
use crate::types::{BillingRecord, Event, Window};

/// Walks a [`BillingSource`] page by page until it reports no more pages.
///
/// Records are returned in the order the source produced them. A failed page fails
/// the whole call; there is no checkpoint to resume from.
pub struct RecordPaginator {
    source: Arc<dyn BillingSource>,
    page_size: usize,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl RecordPaginator {
    /// Create a paginator requesting `page_size` records per page
    pub fn new(source: Arc<dyn BillingSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size,
            event_tx: None,
        }
    }

    /// Report every fetched page on `event_tx`
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Fetch every record created within `window`.
    pub async fn fetch_all(&self, window: Window) -> Result<Vec<BillingRecord>, FetchError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_fetched = 0usize;

        loop {
            let page = self
                .source
                .list_page(window, cursor.as_deref(), self.page_size)
                .await
                .map_err(|source| FetchError {
                    window,
                    cursor: cursor.clone(),
                    pages_fetched,
                    source,
                })?;
            pages_fetched += 1;

            tracing::debug!(
                %window,
                page = pages_fetched,
                records = page.records.len(),
                has_more = page.has_more,
                "Fetched listing page"
            );
            if let Some(tx) = &self.event_tx {
                tx.send(Event::PageFetched {
                    window,
                    records: page.records.len(),
                    has_more: page.has_more,
                })
                .ok();
            }

            records.extend(page.records);

            if !page.has_more {
                break;
            }

            // A page that claims more data must move the cursor forward
            let problem = match page.last_id {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                    continue;
                }
                Some(_) => "cursor did not advance",
                None => "empty page reported more results",
            };
            return Err(FetchError {
                window,
                cursor,
                pages_fetched,
                source: SourceError::Malformed(problem.to_string()),
            });
        }

        tracing::info!(%window, pages = pages_fetched, records = records.len(), "Listing complete");
        Ok(records)
    }
}
