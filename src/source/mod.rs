//! Listing API abstraction
//!
//! [`BillingSource`] is the only remote dependency of the pagination pipeline.
//! [`StripeSource`] talks to the Stripe invoices endpoint; tests substitute
//! in-memory implementations.

mod stripe;

pub use stripe::StripeSource;

use crate::error::SourceError;
use crate::types::{BillingRecord, Window};

/// One page of the listing endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Validated records in API order
    pub records: Vec<BillingRecord>,
    /// Whether another page follows
    pub has_more: bool,
    /// Identifier of the last item on the page, used as the next cursor
    ///
    /// Refers to the last raw item carrying an id, even when validation rejected it.
    pub last_id: Option<String>,
}

/// Abstraction over the remote listing endpoint, enabling testability.
#[async_trait::async_trait]
pub trait BillingSource: Send + Sync {
    /// List up to `page_size` records created within `window`, starting after `cursor`.
    async fn list_page(
        &self,
        window: Window,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Page, SourceError>;
}
