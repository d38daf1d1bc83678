//! Stripe invoices listing

use serde::Deserialize;
use url::Url;

use crate::config::{RetryConfig, SourceConfig};
use crate::error::{Error, Result, SourceError};
use crate::retry::with_retry;
use crate::types::{BillingRecord, Window};

use super::{BillingSource, Page};

/// Path of the invoices listing endpoint, relative to the API base
const INVOICES_PATH: &str = "v1/invoices";

/// Raw invoice as returned by the API; only the fields we need
#[derive(Debug, Default, Deserialize)]
struct RawInvoice {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    invoice_pdf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInvoiceList {
    #[serde(default)]
    data: Vec<RawInvoice>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct RawErrorBody {
    error: RawErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RawErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl RawInvoice {
    /// Validate into a [`BillingRecord`], or explain why the item is unusable.
    fn into_record(self) -> std::result::Result<BillingRecord, String> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "missing id".to_string())?;
        let created_at = self
            .created
            .ok_or_else(|| format!("invoice {id} has no creation time"))?;
        let number = match self.number.filter(|n| !n.is_empty()) {
            Some(number) => number,
            None => {
                // Drafts have no number yet
                tracing::warn!(
                    record_id = %id,
                    "Invoice has no number, using its id in the filename"
                );
                id.clone()
            }
        };

        Ok(BillingRecord {
            id,
            number,
            created_at,
            artifact_url: self.invoice_pdf.filter(|url| !url.is_empty()),
        })
    }
}

/// Relative joins drop the last path segment unless the base ends with '/'
fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

/// [`BillingSource`] backed by the Stripe REST API
pub struct StripeSource {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    retry: RetryConfig,
}

impl StripeSource {
    /// Build a source from connection and retry settings
    pub fn new(config: &SourceConfig, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(client, config, retry)
    }

    /// Build a source around an existing HTTP client
    pub fn with_client(
        client: reqwest::Client,
        config: &SourceConfig,
        retry: RetryConfig,
    ) -> Result<Self> {
        let base = Url::parse(&with_trailing_slash(&config.api_base)).map_err(|e| {
            Error::config("api_base", format!("invalid api_base '{}': {e}", config.api_base))
        })?;
        let endpoint = base.join(INVOICES_PATH).map_err(|e| {
            Error::config("api_base", format!("invalid api_base '{}': {e}", config.api_base))
        })?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            retry,
        })
    }

    async fn request_page(
        &self,
        window: Window,
        cursor: Option<&str>,
        page_size: usize,
    ) -> std::result::Result<Page, SourceError> {
        let mut query: Vec<(&str, String)> = vec![
            ("created[gte]", window.start.to_string()),
            ("created[lt]", window.end.to_string()),
            ("limit", page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RawErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let list: RawInvoiceList = serde_json::from_slice(&body)
            .map_err(|e| SourceError::Malformed(format!("invoice list: {e}")))?;

        // Rejected items still advance the cursor; only an item without an id cannot
        let last_id = list
            .data
            .iter()
            .rev()
            .find_map(|raw| raw.id.clone().filter(|id| !id.is_empty()));
        let mut records = Vec::with_capacity(list.data.len());
        for raw in list.data {
            match raw.into_record() {
                Ok(record) => records.push(record),
                Err(reason) => {
                    tracing::warn!(reason = %reason, "Skipping malformed invoice in listing")
                }
            }
        }

        Ok(Page {
            records,
            has_more: list.has_more,
            last_id,
        })
    }
}

#[async_trait::async_trait]
impl BillingSource for StripeSource {
    async fn list_page(
        &self,
        window: Window,
        cursor: Option<&str>,
        page_size: usize,
    ) -> std::result::Result<Page, SourceError> {
        tracing::debug!(%window, cursor = ?cursor, page_size, "Requesting invoice page");
        with_retry(&self.retry, || self.request_page(window, cursor, page_size)).await
    }
}
