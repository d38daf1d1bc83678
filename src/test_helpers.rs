//! Shared in-memory collaborators for unit tests.

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{SourceError, TransportError};
use crate::source::{BillingSource, Page};
use crate::transport::{ArtifactTransport, ByteStream};
use crate::types::{BillingRecord, Window};

/// Build a record with a PDF URL under `https://files.test/`
pub(crate) fn record(id: &str, number: &str, created_at: i64) -> BillingRecord {
    BillingRecord {
        id: id.to_string(),
        number: number.to_string(),
        created_at,
        artifact_url: Some(format!("https://files.test/{id}.pdf")),
    }
}

/// Body the mock transport serves for a record id
pub(crate) fn body_for(id: &str) -> Vec<u8> {
    format!("%PDF-1.4 {id}").into_bytes()
}

/// How the mock transport answers a URL
#[derive(Clone)]
pub(crate) enum Reply {
    /// Serve the bytes in two chunks
    Body(Vec<u8>),
    /// Fail before any byte arrives
    Refuse,
    /// Deliver some bytes, then fail
    BreakMidStream(Vec<u8>),
}

/// Transport serving canned replies; unknown URLs get [`body_for`] of the file stem.
#[derive(Default)]
pub(crate) struct MockTransport {
    replies: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    delay: Option<std::time::Duration>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hold every download open for `delay` so overlap can be observed
    pub(crate) fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn reply(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), reply);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ArtifactTransport for MockTransport {
    async fn stream_download(&self, url: &str) -> Result<ByteStream, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self.replies.lock().unwrap().get(url).cloned();
        let reply = reply.unwrap_or_else(|| {
            let stem = url
                .rsplit('/')
                .next()
                .unwrap_or(url)
                .trim_end_matches(".pdf");
            Reply::Body(body_for(stem))
        });

        match reply {
            Reply::Body(body) => {
                let (head, tail) = body.split_at(body.len() / 2);
                let chunks = vec![
                    Ok(Bytes::copy_from_slice(head)),
                    Ok(Bytes::copy_from_slice(tail)),
                ];
                Ok(stream::iter(chunks).boxed())
            }
            Reply::Refuse => Err(TransportError::Other(format!(
                "connection refused: {url}"
            ))),
            Reply::BreakMidStream(partial) => {
                let chunks = vec![
                    Ok(Bytes::from(partial)),
                    Err(TransportError::Other("connection reset".to_string())),
                ];
                Ok(stream::iter(chunks).boxed())
            }
        }
    }
}

/// Source serving a fixed list of pages, chained by cursor.
pub(crate) struct MockSource {
    pages: Vec<Vec<BillingRecord>>,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<(Window, Option<String>, usize)>>,
}

impl MockSource {
    pub(crate) fn new(pages: Vec<Vec<BillingRecord>>) -> Self {
        Self {
            pages,
            fail_on_call: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the `n`-th request (zero-based)
    pub(crate) fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// `(window, cursor, page_size)` of every request so far
    pub(crate) fn calls(&self) -> Vec<(Window, Option<String>, usize)> {
        self.calls.lock().unwrap().clone()
    }

    /// Records split into pages of `page_size`
    pub(crate) fn paged(records: Vec<BillingRecord>, page_size: usize) -> Self {
        Self::new(records.chunks(page_size).map(<[_]>::to_vec).collect())
    }
}

#[async_trait::async_trait]
impl BillingSource for MockSource {
    async fn list_page(
        &self,
        window: Window,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Page, SourceError> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((window, cursor.map(str::to_string), page_size));
            calls.len() - 1
        };
        if self.fail_on_call == Some(call_index) {
            return Err(SourceError::Api {
                status: 500,
                message: "internal error".to_string(),
            });
        }

        let index = match cursor {
            None => 0,
            Some(cursor) => {
                self.pages
                    .iter()
                    .position(|page| page.last().is_some_and(|r| r.id == cursor))
                    .map(|i| i + 1)
                    .unwrap_or(self.pages.len())
            }
        };

        let records = self.pages.get(index).cloned().unwrap_or_default();
        Ok(Page {
            last_id: records.last().map(|r| r.id.clone()),
            has_more: index + 1 < self.pages.len(),
            records,
        })
    }
}
