//! Shared in-memory collaborators for integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use invoice_dl::{
    ArtifactTransport, BillingRecord, BillingSource, ByteStream, Page, SourceError,
    TransportError, Window,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 2023-06-15 12:00:00 UTC
pub const MID_2023: i64 = 1_686_830_400;

pub fn invoice(id: &str, number: &str, created_at: i64) -> BillingRecord {
    BillingRecord {
        id: id.to_string(),
        number: number.to_string(),
        created_at,
        artifact_url: Some(format!("https://files.test/{id}.pdf")),
    }
}

pub fn pdf_body(url: &str) -> Vec<u8> {
    format!("%PDF-1.4 {url}").into_bytes()
}

/// Serves the records that fall inside the requested window, `page_size` at a time
pub struct InMemorySource {
    records: Vec<BillingRecord>,
    requests: AtomicUsize,
}

impl InMemorySource {
    pub fn new(records: Vec<BillingRecord>) -> Self {
        Self {
            records,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BillingSource for InMemorySource {
    async fn list_page(
        &self,
        window: Window,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Page, SourceError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let in_window: Vec<&BillingRecord> = self
            .records
            .iter()
            .filter(|r| window.contains(r.created_at))
            .collect();
        let start = match cursor {
            None => 0,
            Some(cursor) => in_window
                .iter()
                .position(|r| r.id == cursor)
                .map(|i| i + 1)
                .ok_or_else(|| SourceError::Malformed(format!("unknown cursor {cursor}")))?,
        };
        let end = (start + page_size).min(in_window.len());
        let records: Vec<BillingRecord> = in_window[start..end]
            .iter()
            .map(|r| (*r).clone())
            .collect();

        Ok(Page {
            last_id: records.last().map(|r| r.id.clone()),
            has_more: end < in_window.len(),
            records,
        })
    }
}

/// Serves [`pdf_body`] for every URL except the ones marked as failing
#[derive(Default)]
pub struct InMemoryTransport {
    failing: Mutex<HashSet<String>>,
    downloads: AtomicUsize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ArtifactTransport for InMemoryTransport {
    async fn stream_download(&self, url: &str) -> Result<ByteStream, TransportError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(url) {
            return Err(TransportError::Other(format!("connection reset: {url}")));
        }
        let body = Bytes::from(pdf_body(url));
        Ok(stream::iter(vec![Ok(body)]).boxed())
    }
}

/// Names of the regular files directly inside `dir`, sorted
pub fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
