//! Error types for invoice-dl
//!
//! The taxonomy follows how failures propagate through a run:
//! - [`FetchError`] - a listing page could not be retrieved; fatal for the current
//!   window and every window after it
//! - [`DownloadError`] - one artifact could not be fetched or written; recorded in the
//!   window's [`RunResult`] and the run continues
//! - a record without an artifact URL is not an error at all
//!   (see [`DownloadOutcome::NoArtifact`](crate::types::DownloadOutcome::NoArtifact))

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{RunResult, Window};

/// Result type alias for invoice-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for invoice-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "parallel_downloads")
        key: Option<String>,
    },

    /// Listing a window failed; the run stopped there
    #[error("fetch error: {source}")]
    Fetch {
        /// Results of the windows finished before the failing one
        completed: Vec<RunResult>,
        /// Listing failure with its window and cursor
        #[source]
        source: FetchError,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while building or using an HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure reported by a [`BillingSource`](crate::source::BillingSource) for one page
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request could not be completed (timeout, connect, decode)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("API returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response body
        message: String,
    },

    /// The response could not be interpreted as a page of records
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Listing failure with the window and cursor it happened at
///
/// There is no resumption: callers re-run the whole window.
#[derive(Debug, Error)]
#[error(
    "failed to list window {window} after {pages_fetched} page(s) (cursor: {}): {source}",
    .cursor.as_deref().unwrap_or("<start>")
)]
pub struct FetchError {
    /// Window being listed
    pub window: Window,
    /// Cursor sent with the failing request (`None` for the first page)
    pub cursor: Option<String>,
    /// Pages successfully fetched before the failure
    pub pages_fetched: usize,
    /// Underlying source failure
    #[source]
    pub source: SourceError,
}

/// Failure reported by an [`ArtifactTransport`](crate::transport::ArtifactTransport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request or body stream failed
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The artifact host answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

/// Per-record download failure
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The artifact bytes could not be retrieved
    #[error("failed to fetch artifact for record {record_id}: {source}")]
    Transport {
        /// Record whose artifact failed
        record_id: String,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// The artifact could not be written to disk
    #[error("failed to write {} for record {record_id}: {source}", .path.display())]
    Write {
        /// Record whose artifact failed
        record_id: String,
        /// Path being written
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Identifier of the record that failed
    pub fn record_id(&self) -> &str {
        match self {
            DownloadError::Transport { record_id, .. } | DownloadError::Write { record_id, .. } => {
                record_id
            }
        }
    }
}
