//! Core types for invoice-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::DownloadError;

/// Billing record as returned by the listing API
///
/// Validated at the fetch boundary; never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Unique identifier, also used as the pagination cursor
    pub id: String,
    /// Sequential display number embedded in the filename
    pub number: String,
    /// Creation time in Unix seconds; decides the year partition
    pub created_at: i64,
    /// Downloadable artifact (PDF), absent for some records
    pub artifact_url: Option<String>,
}

/// Half-open time range `[start, end)` in Unix seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive lower bound
    pub start: i64,
    /// Exclusive upper bound
    pub end: i64,
}

impl Window {
    /// Create a window from Unix-second bounds
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whether `timestamp` falls inside the window
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A record paired with where its artifact lands on disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Source record
    pub record: BillingRecord,
    /// Year partition directory (`{root}/{year}`)
    pub directory: PathBuf,
    /// `{year}-{month}-{day}-{number}.pdf`
    pub filename: String,
}

impl DownloadTarget {
    /// Full destination path
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// Why a download was skipped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// A completed file is already at the destination
    AlreadyExists,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyExists => write!(f, "already-exists"),
        }
    }
}

/// Successful outcome of one fetch attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// Artifact streamed to disk
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
    /// Nothing fetched
    Skipped {
        /// Reason for skipping
        reason: SkipReason,
    },
    /// The record has no artifact URL
    NoArtifact,
}

/// Outcome of a download attempt as reported to progress subscribers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Artifact streamed to disk
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
    /// Nothing fetched
    Skipped {
        /// Reason for skipping
        reason: SkipReason,
    },
    /// The record has no artifact URL
    NoArtifact,
    /// Transport or write failure
    Failed {
        /// Error message
        error: String,
    },
}

impl From<&std::result::Result<DownloadOutcome, DownloadError>> for AttemptOutcome {
    fn from(result: &std::result::Result<DownloadOutcome, DownloadError>) -> Self {
        match result {
            Ok(DownloadOutcome::Downloaded { bytes }) => {
                AttemptOutcome::Downloaded { bytes: *bytes }
            }
            Ok(DownloadOutcome::Skipped { reason }) => AttemptOutcome::Skipped { reason: *reason },
            Ok(DownloadOutcome::NoArtifact) => AttemptOutcome::NoArtifact,
            Err(e) => AttemptOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptOutcome::Downloaded { bytes } => write!(f, "downloaded {bytes} bytes"),
            AttemptOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            AttemptOutcome::NoArtifact => write!(f, "no PDF available"),
            AttemptOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// A failed download, kept with enough detail for a manual retry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFailure {
    /// Record identifier
    pub record_id: String,
    /// Display number of the record
    pub number: String,
    /// Underlying cause
    pub error: String,
}

/// Aggregate outcome of processing one window
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Window this result belongs to (set by the coordinator)
    pub window: Option<Window>,
    /// Artifacts written during this run
    pub downloaded: usize,
    /// Artifacts already present on disk
    pub skipped: usize,
    /// Records without an artifact
    pub no_artifact: usize,
    /// Records whose download failed
    pub failed: usize,
    /// Bytes written across all downloads
    pub bytes_written: u64,
    /// Details for every failed record, in listing order
    pub failures: Vec<DownloadFailure>,
    /// The run stopped between batches because it was cancelled
    pub cancelled: bool,
}

impl RunResult {
    /// Fold one attempt into the counters
    pub fn record(
        &mut self,
        record: &BillingRecord,
        result: std::result::Result<DownloadOutcome, DownloadError>,
    ) {
        match result {
            Ok(DownloadOutcome::Downloaded { bytes }) => {
                self.downloaded += 1;
                self.bytes_written += bytes;
            }
            Ok(DownloadOutcome::Skipped { .. }) => self.skipped += 1,
            Ok(DownloadOutcome::NoArtifact) => self.no_artifact += 1,
            Err(e) => {
                self.failed += 1;
                self.failures.push(DownloadFailure {
                    record_id: record.id.clone(),
                    number: record.number.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Number of records processed
    pub fn processed(&self) -> usize {
        self.downloaded + self.skipped + self.no_artifact + self.failed
    }

    /// No download failed and the run was not cut short
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Listing of a window started
    WindowStarted {
        /// Window being processed
        window: Window,
    },

    /// One listing page arrived
    PageFetched {
        /// Window being listed
        window: Window,
        /// Records on this page
        records: usize,
        /// Whether more pages follow
        has_more: bool,
    },

    /// Listing finished; downloads are about to start
    RecordsListed {
        /// Window being processed
        window: Window,
        /// Total records in the window
        total: usize,
    },

    /// A batch of concurrent downloads started
    BatchStarted {
        /// Zero-based batch index
        index: usize,
        /// Total number of batches
        batches: usize,
        /// Records in this batch
        size: usize,
    },

    /// One download attempt finished
    DownloadAttempted {
        /// Record identifier
        record_id: String,
        /// Display number of the record
        number: String,
        /// What happened
        outcome: AttemptOutcome,
    },

    /// A window finished
    WindowComplete {
        /// Window processed
        window: Window,
        /// Aggregate result
        result: RunResult,
    },
}
