//! Batched, bounded-parallel downloading of a listed record set.
//!
//! Records are cut into consecutive batches of `parallelism` records. Batches run one
//! after another; inside a batch every fetch runs concurrently and the batch completes
//! only when all of them have. Peak in-flight downloads therefore never exceed
//! `parallelism`.

use futures::future::join_all;
use std::path::Path;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::{DownloadError, Error, Result};
use crate::fetcher::ArtifactFetcher;
use crate::path_resolver;
use crate::retry::IsRetryable;
use crate::types::{AttemptOutcome, BillingRecord, DownloadOutcome, Event, RunResult};

/// Split `records` into consecutive, non-overlapping groups of at most `size`.
///
/// Order is preserved and concatenating the groups yields `records` exactly.
/// A `size` of zero is treated as one.
pub fn partition<T>(records: &[T], size: usize) -> Vec<&[T]> {
    records.chunks(size.max(1)).collect()
}

/// Drives [`ArtifactFetcher`] over a record set, one batch at a time.
pub struct BatchDownloader {
    fetcher: ArtifactFetcher,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl BatchDownloader {
    /// Create a downloader reporting progress on `event_tx` and stopping between
    /// batches once `cancel_token` fires
    pub fn new(
        fetcher: ArtifactFetcher,
        event_tx: broadcast::Sender<Event>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            event_tx,
            cancel_token,
        }
    }

    /// Download every record's artifact under `root`.
    ///
    /// Individual failures are recorded in the result and never abort the run.
    pub async fn run(
        &self,
        records: &[BillingRecord],
        root: &Path,
        parallelism: usize,
    ) -> Result<RunResult> {
        if parallelism == 0 {
            return Err(Error::config(
                "parallel_downloads",
                "parallelism must be at least 1",
            ));
        }

        let batches = partition(records, parallelism);
        let batch_count = batches.len();
        let mut result = RunResult::default();

        for (index, batch) in batches.into_iter().enumerate() {
            if self.cancel_token.is_cancelled() {
                tracing::warn!(
                    completed_batches = index,
                    remaining_batches = batch_count - index,
                    "Run cancelled, not starting further batches"
                );
                result.cancelled = true;
                break;
            }

            tracing::debug!(
                batch = index,
                batches = batch_count,
                size = batch.len(),
                "Starting batch"
            );
            self.event_tx
                .send(Event::BatchStarted {
                    index,
                    batches: batch_count,
                    size: batch.len(),
                })
                .ok();

            let attempts = batch.iter().map(|record| self.attempt(record, root));
            for (record, outcome) in batch.iter().zip(join_all(attempts).await) {
                result.record(record, outcome);
            }
        }

        Ok(result)
    }

    /// Fetch one record and report the attempt as soon as it finishes
    async fn attempt(
        &self,
        record: &BillingRecord,
        root: &Path,
    ) -> std::result::Result<DownloadOutcome, DownloadError> {
        let target = path_resolver::resolve(record, root);
        let outcome = self.fetcher.fetch(&target).await;

        if let Err(e) = &outcome {
            let transient = match e {
                DownloadError::Transport { source, .. } => source.is_retryable(),
                DownloadError::Write { .. } => false,
            };
            tracing::error!(
                record_id = %record.id,
                number = %record.number,
                error = %e,
                transient,
                "Artifact download failed"
            );
        }

        self.event_tx
            .send(Event::DownloadAttempted {
                record_id: record.id.clone(),
                number: record.number.clone(),
                outcome: AttemptOutcome::from(&outcome),
            })
            .ok();

        outcome
    }
}
