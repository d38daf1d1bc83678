//! # invoice-dl
//!
//! Bulk downloader for billing invoice PDFs.
//!
//! A run lists every invoice created in a time window (typically one calendar year)
//! through a cursor-paginated API, then downloads each invoice's PDF into a
//! date-partitioned tree:
//!
//! ```text
//! {download_dir}/{year}/{year}-{MM}-{DD}-{number}.pdf
//! ```
//!
//! Re-running is cheap: files already present are skipped, and every file is
//! written under a temporary name and renamed into place only once complete.
//!
//! ## Quick Start
//!
//! ```no_run
//! use invoice_dl::{Config, RunCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.source.api_key = "sk_live_...".to_string();
//!     config.download.download_dir = "./invoices".into();
//!
//!     let coordinator = RunCoordinator::new(config)?;
//!
//!     // Subscribe to progress events
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     for result in coordinator.download_years(&[2023, 2024]).await? {
//!         println!("{} downloaded, {} failed", result.downloaded, result.failed);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch partitioning and bounded-parallel downloading
pub mod batch;
/// Configuration types
pub mod config;
/// Window-by-window run orchestration
pub mod coordinator;
/// Error types
pub mod error;
/// Single-artifact download
pub mod fetcher;
/// Cursor-based listing
pub mod paginator;
/// Destination path derivation
pub mod path_resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Listing API abstraction and Stripe implementation
pub mod source;
/// Artifact byte streaming
pub mod transport;
/// Core types and events
pub mod types;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use batch::BatchDownloader;
pub use config::{Config, DownloadConfig, RetryConfig, SourceConfig};
pub use coordinator::RunCoordinator;
pub use error::{DownloadError, Error, FetchError, Result, SourceError, TransportError};
pub use fetcher::ArtifactFetcher;
pub use paginator::RecordPaginator;
pub use source::{BillingSource, Page, StripeSource};
pub use transport::{ArtifactTransport, ByteStream, HttpTransport};
pub use types::{
    AttemptOutcome, BillingRecord, DownloadFailure, DownloadOutcome, DownloadTarget, Event,
    RunResult, SkipReason, Window,
};

/// Run `coordinator` for `years`, cancelling between batches on Ctrl+C / SIGTERM.
///
/// The batch in flight when the signal arrives is allowed to finish, so no file is
/// left half-written.
pub async fn run_with_shutdown(
    coordinator: &RunCoordinator,
    years: &[i32],
) -> Result<Vec<RunResult>> {
    let token = coordinator.cancellation_token();
    let watcher = tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::warn!("Stopping after the current batch");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });

    let result = coordinator.download_years(years).await;
    watcher.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal");
                }
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Failed to register SIGINT handler, using SIGTERM only");
            sigterm.recv().await;
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Failed to register SIGTERM handler, using SIGINT only");
            sigint.recv().await;
        }
        (Err(e1), Err(e2)) => {
            tracing::warn!(
                sigterm_error = %e1,
                sigint_error = %e2,
                "Failed to register signal handlers, falling back to ctrl_c"
            );
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl_c");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl_c");
        std::future::pending::<()>().await;
    }
}
