//! Run orchestration across one or more windows.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchDownloader;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::ArtifactFetcher;
use crate::paginator::RecordPaginator;
use crate::path_resolver;
use crate::source::{BillingSource, StripeSource};
use crate::transport::{ArtifactTransport, HttpTransport};
use crate::types::{Event, RunResult, Window};

/// Lists and downloads windows strictly one after another.
///
/// Cheap to share behind an `Arc`; [`subscribe`](Self::subscribe) and
/// [`cancel`](Self::cancel) may be called from other tasks while a run is going.
pub struct RunCoordinator {
    config: Arc<Config>,
    paginator: RecordPaginator,
    downloader: BatchDownloader,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl RunCoordinator {
    /// Build a coordinator talking to the configured billing API over HTTP
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = Arc::new(StripeSource::new(&config.source, config.retry.clone())?);
        let transport = Arc::new(HttpTransport::new(&config.source)?);
        Self::with_collaborators(config, source, transport)
    }

    /// Build a coordinator around explicit collaborators
    pub fn with_collaborators(
        config: Config,
        source: Arc<dyn BillingSource>,
        transport: Arc<dyn ArtifactTransport>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(config.download.event_channel_capacity);
        let cancel_token = CancellationToken::new();

        let paginator =
            RecordPaginator::new(source, config.download.page_size).with_events(event_tx.clone());
        let fetcher = ArtifactFetcher::new(transport, config.download.partial_suffix.clone());
        let downloader = BatchDownloader::new(fetcher, event_tx.clone(), cancel_token.clone());

        Ok(Self {
            config: Arc::new(config),
            paginator,
            downloader,
            event_tx,
            cancel_token,
        })
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Stop after the batch currently in flight
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Download every artifact for the given calendar years using the configured
    /// destination and parallelism
    pub async fn download_years(&self, years: &[i32]) -> Result<Vec<RunResult>> {
        let windows = years
            .iter()
            .map(|&year| path_resolver::year_window(year))
            .collect::<Result<Vec<_>>>()?;
        self.run_for_windows(
            &windows,
            &self.config.download.download_dir,
            self.config.download.parallel_downloads,
        )
        .await
    }

    /// Process each window in order: list it completely, then download its records.
    ///
    /// A listing failure aborts this and every later window; the returned
    /// [`Error::Fetch`] still carries the results of the windows already finished.
    /// Download failures are counted in the window's [`RunResult`] and never abort
    /// the run.
    pub async fn run_for_windows(
        &self,
        windows: &[Window],
        root: &Path,
        parallelism: usize,
    ) -> Result<Vec<RunResult>> {
        let mut results = Vec::with_capacity(windows.len());

        for &window in windows {
            if self.cancel_token.is_cancelled() {
                tracing::warn!(%window, "Run cancelled, skipping remaining windows");
                break;
            }

            tracing::info!(%window, root = %root.display(), parallelism, "Processing window");
            self.event_tx.send(Event::WindowStarted { window }).ok();

            let records = match self.paginator.fetch_all(window).await {
                Ok(records) => records,
                Err(source) => {
                    tracing::error!(
                        %window,
                        error = %source,
                        completed_windows = results.len(),
                        "Listing failed, aborting run"
                    );
                    return Err(Error::Fetch {
                        completed: results,
                        source,
                    });
                }
            };
            self.event_tx
                .send(Event::RecordsListed {
                    window,
                    total: records.len(),
                })
                .ok();

            let mut result = self.downloader.run(&records, root, parallelism).await?;
            result.window = Some(window);

            tracing::info!(
                %window,
                downloaded = result.downloaded,
                skipped = result.skipped,
                no_artifact = result.no_artifact,
                failed = result.failed,
                cancelled = result.cancelled,
                "Window complete"
            );
            self.event_tx
                .send(Event::WindowComplete {
                    window,
                    result: result.clone(),
                })
                .ok();

            let cancelled = result.cancelled;
            results.push(result);
            if cancelled {
                break;
            }
        }

        Ok(results)
    }
}
