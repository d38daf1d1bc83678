//! Single-artifact download with idempotent skip and atomic placement.

use futures::StreamExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::transport::ArtifactTransport;
use crate::types::{DownloadOutcome, DownloadTarget, SkipReason};

/// Downloads one record's artifact into its resolved target.
///
/// Bytes are streamed to `{final}.{suffix}` and renamed into place only after a
/// successful `sync_all`, so an existing file at the final path is always complete.
pub struct ArtifactFetcher {
    transport: Arc<dyn ArtifactTransport>,
    partial_suffix: String,
}

impl ArtifactFetcher {
    /// Create a fetcher writing in-progress files with `partial_suffix`
    pub fn new(transport: Arc<dyn ArtifactTransport>, partial_suffix: impl Into<String>) -> Self {
        Self {
            transport,
            partial_suffix: partial_suffix.into(),
        }
    }

    /// Fetch the artifact for `target` unless it is absent or already on disk.
    pub async fn fetch(&self, target: &DownloadTarget) -> Result<DownloadOutcome, DownloadError> {
        let record = &target.record;
        let Some(url) = record.artifact_url.as_deref() else {
            tracing::info!(
                record_id = %record.id,
                number = %record.number,
                "No artifact available"
            );
            return Ok(DownloadOutcome::NoArtifact);
        };

        let write_error = |path: &Path, source: std::io::Error| DownloadError::Write {
            record_id: record.id.clone(),
            path: path.to_path_buf(),
            source,
        };

        // Idempotent; concurrent callers creating the same directory all succeed
        fs::create_dir_all(&target.directory)
            .await
            .map_err(|e| write_error(&target.directory, e))?;

        let final_path = target.path();
        if fs::try_exists(&final_path)
            .await
            .map_err(|e| write_error(&final_path, e))?
        {
            tracing::debug!(
                record_id = %record.id,
                path = %final_path.display(),
                "Artifact already exists"
            );
            return Ok(DownloadOutcome::Skipped {
                reason: SkipReason::AlreadyExists,
            });
        }

        let partial_path = partial_path(&final_path, &self.partial_suffix);
        match self.stream_into_place(target, url, &partial_path, &final_path).await {
            Ok(bytes) => {
                tracing::info!(
                    record_id = %record.id,
                    number = %record.number,
                    bytes,
                    path = %final_path.display(),
                    "Artifact downloaded"
                );
                Ok(DownloadOutcome::Downloaded { bytes })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial_path).await
                    && cleanup.kind() != std::io::ErrorKind::NotFound
                {
                    tracing::warn!(
                        path = %partial_path.display(),
                        error = %cleanup,
                        "Failed to remove partial download"
                    );
                }
                Err(e)
            }
        }
    }

    async fn stream_into_place(
        &self,
        target: &DownloadTarget,
        url: &str,
        partial_path: &Path,
        final_path: &Path,
    ) -> Result<u64, DownloadError> {
        let record_id = &target.record.id;
        let transport_error = |source| DownloadError::Transport {
            record_id: record_id.clone(),
            source,
        };
        let write_error = |path: &Path, source| DownloadError::Write {
            record_id: record_id.clone(),
            path: path.to_path_buf(),
            source,
        };

        let mut stream = self
            .transport
            .stream_download(url)
            .await
            .map_err(transport_error)?;

        let mut file = File::create(partial_path)
            .await
            .map_err(|e| write_error(partial_path, e))?;
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport_error)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| write_error(partial_path, e))?;
            written += chunk.len() as u64;
        }

        file.sync_all()
            .await
            .map_err(|e| write_error(partial_path, e))?;
        drop(file);

        fs::rename(partial_path, final_path)
            .await
            .map_err(|e| write_error(final_path, e))?;

        Ok(written)
    }
}

/// `{path}.{suffix}`, kept next to the final file so the rename stays on one filesystem
fn partial_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
