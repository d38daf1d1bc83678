//! Full runs through the public API with in-memory collaborators.

mod common;

use common::{InMemorySource, InMemoryTransport, MID_2023, files_in, invoice, pdf_body};
use invoice_dl::{AttemptOutcome, Config, Error, Event, RunCoordinator};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn config_for(dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.to_path_buf();
    config.download.parallel_downloads = 2;
    config.download.page_size = 2;
    config
}

/// Five invoices in 2023: the third has no PDF, the fifth fails to download
fn five_invoices(transport: &InMemoryTransport) -> Vec<invoice_dl::BillingRecord> {
    let mut records: Vec<_> = (1..=5)
        .map(|i| invoice(&format!("in_{i}"), &format!("000{i}"), MID_2023 + i * 86_400))
        .collect();
    records[2].artifact_url = None;
    transport.fail(records[4].artifact_url.as_deref().unwrap());
    records
}

#[tokio::test]
async fn test_year_with_missing_and_failing_pdfs() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let source = Arc::new(InMemorySource::new(five_invoices(&transport)));
    let coordinator =
        RunCoordinator::with_collaborators(config_for(dir.path()), source, transport.clone())
            .unwrap();

    let results = coordinator.download_years(&[2023]).await.unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.downloaded, 3);
    assert_eq!(result.skipped, 0);
    assert_eq!(result.no_artifact, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.failures[0].record_id, "in_5");
    assert!(!result.is_complete());

    assert_eq!(
        files_in(&dir.path().join("2023")),
        vec![
            "2023-06-16-0001.pdf",
            "2023-06-17-0002.pdf",
            "2023-06-19-0004.pdf"
        ]
    );
    let written = std::fs::read(dir.path().join("2023/2023-06-16-0001.pdf")).unwrap();
    assert_eq!(written, pdf_body("https://files.test/in_1.pdf"));
}

#[tokio::test]
async fn test_rerun_skips_existing_and_retries_failures() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let source = Arc::new(InMemorySource::new(five_invoices(&transport)));
    let coordinator =
        RunCoordinator::with_collaborators(config_for(dir.path()), source, transport.clone())
            .unwrap();

    coordinator.download_years(&[2023]).await.unwrap();
    let downloads_after_first = transport.downloads();

    let second = coordinator.download_years(&[2023]).await.unwrap();

    assert_eq!(second[0].skipped, 3);
    assert_eq!(second[0].downloaded, 0);
    assert_eq!(second[0].no_artifact, 1);
    assert_eq!(second[0].failed, 1);
    // Only the failed invoice is requested again
    assert_eq!(transport.downloads(), downloads_after_first + 1);
    assert_eq!(files_in(&dir.path().join("2023")).len(), 3);
}

#[tokio::test]
async fn test_empty_year_downloads_nothing() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let source = Arc::new(InMemorySource::new(vec![invoice("in_1", "0001", MID_2023)]));
    let coordinator = RunCoordinator::with_collaborators(
        config_for(dir.path()),
        source.clone(),
        transport.clone(),
    )
    .unwrap();

    let results = coordinator.download_years(&[2021]).await.unwrap();

    assert_eq!(results[0].processed(), 0);
    assert!(results[0].is_complete());
    assert_eq!(source.requests(), 1);
    assert_eq!(transport.downloads(), 0);
    assert!(!dir.path().join("2021").exists());
}

#[tokio::test]
async fn test_events_describe_the_run() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let source = Arc::new(InMemorySource::new(five_invoices(&transport)));
    let coordinator =
        RunCoordinator::with_collaborators(config_for(dir.path()), source, transport).unwrap();
    let mut events = coordinator.subscribe();

    coordinator.download_years(&[2023]).await.unwrap();

    let mut pages = 0;
    let mut listed = None;
    let mut batches = 0;
    let mut failed = Vec::new();
    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::PageFetched { .. } => pages += 1,
            Event::RecordsListed { total, .. } => listed = Some(total),
            Event::BatchStarted { .. } => batches += 1,
            Event::DownloadAttempted {
                record_id,
                outcome: AttemptOutcome::Failed { .. },
                ..
            } => failed.push(record_id),
            Event::WindowComplete { .. } => completed += 1,
            _ => {}
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(listed, Some(5));
    assert_eq!(batches, 3);
    assert_eq!(failed, vec!["in_5".to_string()]);
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_year_outside_calendar_range_rejected() {
    let dir = tempdir().unwrap();
    let coordinator = RunCoordinator::with_collaborators(
        config_for(dir.path()),
        Arc::new(InMemorySource::new(Vec::new())),
        Arc::new(InMemoryTransport::new()),
    )
    .unwrap();

    let err = coordinator.download_years(&[i32::MAX]).await.unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}
