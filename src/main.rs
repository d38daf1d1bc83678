use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use invoice_dl::{Config, Event, RunCoordinator, RunResult, run_with_shutdown};

/// Environment variable holding the billing API secret key
const API_KEY_VAR: &str = "STRIPE_SECRET_KEY";

#[derive(Debug, Parser)]
#[command(name = "invoice-dl", version, about = "Download invoice PDFs by year")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download invoices for one or more years
    Download {
        /// Year to download invoices for (repeatable)
        #[arg(long = "year", required = true)]
        years: Vec<i32>,

        /// Root directory of the year-partitioned tree
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Downloads in flight at once
        #[arg(long)]
        parallel: Option<usize>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,invoice_dl=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(
    dir: Option<PathBuf>,
    parallel: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<Config, String> {
    let mut config = match config_path {
        Some(path) => Config::from_file(&path).map_err(|e| e.to_string())?,
        None => Config::default(),
    };

    config.source.api_key = std::env::var(API_KEY_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| format!("Please set {API_KEY_VAR} in your environment or .env file"))?;
    if let Some(dir) = dir {
        config.download.download_dir = dir;
    }
    if let Some(parallel) = parallel {
        config.download.parallel_downloads = parallel;
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn print_summary(result: &RunResult) {
    let window = result
        .window
        .map(|w| w.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{window}: {} downloaded, {} skipped, {} without PDF, {} failed",
        result.downloaded, result.skipped, result.no_artifact, result.failed
    );
    for failure in &result.failures {
        println!(
            "  failed Invoice-{} ({}): {}",
            failure.number, failure.record_id, failure.error
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the variable may come from the environment
    let _ = dotenvy::dotenv();
    init_logging();

    let Cli { command } = Cli::parse();
    let Command::Download {
        years,
        dir,
        parallel,
        config,
    } = command;

    let config = match build_config(dir, parallel, config) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let coordinator = match RunCoordinator::new(config) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            eprintln!("Error downloading invoices: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut events = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::DownloadAttempted { number, outcome, .. }) => {
                    println!("Invoice-{number}: {outcome}");
                }
                Ok(Event::WindowComplete { result, .. }) => print_summary(&result),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Progress output fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = run_with_shutdown(&coordinator, &years).await;
    drop(coordinator);
    let _ = printer.await;

    match outcome {
        Ok(results) if results.iter().all(RunResult::is_complete) => {
            println!("All invoices downloaded!");
            ExitCode::SUCCESS
        }
        Ok(_) => {
            eprintln!("Some invoices were not downloaded; re-run to retry them");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error downloading invoices: {e}");
            ExitCode::FAILURE
        }
    }
}
