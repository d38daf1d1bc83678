//! Configuration types for invoice-dl
//!
//! Every component receives its settings explicitly at construction; nothing is
//! read from process-wide state.

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Largest page the listing API accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// Download behavior configuration (destination, concurrency, pagination)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root of the year-partitioned tree (default: ".")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Downloads in flight per batch (default: 5)
    #[serde(default = "default_parallel_downloads")]
    pub parallel_downloads: usize,

    /// Records requested per listing page (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Suffix appended to in-progress files before they are renamed into place (default: "part")
    #[serde(default = "default_partial_suffix")]
    pub partial_suffix: String,

    /// Capacity of the progress event channel (default: 1024)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            parallel_downloads: default_parallel_downloads(),
            page_size: default_page_size(),
            partial_suffix: default_partial_suffix(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Listing API connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the billing API (default: "https://api.stripe.com")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Secret API key; never serialized
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Retry configuration for transient listing failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Retry policy that fails on the first error
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Main configuration for [`RunCoordinator`](crate::coordinator::RunCoordinator)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Destination and concurrency settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Listing API settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Retry policy for listing requests
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check invariants that components rely on
    pub fn validate(&self) -> Result<()> {
        if self.download.parallel_downloads == 0 {
            return Err(Error::config(
                "parallel_downloads",
                "parallel_downloads must be at least 1",
            ));
        }
        if self.download.page_size == 0 || self.download.page_size > MAX_PAGE_SIZE {
            return Err(Error::config(
                "page_size",
                format!("page_size must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if self.download.download_dir.as_os_str().is_empty() {
            return Err(Error::config(
                "download_dir",
                "download_dir must not be empty",
            ));
        }
        if self.download.partial_suffix.is_empty() {
            return Err(Error::config(
                "partial_suffix",
                "partial_suffix must not be empty",
            ));
        }
        if self.download.event_channel_capacity == 0 {
            return Err(Error::config(
                "event_channel_capacity",
                "event_channel_capacity must be at least 1",
            ));
        }
        if url::Url::parse(&self.source.api_base).is_err() {
            return Err(Error::config(
                "api_base",
                format!("api_base is not a valid URL: {}", self.source.api_base),
            ));
        }
        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_parallel_downloads() -> usize {
    5
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_partial_suffix() -> String {
    "part".to_string()
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
