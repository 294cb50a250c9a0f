//! Import configuration
//!
//! Tunables for the pipeline (batch size, read windows, watchdog, retries)
//! and connection settings for the Rankify API. Everything has a default and
//! can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Records per uploaded batch
pub const DEFAULT_BATCH_SIZE: usize = 3000;
/// Initial read window (1 MiB)
pub const DEFAULT_WINDOW_BYTES: usize = 1024 * 1024;
/// Smallest window the decoder backs off to (64 KiB)
pub const DEFAULT_MIN_WINDOW_BYTES: usize = 64 * 1024;
/// Rows kept for the preview sample
pub const DEFAULT_PREVIEW_LIMIT: usize = 100;
/// Idle time after which a running job is considered stalled
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 90;
/// How often the watchdog looks at the activity clock
pub const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 10;
/// Batch retries; zero means a failed batch fails the job
pub const DEFAULT_MAX_BATCH_RETRIES: u32 = 0;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
/// Per-request timeout. Longer than the stall timeout, so with defaults a
/// slow upload surfaces as a stall rather than a request timeout.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 120;

/// Read an environment variable, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Chunked decoder settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecoderConfig {
    pub window_bytes: usize,
    pub min_window_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            window_bytes: DEFAULT_WINDOW_BYTES,
            min_window_bytes: DEFAULT_MIN_WINDOW_BYTES,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_window_bytes == 0 {
            anyhow::bail!("IMPORT_MIN_WINDOW_BYTES must be greater than 0");
        }
        if self.min_window_bytes > self.window_bytes {
            anyhow::bail!(
                "IMPORT_MIN_WINDOW_BYTES ({}) must not exceed IMPORT_WINDOW_BYTES ({})",
                self.min_window_bytes,
                self.window_bytes
            );
        }
        Ok(())
    }
}

/// Stall watchdog settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub stall_timeout_secs: u64,
    pub interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            stall_timeout_secs: DEFAULT_STALL_TIMEOUT_SECS,
            interval_secs: DEFAULT_WATCHDOG_INTERVAL_SECS,
        }
    }
}

impl WatchdogConfig {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_secs == 0 {
            anyhow::bail!("IMPORT_WATCHDOG_INTERVAL_SECS must be greater than 0");
        }
        if self.interval_secs >= self.stall_timeout_secs {
            anyhow::bail!(
                "IMPORT_WATCHDOG_INTERVAL_SECS ({}) must be less than IMPORT_STALL_TIMEOUT_SECS ({})",
                self.interval_secs,
                self.stall_timeout_secs
            );
        }
        Ok(())
    }
}

/// Batch-level retry policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts per batch after the first one fails
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_BATCH_RETRIES,
            backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Everything one import job needs besides its source and sink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub preview_limit: usize,
    /// Progress callback cadence in processed rows
    pub progress_every: usize,
    pub decoder: DecoderConfig,
    pub watchdog: WatchdogConfig,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            progress_every: DEFAULT_BATCH_SIZE,
            decoder: DecoderConfig::default(),
            watchdog: WatchdogConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load pipeline settings from `IMPORT_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let batch_size = env_or("IMPORT_BATCH_SIZE", DEFAULT_BATCH_SIZE);
        let config = Self {
            batch_size,
            preview_limit: env_or("IMPORT_PREVIEW_LIMIT", DEFAULT_PREVIEW_LIMIT),
            progress_every: env_or("IMPORT_PROGRESS_EVERY", batch_size),
            decoder: DecoderConfig {
                window_bytes: env_or("IMPORT_WINDOW_BYTES", DEFAULT_WINDOW_BYTES),
                min_window_bytes: env_or("IMPORT_MIN_WINDOW_BYTES", DEFAULT_MIN_WINDOW_BYTES),
            },
            watchdog: WatchdogConfig {
                stall_timeout_secs: env_or("IMPORT_STALL_TIMEOUT_SECS", DEFAULT_STALL_TIMEOUT_SECS),
                interval_secs: env_or("IMPORT_WATCHDOG_INTERVAL_SECS", DEFAULT_WATCHDOG_INTERVAL_SECS),
            },
            retry: RetryPolicy {
                max_retries: env_or("IMPORT_MAX_BATCH_RETRIES", DEFAULT_MAX_BATCH_RETRIES),
                backoff_ms: env_or("IMPORT_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Set the batch size, keeping the progress cadence tied to it
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        if self.progress_every == self.batch_size {
            self.progress_every = batch_size;
        }
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("IMPORT_BATCH_SIZE must be greater than 0");
        }
        if self.progress_every == 0 {
            anyhow::bail!("IMPORT_PROGRESS_EVERY must be greater than 0");
        }
        self.decoder.validate()?;
        self.watchdog.validate()?;
        Ok(())
    }
}

/// Rankify API connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token of an admin session
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            base_url: std::env::var("RANKIFY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("RANKIFY_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            timeout_secs: env_or("RANKIFY_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.trim().is_empty() {
            anyhow::bail!("RANKIFY_API_URL must not be empty");
        }
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("RANKIFY_API_URL is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("RANKIFY_API_URL must use http or https, got '{}'", url.scheme());
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("RANKIFY_API_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }
}

/// Complete configuration for the import binary
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportConfig {
    pub pipeline: PipelineConfig,
    pub api: ApiConfig,
}

impl ImportConfig {
    /// Load configuration from the environment
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            pipeline: PipelineConfig::from_env()?,
            api: ApiConfig::from_env()?,
        })
    }

    /// True when the watchdog fires before a hung request would time out
    pub fn stall_precedes_request_timeout(&self) -> bool {
        self.api.timeout_secs >= self.pipeline.watchdog.stall_timeout_secs
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.pipeline.validate()?;
        self.api.validate()?;
        if self.stall_precedes_request_timeout() {
            tracing::warn!(
                api_timeout_secs = self.api.timeout_secs,
                stall_timeout_secs = self.pipeline.watchdog.stall_timeout_secs,
                "RANKIFY_API_TIMEOUT_SECS is not below IMPORT_STALL_TIMEOUT_SECS; slow uploads will be reported as stalls"
            );
        }
        Ok(())
    }
}
