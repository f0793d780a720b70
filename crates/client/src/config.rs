use std::str::FromStr;
use std::time::Duration;

use hpc_core::chunking::DEFAULT_CHUNK_SIZE;

/// Default cap on the number of files submitted in one batch.
pub const DEFAULT_MAX_BATCH_FILES: usize = 10;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults that match a backend running locally on
/// port 3130.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Chunk ingestion endpoint (default: `http://localhost:3130/upload`).
    pub upload_url: String,
    /// Progress-feed base address; the job id is appended to it
    /// (default: `ws://localhost:3130/ws/`).
    pub progress_url: String,
    /// Fixed chunk size in bytes (default: 10 MiB).
    pub chunk_size: u64,
    /// How many files may be in their upload phase at once (default: `1`).
    pub upload_workers: usize,
    /// Per-chunk HTTP timeout (default: 30 s).
    pub request_timeout: Duration,
    /// Longest silence tolerated on a progress feed; `None` waits forever
    /// (default: 300 s).
    pub feed_idle_timeout: Option<Duration>,
    /// Largest batch `enqueue_many` accepts; a larger batch is rejected
    /// whole. `None` removes the cap (default: 10).
    pub max_batch_files: Option<usize>,
    /// Skip the file extension check on enqueue (default: `false`).
    pub any_type: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            upload_url: "http://localhost:3130/upload".into(),
            progress_url: "ws://localhost:3130/ws/".into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_workers: 1,
            request_timeout: Duration::from_secs(30),
            feed_idle_timeout: Some(Duration::from_secs(300)),
            max_batch_files: Some(DEFAULT_MAX_BATCH_FILES),
            any_type: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                         |
    /// |--------------------------|---------------------------------|
    /// | `UPLOAD_URL`             | `http://localhost:3130/upload`  |
    /// | `PROGRESS_URL`           | `ws://localhost:3130/ws/`       |
    /// | `CHUNK_SIZE_BYTES`       | `10485760`                      |
    /// | `UPLOAD_WORKERS`         | `1`                             |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                            |
    /// | `FEED_IDLE_TIMEOUT_SECS` | `300` (`0` disables)            |
    /// | `MAX_BATCH_FILES`        | `10` (`0` disables)             |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let upload_url = lookup("UPLOAD_URL").unwrap_or(defaults.upload_url);
        let progress_url = lookup("PROGRESS_URL").unwrap_or(defaults.progress_url);
        let chunk_size = parse_or(&lookup, "CHUNK_SIZE_BYTES", defaults.chunk_size)?;
        let upload_workers = parse_or(&lookup, "UPLOAD_WORKERS", defaults.upload_workers)?;
        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        let feed_idle_timeout_secs: u64 = parse_or(&lookup, "FEED_IDLE_TIMEOUT_SECS", 300)?;
        let max_batch_files: usize =
            parse_or(&lookup, "MAX_BATCH_FILES", DEFAULT_MAX_BATCH_FILES)?;

        let config = Self {
            upload_url,
            progress_url,
            chunk_size,
            upload_workers,
            request_timeout: Duration::from_secs(request_timeout_secs),
            feed_idle_timeout: (feed_idle_timeout_secs > 0)
                .then(|| Duration::from_secs(feed_idle_timeout_secs)),
            max_batch_files: (max_batch_files > 0).then_some(max_batch_files),
            any_type: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the uploader unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                var: "CHUNK_SIZE_BYTES",
                value: "0".into(),
            });
        }
        if self.upload_workers == 0 {
            return Err(ConfigError::Invalid {
                var: "UPLOAD_WORKERS",
                value: "0".into(),
            });
        }
        if self.upload_url.trim().is_empty() {
            return Err(ConfigError::Missing("UPLOAD_URL"));
        }
        if self.progress_url.trim().is_empty() {
            return Err(ConfigError::Missing("PROGRESS_URL"));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

/// Errors produced while loading [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must not be empty")]
    Missing(&'static str),
}
