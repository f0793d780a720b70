//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hpc_client::ClientConfig;

/// Upload files in chunks and follow their processing to completion.
///
/// Connection settings fall back to `UPLOAD_URL`, `PROGRESS_URL`,
/// `CHUNK_SIZE_BYTES`, `UPLOAD_WORKERS`, `REQUEST_TIMEOUT_SECS`,
/// `FEED_IDLE_TIMEOUT_SECS` and `MAX_BATCH_FILES`; flags win over the
/// environment.
#[derive(Parser, Debug)]
#[command(name = "hpc-upload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Chunk ingestion endpoint
    #[arg(long)]
    pub upload_url: Option<String>,

    /// Progress feed base address (job id is appended)
    #[arg(long)]
    pub progress_url: Option<String>,

    /// Chunk size in bytes
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Files uploaded concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Seconds of feed silence before a job is failed (0 waits forever)
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Largest number of files accepted in one run (0 removes the cap)
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Accept any file extension
    #[arg(long)]
    pub any_type: bool,

    /// Print the final job records as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply flag overrides on top of `base`.
    pub fn apply(&self, mut base: ClientConfig) -> ClientConfig {
        if let Some(url) = &self.upload_url {
            base.upload_url = url.clone();
        }
        if let Some(url) = &self.progress_url {
            base.progress_url = url.clone();
        }
        if let Some(size) = self.chunk_size {
            base.chunk_size = size;
        }
        if let Some(workers) = self.workers {
            base.upload_workers = workers;
        }
        if let Some(secs) = self.idle_timeout {
            base.feed_idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(max) = self.max_files {
            base.max_batch_files = (max > 0).then_some(max);
        }
        base.any_type |= self.any_type;
        base
    }

    /// Default log filter for this invocation.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "hpc_client=debug,hpc_store=debug,hpc_upload=debug"
        } else {
            "hpc_client=info,hpc_upload=info"
        }
    }
}
