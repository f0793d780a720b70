//! `hpc-upload` -- chunked file uploader with live progress tracking.
//!
//! Uploads every file given on the command line to the ingestion
//! endpoint, follows each resulting job on its progress feed, and prints
//! the final record of every file. Exits with status 1 when any file was
//! rejected or ended in `error`.
//!
//! # Environment variables
//!
//! | Variable                 | Default                        | Description                       |
//! |--------------------------|--------------------------------|-----------------------------------|
//! | `UPLOAD_URL`             | `http://localhost:3130/upload` | Chunk ingestion endpoint          |
//! | `PROGRESS_URL`           | `ws://localhost:3130/ws/`      | Progress feed base address        |
//! | `CHUNK_SIZE_BYTES`       | `10485760`                     | Chunk size                        |
//! | `UPLOAD_WORKERS`         | `1`                            | Files uploaded concurrently       |
//! | `REQUEST_TIMEOUT_SECS`   | `30`                           | Per-chunk HTTP timeout            |
//! | `FEED_IDLE_TIMEOUT_SECS` | `300`                          | Feed silence limit, `0` disables  |
//! | `MAX_BATCH_FILES`        | `10`                           | Files per run, `0` disables       |
//! | `RUST_LOG`               | `hpc_client=info,...`          | Log filter                        |

use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hpc_cli::{report, watch, Cli};
use hpc_client::{ClientConfig, Orchestrator};
use hpc_store::JobStore;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "Upload run failed");
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

/// Run the whole batch. Returns `false` if any file did not complete.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = cli.apply(ClientConfig::from_env().context("Invalid environment")?);

    tracing::info!(
        upload_url = %config.upload_url,
        progress_url = %config.progress_url,
        chunk_size = config.chunk_size,
        workers = config.upload_workers,
        files = cli.files.len(),
        "Starting hpc-upload",
    );

    let store = Arc::new(JobStore::default());
    let orchestrator = Orchestrator::new(&config, Arc::clone(&store))?;
    let (stop_logger, stop) = oneshot::channel();
    let logger = tokio::spawn(watch::log_changes(store.subscribe(), stop));

    let rejected = orchestrator.enqueue_many(&cli.files).await;
    for (path, e) in &rejected {
        eprintln!("Skipped {}: {e}", path.display());
    }

    let outcome = orchestrator.process_all().await;
    tracing::info!(
        handed_off = outcome.handed_off,
        failed = outcome.failed,
        "Upload phase finished",
    );

    orchestrator.wait_for_channels().await;
    let _ = stop_logger.send(());
    let logged = logger.await?;
    tracing::debug!(logged, "Change log drained");

    let jobs = store.read_all().await;
    if cli.json {
        println!("{}", report::render_json(&jobs)?);
    } else if !jobs.is_empty() {
        println!("{}", report::render_table(&jobs));
    }

    Ok(rejected.is_empty() && !report::has_failures(&jobs))
}
