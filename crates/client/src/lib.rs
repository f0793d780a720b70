//! Chunked upload and job-progress client.
//!
//! Provides the chunk ingestion API wrapper, the sequential chunk
//! uploader, the progress-feed WebSocket connection and message parser,
//! the per-job subscription loop, and the [`Orchestrator`] that drives
//! queued files through all of them.

pub mod api;
pub mod config;
pub mod feed;
pub mod messages;
pub mod orchestrator;
pub mod subscription;
pub mod uploader;

pub use config::ClientConfig;
pub use orchestrator::Orchestrator;
