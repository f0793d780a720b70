//! WebSocket client for a job's progress feed.
//!
//! [`FeedClient`] holds the feed base address. Call
//! [`FeedClient::connect`] with a job id to open a live
//! [`FeedConnection`]; the job id is appended to the base address.

use std::time::Duration;

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// The raw WebSocket stream used by a feed connection.
pub type FeedStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for the progress feed.
#[derive(Debug, Clone)]
pub struct FeedClient {
    progress_url: String,
}

/// A live progress-feed connection for one job.
pub struct FeedConnection {
    pub job_id: String,
    /// Full address the connection was opened against.
    pub url: String,
    pub ws_stream: FeedStream,
}

impl FeedClient {
    /// * `progress_url` - base address, e.g. `ws://host:3130/ws/`.
    pub fn new(progress_url: String) -> Self {
        Self { progress_url }
    }

    pub fn progress_url(&self) -> &str {
        &self.progress_url
    }

    /// Address of the feed for `job_id`.
    pub fn feed_url(&self, job_id: &str) -> String {
        format!("{}{}", self.progress_url, job_id)
    }

    /// Open the feed for `job_id`.
    pub async fn connect(&self, job_id: &str) -> Result<FeedConnection, FeedError> {
        let url = self.feed_url(job_id);

        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| FeedError::Connection(format!("Failed to connect to {url}: {e}")))?;

        tracing::info!(job_id = %job_id, url = %url, "Progress feed connected");

        Ok(FeedConnection {
            job_id: job_id.to_string(),
            url,
            ws_stream,
        })
    }
}

/// Errors that end a progress subscription (or, for `Malformed`, a
/// single message).
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Failed to establish the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The established connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A text frame could not be parsed.
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The server closed the feed before the job completed.
    #[error("Feed closed before the job completed")]
    ClosedBeforeCompletion,

    /// No message arrived within the idle timeout.
    #[error("No progress received for {0:?}")]
    IdleTimeout(Duration),

    /// The server reported a job-level failure.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// A `completed` message arrived without a result.
    #[error("Job completed without a result")]
    MissingResult,
}
