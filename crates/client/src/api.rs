//! HTTP client for the chunk ingestion endpoint.
//!
//! Each chunk is a `multipart/form-data` POST carrying the raw bytes
//! (`chunk`), the file name (`fileName`), the zero-based chunk index
//! (`chunkIndex`), and the chunk count (`totalChunks`). Only the
//! acknowledgment for the final chunk carries a `job_id`.

use std::time::Duration;

use reqwest::multipart::{Form, Part};

/// HTTP client bound to one ingestion endpoint.
pub struct UploadApi {
    client: reqwest::Client,
    upload_url: String,
}

/// One chunk ready to be sent.
#[derive(Debug)]
pub struct ChunkUpload<'a> {
    pub file_name: &'a str,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub bytes: Vec<u8>,
}

/// Acknowledgment for an accepted chunk.
///
/// Any JSON body is a valid acknowledgment. Only the final chunk's body is
/// expected to carry a string `job_id`; everything else in it is ignored.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkAck {
    pub job_id: Option<String>,
}

impl ChunkAck {
    pub fn from_value(body: &serde_json::Value) -> Self {
        let job_id = body
            .get("job_id")
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Self { job_id }
    }
}

/// Errors from the ingestion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum UploadApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decode, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("Upload rejected ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided error text.
        body: String,
    },
}

impl UploadApi {
    /// Create a client for `upload_url` with a per-request timeout.
    pub fn new(upload_url: String, timeout: Duration) -> Result<Self, UploadApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, upload_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, upload_url: String) -> Self {
        Self { client, upload_url }
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Send one chunk and wait for its acknowledgment.
    pub async fn send_chunk(&self, chunk: ChunkUpload<'_>) -> Result<ChunkAck, UploadApiError> {
        let part = Part::bytes(chunk.bytes)
            .file_name(chunk.file_name.to_string())
            .mime_str("application/octet-stream")?;

        let form = Form::new()
            .part("chunk", part)
            .text("fileName", chunk.file_name.to_string())
            .text("chunkIndex", chunk.chunk_index.to_string())
            .text("totalChunks", chunk.total_chunks.to_string());

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let body: serde_json::Value = Self::parse_response(response).await?;
        Ok(ChunkAck::from_value(&body))
    }

    // ---- private helpers ----

    /// Turn a non-2xx response into [`UploadApiError::Rejected`] carrying
    /// the body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, UploadApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UploadApiError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, UploadApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
