//! Sequential chunk uploader.
//!
//! Sends a file's chunks strictly in order, waiting for each
//! acknowledgment before reading and sending the next, so the backend can
//! append chunks as they arrive. The first rejected or failed chunk aborts
//! the whole upload; nothing is retried.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use hpc_core::chunking::{self, ChunkRange};
use hpc_core::error::CoreError;
use hpc_core::job::JobPatch;
use hpc_store::JobStore;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::api::{ChunkUpload, UploadApi, UploadApiError};

/// Uploads files chunk by chunk and reports progress into a [`JobStore`].
pub struct ChunkUploader {
    api: Arc<UploadApi>,
    store: Arc<JobStore>,
    chunk_size: u64,
}

/// Errors that abort a file's upload phase.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The local file could not be read.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk was rejected or never acknowledged.
    #[error("Chunk {chunk_index} failed: {source}")]
    Chunk {
        chunk_index: u64,
        #[source]
        source: UploadApiError,
    },

    /// All chunks were accepted but the final acknowledgment had no job id.
    #[error("Final chunk acknowledged without a job id")]
    MissingJobId,

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ChunkUploader {
    pub fn new(api: Arc<UploadApi>, store: Arc<JobStore>, chunk_size: u64) -> Self {
        Self {
            api,
            store,
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Upload the file at `path` under the identity `file_name`.
    ///
    /// After every acknowledged chunk (including the last) the record for
    /// `file_name` is patched to `uploading` with the new progress. Returns
    /// the job id carried by the final chunk's acknowledgment.
    pub async fn upload(&self, path: &Path, file_name: &str) -> Result<String, UploadError> {
        let mut file = File::open(path).await?;
        let file_size = file.metadata().await?.len();
        let ranges = chunking::split(file_size, self.chunk_size)?;
        let total_chunks = ranges.len() as u64;

        tracing::info!(
            file_name = %file_name,
            file_size,
            total_chunks,
            chunk_size = self.chunk_size,
            "Starting chunked upload",
        );

        let mut job_id = None;

        for range in &ranges {
            let bytes = read_range(&mut file, range).await?;

            let ack = self
                .api
                .send_chunk(ChunkUpload {
                    file_name,
                    chunk_index: range.index,
                    total_chunks,
                    bytes,
                })
                .await
                .map_err(|source| UploadError::Chunk {
                    chunk_index: range.index,
                    source,
                })?;

            let progress = chunking::upload_progress(range.index + 1, total_chunks);
            self.store
                .update_by_file_name(file_name, &JobPatch::uploading(progress))
                .await;

            tracing::debug!(
                file_name = %file_name,
                chunk_index = range.index,
                total_chunks,
                progress,
                "Chunk acknowledged",
            );

            if range.index + 1 == total_chunks {
                job_id = ack.job_id;
            }
        }

        let job_id = job_id.ok_or(UploadError::MissingJobId)?;
        tracing::info!(file_name = %file_name, job_id = %job_id, "Upload complete");
        Ok(job_id)
    }
}

/// Read exactly the bytes covered by `range`.
async fn read_range(file: &mut File, range: &ChunkRange) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; range.len() as usize];
    file.seek(SeekFrom::Start(range.start)).await?;
    file.read_exact(&mut buf).await?;
    Ok(buf)
}
