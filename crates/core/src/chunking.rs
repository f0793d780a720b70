//! Chunk boundary computation and upload-phase progress (pure functions).
//!
//! A file of `file_size` bytes is split into `ceil(file_size / chunk_size)`
//! contiguous, non-overlapping byte ranges. An empty file still produces one
//! zero-length chunk so the ingestion endpoint sees a final chunk and can
//! issue a job id for it.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default chunk size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Progress value that marks the end of a phase.
pub const PROGRESS_COMPLETE: u8 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A half-open byte range `[start, end)` of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Zero-based position of this chunk in the upload sequence.
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    /// Number of bytes covered by this range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Number of chunks needed to transfer `file_size` bytes.
///
/// Returns [`CoreError::Validation`] when `chunk_size` is zero.
pub fn total_chunks(file_size: u64, chunk_size: u64) -> Result<u64, CoreError> {
    if chunk_size == 0 {
        return Err(CoreError::Validation(
            "chunk size must be greater than zero".into(),
        ));
    }
    if file_size == 0 {
        return Ok(1);
    }
    Ok(file_size.div_ceil(chunk_size))
}

/// Compute the ordered chunk ranges covering `[0, file_size)`.
///
/// Every range is at most `chunk_size` bytes long; only the last one may be
/// shorter.
pub fn split(file_size: u64, chunk_size: u64) -> Result<Vec<ChunkRange>, CoreError> {
    let total = total_chunks(file_size, chunk_size)?;
    let ranges = (0..total)
        .map(|index| {
            let start = index * chunk_size;
            let end = (start + chunk_size).min(file_size);
            ChunkRange { index, start, end }
        })
        .collect();
    Ok(ranges)
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Upload-phase progress after `chunks_done` of `total` chunks were acknowledged.
///
/// Rounds up so that early chunks register visibly, but holds at 99 until
/// the final acknowledgment: 100 is reached only when `chunks_done == total`.
pub fn upload_progress(chunks_done: u64, total: u64) -> u8 {
    if total == 0 || chunks_done >= total {
        return PROGRESS_COMPLETE;
    }
    let pct = (chunks_done * 100).div_ceil(total);
    pct.min(99) as u8
}
