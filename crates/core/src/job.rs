//! Per-file job record and its structural merge rules.
//!
//! A [`FileUploadJob`] is created when a file leaves the queue and is then
//! only ever transitioned through [`FileUploadJob::apply`]. Files that are
//! still waiting in the queue have no record yet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunking::PROGRESS_COMPLETE;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a submitted file.
///
/// `uploading -> in-progress -> completed`, or `error` from any non-terminal
/// state. Serialized with the same strings the progress feed uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// Chunks are being transferred to the ingestion endpoint.
    Uploading,
    /// The server owns the job; progress arrives over the feed.
    InProgress,
    /// The feed delivered a final result.
    Completed,
    /// Upload or tracking failed; the file must be re-submitted.
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// `completed` and `error` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobPatch
// ---------------------------------------------------------------------------

/// A partial update. `None` fields leave the record untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub job_id: Option<String>,
    pub progress: Option<u8>,
    pub status: Option<JobStatus>,
    pub result: Option<Vec<f64>>,
    pub error: Option<String>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload-phase progress after a chunk acknowledgment.
    pub fn uploading(progress: u8) -> Self {
        Self::new()
            .with_status(JobStatus::Uploading)
            .with_progress(progress)
    }

    /// Hand-off from the upload phase to remote execution.
    pub fn handed_off(job_id: impl Into<String>) -> Self {
        Self::new()
            .with_job_id(job_id)
            .with_status(JobStatus::InProgress)
            .with_progress(0)
    }

    /// Terminal failure with a human-readable reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::new()
            .with_status(JobStatus::Error)
            .with_error(reason)
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_result(mut self, result: Vec<f64>) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// ---------------------------------------------------------------------------
// FileUploadJob
// ---------------------------------------------------------------------------

/// State of one submitted file, keyed by `file_name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadJob {
    pub file_name: String,
    /// Server-issued id; present once the upload phase has completed.
    pub job_id: Option<String>,
    /// 0-100, non-decreasing within a phase.
    pub progress: u8,
    pub status: JobStatus,
    /// Present only when `status == completed`.
    pub result: Option<Vec<f64>>,
    /// Present only when `status == error`.
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FileUploadJob {
    /// Initial record for a file that has just been dequeued.
    pub fn new(file_name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            file_name: file_name.into(),
            job_id: None,
            progress: 0,
            status: JobStatus::Uploading,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the file is still uploading or being processed remotely.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Merge `patch` into this record. Returns `true` if anything changed.
    ///
    /// Rules:
    /// - terminal records ignore every patch;
    /// - progress is clamped to 100 and may only drop on a status change;
    /// - `result` survives only when the merged status is `completed`;
    /// - `error` survives only when the merged status is `error`.
    pub fn apply(&mut self, patch: &JobPatch) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let before = (
            self.job_id.clone(),
            self.progress,
            self.status,
            self.result.clone(),
            self.error.clone(),
        );

        let next_status = patch.status.unwrap_or(self.status);

        if let Some(progress) = patch.progress {
            let progress = progress.min(PROGRESS_COMPLETE);
            if next_status != self.status || progress >= self.progress {
                self.progress = progress;
            }
        }

        if let Some(job_id) = &patch.job_id {
            self.job_id = Some(job_id.clone());
        }

        self.result = if next_status == JobStatus::Completed {
            patch.result.clone().or_else(|| self.result.take())
        } else {
            None
        };

        self.error = if next_status == JobStatus::Error {
            patch.error.clone().or_else(|| self.error.take())
        } else {
            None
        };

        self.status = next_status;

        let after = (
            self.job_id.clone(),
            self.progress,
            self.status,
            self.result.clone(),
            self.error.clone(),
        );
        let changed = before != after;
        if changed {
            self.updated_at = chrono::Utc::now();
        }
        changed
    }
}
