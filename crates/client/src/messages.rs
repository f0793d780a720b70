//! Progress-feed message types and parser.
//!
//! The feed sends JSON text frames shaped either as a progress update,
//! `{"progress": 40, "status": "in-progress"}` (with `"result": [..]` once
//! the job completes), or as a job-level failure, `{"error": "job not found"}`.

use hpc_core::chunking::PROGRESS_COMPLETE;
use hpc_core::job::{JobPatch, JobStatus};
use serde::Deserialize;

/// All known progress-feed messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeedMessage {
    /// The server reports that the job cannot be tracked or has failed.
    Failure { error: String },

    /// A progress snapshot for the job.
    Update(ProgressUpdate),
}

/// Payload of a progress snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressUpdate {
    /// Percent complete as reported by the server; clamped on use.
    pub progress: i64,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<Vec<f64>>,
}

impl ProgressUpdate {
    /// Progress clamped to `0..=100`.
    pub fn percent(&self) -> u8 {
        self.progress.clamp(0, PROGRESS_COMPLETE as i64) as u8
    }

    /// A `completed` update must carry a non-empty result.
    pub fn has_result(&self) -> bool {
        self.result.as_ref().is_some_and(|r| !r.is_empty())
    }

    pub fn to_patch(&self) -> JobPatch {
        let mut patch = JobPatch::new()
            .with_status(self.status)
            .with_progress(self.percent());
        if let Some(result) = &self.result {
            patch = patch.with_result(result.clone());
        }
        patch
    }
}

/// Parse a feed text frame.
///
/// Returns `Err` for malformed JSON, unknown status strings, or objects
/// matching neither shape. Callers should log and skip those.
pub fn parse_message(text: &str) -> Result<FeedMessage, serde_json::Error> {
    serde_json::from_str(text)
}
