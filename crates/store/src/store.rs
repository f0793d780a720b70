//! Keyed job records behind a single lock, with a broadcast change feed.
//!
//! Records are keyed by file name and indexed by job id once the server
//! has issued one. Every mutation happens under the write lock, so a patch
//! is visible to readers as soon as the call returns and writers to the
//! same key never interleave.

use std::collections::HashMap;

use hpc_core::job::{FileUploadJob, JobPatch};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

// ---------------------------------------------------------------------------
// JobChange
// ---------------------------------------------------------------------------

/// Emitted after every effective mutation of a record.
#[derive(Debug, Clone, Serialize)]
pub struct JobChange {
    pub file_name: String,
    /// The record as it stands after the mutation.
    pub job: FileUploadJob,
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

/// Default buffer capacity for the change channel.
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<String, FileUploadJob>,
    /// File names in creation order, for stable snapshots.
    order: Vec<String>,
    /// `job_id -> file_name`.
    by_job_id: HashMap<String, String>,
}

impl StoreInner {
    /// Apply `patch` to the record for `file_name`, keeping the job-id
    /// index in sync. Returns the record and whether it changed.
    fn patch(&mut self, file_name: &str, patch: &JobPatch) -> Option<(FileUploadJob, bool)> {
        let job = self.jobs.get_mut(file_name)?;
        let old_job_id = job.job_id.clone();
        let changed = job.apply(patch);
        let job = job.clone();

        if job.job_id != old_job_id {
            if let Some(old) = old_job_id {
                self.by_job_id.remove(&old);
            }
            if let Some(new) = &job.job_id {
                self.by_job_id.insert(new.clone(), file_name.to_string());
            }
        }
        Some((job, changed))
    }
}

/// Process-wide mapping from file name to [`FileUploadJob`].
///
/// Designed to be shared via `Arc<JobStore>`.
pub struct JobStore {
    inner: RwLock<StoreInner>,
    sender: broadcast::Sender<JobChange>,
}

impl JobStore {
    /// Create a store whose change channel buffers `capacity` events.
    ///
    /// Slow subscribers observe `RecvError::Lagged` once the buffer fills.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: RwLock::new(StoreInner::default()),
            sender,
        }
    }

    /// Subscribe to record changes.
    pub fn subscribe(&self) -> broadcast::Receiver<JobChange> {
        self.sender.subscribe()
    }

    /// Insert `job`, replacing any existing record with the same file name.
    ///
    /// A replaced record keeps its position in [`read_all`](Self::read_all)
    /// order; its old job id stops resolving.
    pub async fn upsert(&self, job: FileUploadJob) -> FileUploadJob {
        let mut inner = self.inner.write().await;
        let file_name = job.file_name.clone();

        match inner.jobs.insert(file_name.clone(), job.clone()) {
            Some(previous) => {
                if let Some(old) = previous.job_id {
                    inner.by_job_id.remove(&old);
                }
            }
            None => inner.order.push(file_name.clone()),
        }
        if let Some(job_id) = &job.job_id {
            inner.by_job_id.insert(job_id.clone(), file_name.clone());
        }
        self.publish(&job);
        drop(inner);

        tracing::debug!(file_name = %file_name, status = %job.status, "Job record created");
        job
    }

    /// Merge `patch` into the record for `file_name`.
    ///
    /// Returns the record after the merge, or `None` if no record exists.
    pub async fn update_by_file_name(
        &self,
        file_name: &str,
        patch: &JobPatch,
    ) -> Option<FileUploadJob> {
        let mut inner = self.inner.write().await;
        let (job, changed) = inner.patch(file_name, patch)?;
        if changed {
            self.publish(&job);
        }
        Some(job)
    }

    /// Merge `patch` into the record that owns `job_id`.
    ///
    /// Returns the record after the merge, or `None` if the id is unknown.
    pub async fn update_by_job_id(&self, job_id: &str, patch: &JobPatch) -> Option<FileUploadJob> {
        let mut inner = self.inner.write().await;
        let Some(file_name) = inner.by_job_id.get(job_id).cloned() else {
            tracing::warn!(job_id = %job_id, "Patch for unknown job id dropped");
            return None;
        };
        let (job, changed) = inner.patch(&file_name, patch)?;
        if changed {
            self.publish(&job);
        }
        Some(job)
    }

    /// Current record for `file_name`.
    pub async fn get(&self, file_name: &str) -> Option<FileUploadJob> {
        self.inner.read().await.jobs.get(file_name).cloned()
    }

    /// Current record for the file that owns `job_id`.
    pub async fn get_by_job_id(&self, job_id: &str) -> Option<FileUploadJob> {
        let inner = self.inner.read().await;
        inner
            .by_job_id
            .get(job_id)
            .and_then(|name| inner.jobs.get(name))
            .cloned()
    }

    /// Whether `file_name` has a record that has not reached a terminal state.
    pub async fn is_active(&self, file_name: &str) -> bool {
        self.inner
            .read()
            .await
            .jobs
            .get(file_name)
            .is_some_and(FileUploadJob::is_active)
    }

    /// Snapshot of every record, in creation order.
    pub async fn read_all(&self) -> Vec<FileUploadJob> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|name| inner.jobs.get(name))
            .cloned()
            .collect()
    }

    /// Called with the write lock held so changes go out in mutation order.
    fn publish(&self, job: &FileUploadJob) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(JobChange {
            file_name: job.file_name.clone(),
            job: job.clone(),
        });
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
