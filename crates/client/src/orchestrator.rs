//! Multi-file upload orchestrator.
//!
//! [`Orchestrator`] owns the submission queue. [`process_all`] takes every
//! queued file through its chunked upload (at most `upload_workers` files
//! at a time, each one's chunks strictly in order), hands the job id to
//! the store, and spawns a progress subscription per job. Subscriptions
//! run independently of later uploads; [`wait_for_channels`] waits for
//! all of them to close.
//!
//! A failure on one file marks only that file `error`; processing always
//! continues with the next one.
//!
//! [`process_all`]: Orchestrator::process_all
//! [`wait_for_channels`]: Orchestrator::wait_for_channels

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use hpc_core::admission;
use hpc_core::error::CoreError;
use hpc_core::job::{FileUploadJob, JobPatch};
use hpc_store::JobStore;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

use crate::api::{UploadApi, UploadApiError};
use crate::config::{ClientConfig, ConfigError};
use crate::feed::FeedClient;
use crate::subscription::Subscription;
use crate::uploader::ChunkUploader;

/// A file waiting for its upload phase.
#[derive(Debug, Clone)]
struct QueuedFile {
    path: PathBuf,
    file_name: String,
}

/// Files not yet represented by a store record.
#[derive(Debug, Default)]
struct Queue {
    waiting: VecDeque<QueuedFile>,
    /// Drained by `process_all` but not yet given a record.
    dispatched: HashSet<String>,
}

impl Queue {
    fn contains(&self, file_name: &str) -> bool {
        self.dispatched.contains(file_name)
            || self.waiting.iter().any(|f| f.file_name == file_name)
    }
}

/// Outcome counts for one [`Orchestrator::process_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Files whose upload phase produced a job id.
    pub handed_off: usize,
    /// Files that failed during the upload phase.
    pub failed: usize,
}

/// Drives queued files through upload and progress tracking.
///
/// Created once via [`Orchestrator::new`] and shared as `Arc<Orchestrator>`.
pub struct Orchestrator {
    store: Arc<JobStore>,
    uploader: ChunkUploader,
    feed: FeedClient,
    upload_workers: usize,
    feed_idle_timeout: Option<Duration>,
    max_batch_files: Option<usize>,
    any_type: bool,
    queue: Mutex<Queue>,
    /// One task per open progress subscription.
    channels: TaskTracker,
}

impl Orchestrator {
    /// Build an orchestrator writing into `store`.
    pub fn new(
        config: &ClientConfig,
        store: Arc<JobStore>,
    ) -> Result<Arc<Self>, OrchestratorError> {
        config.validate()?;

        let api = UploadApi::new(config.upload_url.clone(), config.request_timeout)?;
        let uploader = ChunkUploader::new(Arc::new(api), Arc::clone(&store), config.chunk_size);

        Ok(Arc::new(Self {
            store,
            uploader,
            feed: FeedClient::new(config.progress_url.clone()),
            upload_workers: config.upload_workers,
            feed_idle_timeout: config.feed_idle_timeout,
            max_batch_files: config.max_batch_files,
            any_type: config.any_type,
            queue: Mutex::new(Queue::default()),
            channels: TaskTracker::new(),
        }))
    }

    /// The store this orchestrator writes to.
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Names of files still waiting for their upload phase.
    pub async fn queued(&self) -> Vec<String> {
        self.queue
            .lock()
            .await
            .waiting
            .iter()
            .map(|f| f.file_name.clone())
            .collect()
    }

    /// Add one file to the queue and return its identity key.
    ///
    /// Rejects unsupported types, paths that are not regular files, and
    /// names that are already queued or still active in the store.
    pub async fn enqueue(&self, path: impl AsRef<Path>) -> Result<String, OrchestratorError> {
        let path = path.as_ref();
        let file_name = admission::admit(path, self.any_type)?;

        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(OrchestratorError::NotAFile(path.to_path_buf()));
        }

        let mut queue = self.queue.lock().await;
        if queue.contains(&file_name) || self.store.is_active(&file_name).await {
            return Err(CoreError::DuplicateFile(file_name).into());
        }
        queue.waiting.push_back(QueuedFile {
            path: path.to_path_buf(),
            file_name: file_name.clone(),
        });

        tracing::info!(file_name = %file_name, path = %path.display(), "File queued");
        Ok(file_name)
    }

    /// Enqueue a batch of files; returns the rejected paths with their
    /// reasons.
    ///
    /// A batch larger than `max_batch_files` is rejected as a whole and
    /// nothing from it is queued.
    pub async fn enqueue_many<I, P>(&self, paths: I) -> Vec<(PathBuf, OrchestratorError)>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();

        if let Some(limit) = self.max_batch_files {
            if paths.len() > limit {
                let count = paths.len();
                tracing::warn!(count, limit, "Batch rejected: too many files");
                return paths
                    .into_iter()
                    .map(|path| (path, OrchestratorError::TooManyFiles { count, limit }))
                    .collect();
            }
        }

        let mut rejected = Vec::new();
        for path in paths {
            if let Err(e) = self.enqueue(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "File rejected");
                rejected.push((path, e));
            }
        }
        rejected
    }

    /// Drain the queue, running each file's upload phase.
    ///
    /// Returns once every drained file has either handed off to a progress
    /// subscription or failed. Subscriptions keep running afterwards.
    pub async fn process_all(&self) -> ProcessReport {
        let files: Vec<QueuedFile> = {
            let mut queue = self.queue.lock().await;
            let files: Vec<QueuedFile> = queue.waiting.drain(..).collect();
            queue
                .dispatched
                .extend(files.iter().map(|f| f.file_name.clone()));
            files
        };
        if files.is_empty() {
            return ProcessReport::default();
        }

        tracing::info!(
            count = files.len(),
            workers = self.upload_workers,
            "Processing queued files",
        );

        let outcomes: Vec<bool> = futures::stream::iter(files)
            .map(|file| self.process_file(file))
            .buffered(self.upload_workers)
            .collect()
            .await;

        let handed_off = outcomes.iter().filter(|ok| **ok).count();
        ProcessReport {
            handed_off,
            failed: outcomes.len() - handed_off,
        }
    }

    /// Wait until every spawned progress subscription has closed.
    pub async fn wait_for_channels(&self) {
        self.channels.close();
        self.channels.wait().await;
        self.channels.reopen();
    }

    /// Number of subscriptions still open.
    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    // ---- private helpers ----

    /// Upload one file and, on success, start its subscription.
    async fn process_file(&self, file: QueuedFile) -> bool {
        self.store.upsert(FileUploadJob::new(&file.file_name)).await;
        self.queue.lock().await.dispatched.remove(&file.file_name);

        match self.uploader.upload(&file.path, &file.file_name).await {
            Ok(job_id) => {
                self.store
                    .update_by_file_name(&file.file_name, &JobPatch::handed_off(&job_id))
                    .await;
                self.spawn_channel(file.file_name, job_id);
                true
            }
            Err(e) => {
                tracing::error!(file_name = %file.file_name, error = %e, "Upload failed");
                self.store
                    .update_by_file_name(&file.file_name, &JobPatch::failed(e.to_string()))
                    .await;
                false
            }
        }
    }

    /// Spawn a tracked task that connects to the feed for `job_id` and
    /// runs its subscription to completion.
    fn spawn_channel(&self, file_name: String, job_id: String) {
        let feed = self.feed.clone();
        let store = Arc::clone(&self.store);
        let idle_timeout = self.feed_idle_timeout;

        self.channels.spawn(async move {
            let conn = match feed.connect(&job_id).await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(
                        file_name = %file_name,
                        job_id = %job_id,
                        error = %e,
                        "Could not open progress feed",
                    );
                    store
                        .update_by_job_id(&job_id, &JobPatch::failed(e.to_string()))
                        .await;
                    return;
                }
            };

            let subscription = Subscription::open(job_id)
                .run(conn, &store, idle_timeout)
                .await;
            tracing::debug!(
                file_name = %file_name,
                job_id = %subscription.job_id(),
                applied = subscription.applied(),
                "Subscription finished",
            );
        });
    }
}

/// Errors returned to callers of the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),

    #[error("Batch of {count} files exceeds the limit of {limit}")]
    TooManyFiles { count: usize, limit: usize },

    #[error("Cannot access file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build upload client: {0}")]
    Client(#[from] UploadApiError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
