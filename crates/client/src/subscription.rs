//! Per-job progress subscription.
//!
//! A [`Subscription`] reads frames from one job's feed connection, applies
//! each parsed update to the [`JobStore`] record owning that job id, and
//! moves from `Open` to `Closed` exactly once. A `completed` update is the
//! only successful way out; the client then closes the connection itself.
//! Every other way the feed can end fails the job.

use std::time::Duration;

use futures::StreamExt;
use hpc_core::job::{JobPatch, JobStatus};
use hpc_store::JobStore;
use tokio_tungstenite::tungstenite::Message;

use crate::feed::{FeedConnection, FeedError, FeedStream};
use crate::messages::{parse_message, FeedMessage, ProgressUpdate};

/// Lifecycle of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Open,
    Closed(CloseReason),
}

/// Why a subscription closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// A `completed` update with a result was applied.
    Completed,
    /// The job was marked `error` with this reason.
    Failed(String),
}

/// Tracks one job's feed from open to close.
#[derive(Debug)]
pub struct Subscription {
    job_id: String,
    state: SubscriptionState,
    applied: u64,
}

impl Subscription {
    pub fn open(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: SubscriptionState::Open,
            applied: 0,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> &SubscriptionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SubscriptionState::Open
    }

    /// Number of updates applied to the store.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Drive the feed until the subscription closes.
    ///
    /// With `idle_timeout` set, a gap longer than that between frames fails
    /// the job. Returns the closed subscription.
    pub async fn run(
        mut self,
        conn: FeedConnection,
        store: &JobStore,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let mut ws_stream = conn.ws_stream;

        while self.is_open() {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, ws_stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.fail(store, FeedError::IdleTimeout(limit)).await;
                        break;
                    }
                },
                None => ws_stream.next().await,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    self.handle_text(&text, store).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!(job_id = %self.job_id, "Ignoring binary frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Handled automatically by tungstenite.
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::warn!(job_id = %self.job_id, ?frame, "Server closed progress feed");
                    self.fail(store, FeedError::ClosedBeforeCompletion).await;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    self.fail(store, FeedError::Transport(e.to_string())).await;
                }
                None => {
                    self.fail(store, FeedError::ClosedBeforeCompletion).await;
                }
            }
        }

        close_stream(&mut ws_stream, &self.job_id).await;
        tracing::info!(job_id = %self.job_id, state = ?self.state, "Progress feed closed");
        self
    }

    /// Parse and apply a single text frame. Malformed frames are skipped.
    async fn handle_text(&mut self, text: &str, store: &JobStore) {
        match parse_message(text) {
            Ok(FeedMessage::Update(update)) => self.handle_update(update, store).await,
            Ok(FeedMessage::Failure { error }) => {
                self.fail(store, FeedError::JobFailed(error)).await;
            }
            Err(e) => {
                let e = FeedError::from(e);
                tracing::warn!(
                    job_id = %self.job_id,
                    error = %e,
                    raw_message = %text,
                    "Skipping progress message",
                );
            }
        }
    }

    async fn handle_update(&mut self, update: ProgressUpdate, store: &JobStore) {
        match update.status {
            JobStatus::Completed if !update.has_result() => {
                self.fail(store, FeedError::MissingResult).await;
                return;
            }
            JobStatus::Error => {
                self.fail(store, FeedError::JobFailed("server reported status error".into()))
                    .await;
                return;
            }
            JobStatus::Uploading => {
                tracing::warn!(job_id = %self.job_id, "Skipping upload-phase status on feed");
                return;
            }
            JobStatus::InProgress | JobStatus::Completed => {}
        }

        tracing::debug!(
            job_id = %self.job_id,
            progress = update.progress,
            status = %update.status,
            "Job progress",
        );

        if store
            .update_by_job_id(&self.job_id, &update.to_patch())
            .await
            .is_none()
        {
            tracing::warn!(job_id = %self.job_id, "No record owns this job id");
        }
        self.applied += 1;

        if update.status == JobStatus::Completed {
            self.state = SubscriptionState::Closed(CloseReason::Completed);
        }
    }

    /// Mark the job `error` and close the subscription.
    async fn fail(&mut self, store: &JobStore, error: FeedError) {
        let reason = error.to_string();
        tracing::error!(job_id = %self.job_id, error = %reason, "Progress feed failed");
        store
            .update_by_job_id(&self.job_id, &JobPatch::failed(reason.clone()))
            .await;
        self.state = SubscriptionState::Closed(CloseReason::Failed(reason));
    }
}

/// Send a close frame; errors only mean the peer is already gone.
async fn close_stream(ws_stream: &mut FeedStream, job_id: &str) {
    if let Err(e) = ws_stream.close(None).await {
        tracing::debug!(job_id = %job_id, error = %e, "Close handshake not completed");
    }
}
