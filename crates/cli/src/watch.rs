//! Live logging of job-store changes.

use hpc_store::JobChange;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::oneshot;

/// Log every change until `stop` fires, then log whatever is still
/// buffered. Returns the number of changes logged.
pub async fn log_changes(
    mut changes: broadcast::Receiver<JobChange>,
    mut stop: oneshot::Receiver<()>,
) -> usize {
    let mut logged = 0;

    loop {
        tokio::select! {
            biased;
            change = changes.recv() => match change {
                Ok(change) => {
                    log_change(&change);
                    logged += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Change log lagged");
                }
                Err(RecvError::Closed) => return logged,
            },
            _ = &mut stop => break,
        }
    }

    loop {
        match changes.try_recv() {
            Ok(change) => {
                log_change(&change);
                logged += 1;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Change log lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return logged,
        }
    }
}

fn log_change(change: &JobChange) {
    tracing::info!(
        file_name = %change.file_name,
        status = %change.job.status,
        progress = change.job.progress,
        "Job updated",
    );
}
