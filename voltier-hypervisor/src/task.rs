use crate::{HypervisorConnection, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use voltier_core::{Result, VoltierError};

/// Polls a single remote asynchronous task until it reaches a terminal
/// state or the caller's timeout elapses. The poll interval is fixed and
/// independent of the timeout.
pub struct AsyncTaskWaiter {
    conn: Arc<dyn HypervisorConnection>,
    poll_interval: Duration,
}

impl AsyncTaskWaiter {
    pub fn new(conn: Arc<dyn HypervisorConnection>, poll_interval_ms: u64) -> Self {
        Self {
            conn,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    /// Blocks the calling operation until the task finishes, yielding the
    /// identifier of the resulting disk image. A remote-reported failure
    /// becomes `RemoteTaskError`; an elapsed timeout becomes `TaskTimeout`.
    /// The task itself is not aborted on timeout.
    pub async fn wait(&self, task: &str, timeout_ms: u64) -> Result<String> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match self.conn.task_status(task).await? {
                TaskStatus::Success { result } => {
                    debug!("task {task} succeeded with result {result}");
                    return Ok(result);
                }
                TaskStatus::Failure { message } => {
                    return Err(VoltierError::RemoteTaskError(message));
                }
                TaskStatus::Pending => {}
            }
            if Instant::now() >= deadline {
                return Err(VoltierError::TaskTimeout { timeout_ms });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Releases the task handle after a terminal state. Best-effort: a
    /// failed destroy is logged and never propagated.
    pub async fn finish(&self, task: &str) {
        if let Err(e) = self.conn.destroy_task(task).await {
            warn!("unable to destroy task {task}: {e}");
        }
    }
}
