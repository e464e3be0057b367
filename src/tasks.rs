//! Background task runner
//!
//! Orchestrator scans run as independent tasks, one per triggering event.
//! The runner tracks them so shutdown can cancel and wait.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Spawns and tracks background tasks
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl TaskRunner {
    /// Empty runner
    pub fn new() -> Self {
        Self::default()
    }

    /// Token fired when shutdown begins; tasks check it between units of work
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Spawn a tracked task
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Number of tasks still running
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel, then wait up to `grace` for running tasks to finish
    ///
    /// Returns `false` if tasks were still running when the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("background tasks stopped");
            true
        } else {
            warn!(
                remaining = self.tracker.len(),
                grace_secs = grace.as_secs(),
                "background tasks still running at shutdown"
            );
            false
        }
    }
}
