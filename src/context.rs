//! Shared collaborators for pipeline operations
//!
//! Every protocol (creation, retarget, merge, orchestrator scans, worker)
//! takes a `PipelineContext` instead of reaching for ambient state.

use crate::config::PullRequestSettings;
use crate::error::Result;
use crate::git::GitBackend;
use crate::notify::Notifier;
use crate::patch::PatchTester;
use crate::queue::{WorkItem, WorkQueue};
use crate::store::{IssueStore, PullRequestStore, RepositoryStore};
use crate::types::PullRequestId;
use std::sync::Arc;
use tracing::debug;

/// Collaborators shared by the pipeline
///
/// Cheap to clone; all members are shared handles.
#[derive(Clone)]
pub struct PipelineContext {
    /// Repository lookups
    pub repos: Arc<dyn RepositoryStore>,
    /// Issues, users, comments
    pub issues: Arc<dyn IssueStore>,
    /// Pull request rows
    pub pulls: Arc<dyn PullRequestStore>,
    /// Version control
    pub git: Arc<dyn GitBackend>,
    /// Test-merge verdicts
    pub patch: Arc<dyn PatchTester>,
    /// Event sink
    pub notifier: Arc<dyn Notifier>,
    /// Work queue producer handle
    pub queue: Arc<dyn WorkQueue>,
    /// Pull request behaviour
    pub settings: PullRequestSettings,
}

impl PipelineContext {
    /// Queue a pull request for (re-)testing
    pub async fn enqueue(&self, id: PullRequestId) -> Result<()> {
        self.queue.push(WorkItem::new(id)).await?;
        debug!(pr_id = %id, "queued for testing");
        Ok(())
    }
}
