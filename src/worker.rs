//! Queue consumer: test a pull request and persist the verdict

use crate::context::PipelineContext;
use crate::error::Result;
use crate::pull::{PullRequestStatus, STATUS_COLUMNS};
use crate::queue::{WorkHandler, WorkItem};
use crate::store::load_protected_branch;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Handles work items by re-testing the pull request they name
pub struct TestWorker {
    ctx: Arc<PipelineContext>,
}

impl TestWorker {
    /// Worker over the given collaborators
    pub const fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl WorkHandler for TestWorker {
    async fn handle(&self, item: WorkItem) -> Result<()> {
        check_and_update_status(&self.ctx, item).await
    }
}

/// Enter `checking`, run the patch test and store the verdict
///
/// Merged and manually merged pull requests are skipped.
pub async fn check_and_update_status(ctx: &PipelineContext, item: WorkItem) -> Result<()> {
    let mut pr = ctx.pulls.get_pull_request(item.pull_request_id).await?;
    if pr.is_merged() || pr.status() == PullRequestStatus::ManuallyMerged {
        debug!(pr_id = %pr.id(), status = %pr.status(), "skipping test of merged pull request");
        return Ok(());
    }
    load_protected_branch(ctx.repos.as_ref(), &mut pr).await?;

    pr.begin_check(Utc::now())?;
    ctx.pulls.update_columns(&pr, STATUS_COLUMNS).await?;

    let outcome = ctx.patch.test_patch(&pr).await?;
    pr.apply_patch_outcome(outcome, Utc::now())?;
    ctx.pulls.update_columns(&pr, STATUS_COLUMNS).await?;

    info!(
        pr_id = %pr.id(),
        index = pr.index(),
        status = %pr.status(),
        conflicts = pr.conflicted_files().len(),
        "pull request tested"
    );
    Ok(())
}

/// Queue every unmerged pull request still in `checking`
///
/// Run at startup so work lost with an in-memory queue is picked up again.
/// Returns how many were queued.
pub async fn requeue_checking(ctx: &PipelineContext) -> Result<usize> {
    let prs = ctx.pulls.list_checking().await?;
    let mut queued = 0;
    for pr in &prs {
        match ctx.enqueue(pr.id()).await {
            Ok(()) => queued += 1,
            Err(e) => error!(pr_id = %pr.id(), error = %e, "failed to requeue pull request"),
        }
    }
    info!(queued, found = prs.len(), "requeued pull requests left in checking");
    Ok(queued)
}
