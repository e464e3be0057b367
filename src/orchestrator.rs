//! Test-task orchestrator
//!
//! When a branch moves, every unmerged pull request that uses it as source or
//! target has a stale verdict. A scan finds them, refreshes the hidden refs
//! of the source-side ones and queues all of them for re-testing.

use crate::context::PipelineContext;
use crate::error::Result;
use crate::pull::PullRequest;
use crate::sync::push_to_base_repo;
use crate::tasks::TaskRunner;
use crate::types::{Issue, PullRequestId, RepoId, User};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a scan did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Source-side pull requests whose hidden ref was refreshed
    pub synchronized: Vec<PullRequestId>,
    /// Pull requests queued for testing
    pub enqueued: Vec<PullRequestId>,
    /// Pull requests skipped because synchronization or enqueue failed
    pub failed: Vec<PullRequestId>,
    /// Whether shutdown stopped the scan early
    pub interrupted: bool,
}

/// Start a background scan for `branch` of `repo_id`
///
/// `is_sync` marks a live push (as opposed to a historical rescan): affected
/// pull requests also get stale code comments invalidated and a
/// "synchronized" notification. The scan runs on `runner`, outlives the
/// caller and never reports errors back to it.
pub fn add_test_pull_request_task(
    ctx: Arc<PipelineContext>,
    runner: &TaskRunner,
    doer: User,
    repo_id: RepoId,
    branch: String,
    is_sync: bool,
) -> JoinHandle<ScanReport> {
    let shutdown = runner.shutdown_token();
    runner.spawn(async move {
        test_pull_requests_for_branch(&ctx, &doer, repo_id, &branch, is_sync, &shutdown).await
    })
}

/// Run one scan to completion (or until `shutdown` fires)
pub async fn test_pull_requests_for_branch(
    ctx: &PipelineContext,
    doer: &User,
    repo_id: RepoId,
    branch: &str,
    is_sync: bool,
    shutdown: &CancellationToken,
) -> ScanReport {
    let mut report = ScanReport::default();

    debug!(head_repo_id = %repo_id, head_branch = branch, "finding pull requests by head");
    let head_prs = match ctx.pulls.unmerged_by_head(repo_id, branch).await {
        Ok(prs) => prs,
        Err(e) => {
            error!(head_repo_id = %repo_id, head_branch = branch, error = %e, "failed to find pull requests by head");
            return report;
        }
    };

    if is_sync && !head_prs.is_empty() {
        announce_synchronized(ctx, doer, repo_id, branch, &head_prs).await;
    }

    for pr in &head_prs {
        if shutdown.is_cancelled() {
            report.interrupted = true;
            return report;
        }
        if let Err(e) = push_to_base_repo(ctx, pr).await {
            error!(pr_id = %pr.id(), error = %e, "failed to push to base repo");
            report.failed.push(pr.id());
            continue;
        }
        report.synchronized.push(pr.id());
        enqueue(ctx, pr.id(), &mut report).await;
    }

    debug!(base_repo_id = %repo_id, base_branch = branch, "finding pull requests by base");
    let base_prs = match ctx.pulls.unmerged_by_base(repo_id, branch).await {
        Ok(prs) => prs,
        Err(e) => {
            error!(base_repo_id = %repo_id, base_branch = branch, error = %e, "failed to find pull requests by base");
            return report;
        }
    };

    for pr in &base_prs {
        if shutdown.is_cancelled() {
            report.interrupted = true;
            return report;
        }
        enqueue(ctx, pr.id(), &mut report).await;
    }

    info!(
        repo_id = %repo_id,
        branch,
        enqueued = report.enqueued.len(),
        failed = report.failed.len(),
        "branch scan finished"
    );
    report
}

async fn enqueue(ctx: &PipelineContext, id: PullRequestId, report: &mut ScanReport) {
    match ctx.enqueue(id).await {
        Ok(()) => report.enqueued.push(id),
        Err(e) => {
            error!(pr_id = %id, error = %e, "failed to queue pull request");
            report.failed.push(id);
        }
    }
}

/// Invalidate stale code comments and notify; each step is best-effort
async fn announce_synchronized(
    ctx: &PipelineContext,
    doer: &User,
    repo_id: RepoId,
    branch: &str,
    prs: &[PullRequest],
) {
    let issues = load_issues(ctx, prs).await;
    if let Err(e) = &issues {
        error!(error = %e, "failed to load pull request issues");
    }

    if let Err(e) = invalidate_code_comments(ctx, doer, repo_id, branch, prs).await {
        warn!(repo_id = %repo_id, branch, error = %e, "failed to invalidate code comments");
    }

    if let Ok(issues) = issues {
        for (pr, issue) in prs.iter().zip(&issues) {
            ctx.notifier.pull_request_synchronized(doer, pr, issue).await;
        }
    }
}

async fn load_issues(ctx: &PipelineContext, prs: &[PullRequest]) -> Result<Vec<Issue>> {
    let mut issues = Vec::with_capacity(prs.len());
    for pr in prs {
        issues.push(ctx.issues.get_issue(pr.issue_id()).await?);
    }
    Ok(issues)
}

async fn invalidate_code_comments(
    ctx: &PipelineContext,
    doer: &User,
    repo_id: RepoId,
    branch: &str,
    prs: &[PullRequest],
) -> Result<()> {
    let repo = ctx.repos.get_repository(repo_id).await?;
    let git_repo = ctx.git.open(&repo.path).await?;
    ctx.issues
        .invalidate_code_comments(prs, doer, git_repo.as_ref(), branch)
        .await
}
