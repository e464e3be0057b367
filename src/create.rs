//! Pull request creation
//!
//! The per-repository index is shared with issues, so two concurrent
//! creations can race for it. Each insert attempt allocates an index and
//! writes the issue and pull request in one transaction; a collision rolls the
//! attempt back and the whole attempt is retried, up to
//! `pull_request.max_dup_index_attempts` times.

use crate::context::PipelineContext;
use crate::error::{Error, Result};
use crate::git::is_head_equal_with_branch;
use crate::pull::{NewPullRequest, PullRequest};
use crate::sync::push_to_base_repo;
use crate::types::{Issue, NewIssue, Repository, UserId};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Everything needed to open a pull request
#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    /// Issue fields; the poster becomes the pull request author
    pub issue: NewIssue,
    /// Source and target
    pub pull: NewPullRequest,
    /// Users asked to review
    pub reviewer_ids: Vec<UserId>,
}

/// Open a pull request and queue its first test
///
/// The pull request starts in `checking`. If synchronizing the source branch
/// or queueing fails after the row is committed, the pull request stays in
/// `checking` and the error is returned; a later push or rescan repairs it.
pub async fn create_pull_request(
    ctx: &PipelineContext,
    opts: CreatePullRequest,
) -> Result<(Issue, PullRequest)> {
    let CreatePullRequest {
        issue,
        pull,
        reviewer_ids,
    } = opts;

    let base_repo = ctx.repos.get_repository(pull.base_repo_id).await?;
    let head_repo = if pull.head_repo_id == pull.base_repo_id {
        base_repo.clone()
    } else {
        ctx.repos.get_repository(pull.head_repo_id).await?
    };
    validate(ctx, &pull, &head_repo, &base_repo).await?;

    let pr = PullRequest::new(pull, Utc::now());
    let (issue, pr) = insert_with_retry(ctx, &base_repo, &issue, &pr).await?;
    info!(pr_id = %pr.id(), index = pr.index(), repo = %base_repo.full_name(), "pull request created");

    for reviewer_id in reviewer_ids {
        ctx.issues
            .add_reviewer(&issue, &issue.poster, reviewer_id)
            .await?;
    }

    push_to_base_repo(ctx, &pr).await?;
    ctx.enqueue(pr.id()).await?;
    ctx.notifier.new_pull_request(&pr, &issue).await;

    Ok((issue, pr))
}

/// Reject pull requests that could never be merged or already exist
async fn validate(
    ctx: &PipelineContext,
    pull: &NewPullRequest,
    head_repo: &Repository,
    base_repo: &Repository,
) -> Result<()> {
    if pull.head_repo_id == pull.base_repo_id && pull.head_branch == pull.base_branch {
        return Err(Error::SameBranch(pull.head_branch.clone()));
    }

    if let Some(existing) = ctx
        .pulls
        .find_unmerged(
            pull.head_repo_id,
            pull.base_repo_id,
            &pull.head_branch,
            &pull.base_branch,
        )
        .await?
    {
        return Err(Error::PullRequestAlreadyExists {
            id: existing.id(),
            index: existing.index(),
            head_branch: pull.head_branch.clone(),
            base_branch: pull.base_branch.clone(),
        });
    }

    if is_head_equal_with_branch(
        ctx.git.as_ref(),
        head_repo,
        &pull.head_branch,
        base_repo,
        &pull.base_branch,
    )
    .await?
    {
        return Err(Error::BranchesEqual {
            head_branch: pull.head_branch.clone(),
            base_branch: pull.base_branch.clone(),
        });
    }

    Ok(())
}

/// Insert issue and pull request, retrying the whole attempt on index collisions
async fn insert_with_retry(
    ctx: &PipelineContext,
    repo: &Repository,
    issue: &NewIssue,
    pr: &PullRequest,
) -> Result<(Issue, PullRequest)> {
    let max_attempts = ctx.settings.max_dup_index_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match ctx.pulls.insert_pull_request(repo, issue, pr).await {
            Ok(inserted) => {
                debug!(attempt, "pull request row inserted");
                return Ok(inserted);
            }
            Err(e) if e.is_duplicate_index() => {
                if attempt >= max_attempts {
                    return Err(Error::IndexAllocationExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                warn!(attempt, max_attempts, error = %e, "index collision, retrying insert");
            }
            Err(e) => return Err(e),
        }
    }
}
