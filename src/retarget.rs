//! Changing the target branch of a pull request

use crate::context::PipelineContext;
use crate::error::{Error, Result};
use crate::git::is_head_equal_with_branch;
use crate::patch::retest;
use crate::pull::{PullRequest, RETARGET_COLUMNS};
use crate::store::{load_protected_branch, load_repositories};
use crate::types::{CommentKind, CreateComment, User};
use tracing::{debug, info};

/// Point `pr` at `target_branch`, re-test it and record an audit comment
///
/// Preconditions are checked in order and the first failure is returned:
/// closed issue, already merged, source already contained in the new
/// target, another unmerged pull request for the same pair. Changing to the
/// current target is a no-op.
///
/// `pr` is only updated once the new target and verdict are persisted. If the
/// audit comment fails after that, the error is returned with `pr` already
/// updated.
pub async fn change_target_branch(
    ctx: &PipelineContext,
    pr: &mut PullRequest,
    doer: &User,
    target_branch: &str,
) -> Result<()> {
    if pr.base_branch() == target_branch {
        debug!(pr_id = %pr.id(), target_branch, "target branch unchanged");
        return Ok(());
    }

    let issue = ctx.issues.get_issue(pr.issue_id()).await?;
    if issue.is_closed {
        return Err(Error::IssueClosed {
            id: issue.id,
            repo_id: issue.repo_id,
            index: issue.index,
        });
    }

    if pr.is_merged() {
        return Err(Error::AlreadyMerged {
            id: pr.id(),
            index: pr.index(),
            head_branch: pr.head_branch().to_string(),
            base_branch: pr.base_branch().to_string(),
        });
    }

    let (head_repo, base_repo) = load_repositories(ctx.repos.as_ref(), pr).await?;
    if is_head_equal_with_branch(
        ctx.git.as_ref(),
        &head_repo,
        pr.head_branch(),
        &base_repo,
        target_branch,
    )
    .await?
    {
        return Err(Error::BranchesEqual {
            head_branch: pr.head_branch().to_string(),
            base_branch: target_branch.to_string(),
        });
    }

    if let Some(existing) = ctx
        .pulls
        .find_unmerged(
            pr.head_repo_id(),
            pr.base_repo_id(),
            pr.head_branch(),
            target_branch,
        )
        .await?
    {
        return Err(Error::PullRequestAlreadyExists {
            id: existing.id(),
            index: existing.index(),
            head_branch: existing.head_branch().to_string(),
            base_branch: existing.base_branch().to_string(),
        });
    }

    let old_branch = pr.base_branch().to_string();
    let mut updated = pr.clone();
    updated.set_base_branch(target_branch);
    load_protected_branch(ctx.repos.as_ref(), &mut updated).await?;
    retest(&mut updated, ctx.patch.as_ref()).await?;
    ctx.pulls.update_columns(&updated, RETARGET_COLUMNS).await?;
    *pr = updated;

    info!(
        pr_id = %pr.id(),
        old = %old_branch,
        new = target_branch,
        status = %pr.status(),
        "target branch changed"
    );

    ctx.issues
        .create_comment(CreateComment {
            kind: CommentKind::ChangeTargetBranch {
                old_ref: old_branch,
                new_ref: target_branch.to_string(),
            },
            doer: doer.clone(),
            repo_id: issue.repo_id,
            issue_id: issue.id,
        })
        .await?;

    Ok(())
}
