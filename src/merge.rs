//! Merge finalization and default merge messages

use crate::context::PipelineContext;
use crate::error::Result;
use crate::pull::PullRequest;
use crate::types::User;
use chrono::{DateTime, Utc};
use tracing::info;

/// Move `pr` into the terminal merged state
///
/// The merged commit, merge time and merger must already be recorded (see
/// [`PullRequest::record_merge`]). Closing the issue and writing the merge
/// columns happen in one store transaction; on any failure `pr` is left
/// untouched.
pub async fn set_merged(ctx: &PipelineContext, pr: &mut PullRequest) -> Result<()> {
    let mut merged = pr.clone();
    merged.mark_merged(Utc::now())?;
    ctx.pulls.finalize_merge(&merged).await?;
    *pr = merged;

    info!(
        pr_id = %pr.id(),
        index = pr.index(),
        commit = pr.merged_commit_id(),
        "pull request merged"
    );
    Ok(())
}

/// Commit message for merging `pr` in the configured default merge style
pub async fn default_merge_message(ctx: &PipelineContext, pr: &PullRequest) -> Result<String> {
    let head_repo = ctx.repos.get_repository(pr.head_repo_id()).await?;
    let issue = ctx.issues.get_issue(pr.issue_id()).await?;
    Ok(pr.default_message(ctx.settings.default_merge_style, &head_repo, &issue))
}

/// Record a merge that happened outside the pipeline
///
/// Only a `mergeable` pull request can be marked; it becomes
/// `manually-merged` and is then finalized like any other merge.
pub async fn merge_manually(
    ctx: &PipelineContext,
    pr: &mut PullRequest,
    doer: &User,
    commit_id: &str,
    merged_at: DateTime<Utc>,
) -> Result<()> {
    let mut marked = pr.clone();
    marked.mark_manually_merged()?;
    marked.record_merge(commit_id, doer.clone(), merged_at)?;
    set_merged(ctx, &mut marked).await?;
    *pr = marked;
    Ok(())
}
