//! Branch synchronizer
//!
//! Mirrors the tip of a pull request's source branch into the hidden ref
//! `refs/pull/<index>/head` of the target repository, so patch tests and
//! merges can read the source commits without fetching across repositories.

use crate::context::PipelineContext;
use crate::error::Result;
use crate::git::{GitRepository, PushOptions, internal_push_env};
use crate::pull::PullRequest;
use crate::store::load_repositories;
use crate::types::{Issue, Repository};
use std::path::Path;
use tracing::{debug, warn};

/// A remote registered for the duration of one synchronization
///
/// Call [`TempRemote::release`] on every path once it has been added.
struct TempRemote<'a> {
    repo: &'a dyn GitRepository,
    name: String,
}

impl<'a> TempRemote<'a> {
    async fn add(repo: &'a dyn GitRepository, name: String, url: &Path) -> Result<Self> {
        repo.add_remote(&name, &url.to_string_lossy()).await?;
        Ok(Self { repo, name })
    }

    /// Remove the remote; failures are logged only
    async fn release(self) {
        if let Err(e) = self.repo.remove_remote(&self.name).await {
            warn!(remote = %self.name, error = %e, "failed to remove temporary remote");
        }
    }
}

/// Force-push the source branch into the target repository's hidden ref
///
/// Failing to open the source repository, register the temporary remote,
/// load the poster or push is an error. The temporary remote is removed
/// whatever the outcome.
pub async fn push_to_base_repo(ctx: &PipelineContext, pr: &PullRequest) -> Result<()> {
    let refname = pr.git_ref_name();
    debug!(pr_id = %pr.id(), base_repo_id = %pr.base_repo_id(), %refname, "pushing commits to base repo");

    let (head_repo, base_repo) = load_repositories(ctx.repos.as_ref(), pr).await?;
    let head = ctx.git.open(&head_repo.path).await?;

    let remote = TempRemote::add(head.as_ref(), pr.temp_remote_name(), &base_repo.path).await?;
    let result = push_hidden_ref(ctx, pr, &head_repo, &base_repo, &remote.name).await;
    remote.release().await;
    result
}

async fn push_hidden_ref(
    ctx: &PipelineContext,
    pr: &PullRequest,
    head_repo: &Repository,
    base_repo: &Repository,
    remote: &str,
) -> Result<()> {
    let refname = pr.git_ref_name();
    clear_hidden_ref(ctx, base_repo, &refname).await;

    let issue = load_issue_with_poster(ctx, pr).await?;

    ctx.git
        .push(
            &head_repo.path,
            &PushOptions {
                remote: remote.to_string(),
                refspec: format!("{}:{refname}", pr.head_branch()),
                force: true,
                env: internal_push_env(&issue.poster, base_repo),
            },
        )
        .await?;

    debug!(pr_id = %pr.id(), %refname, "hidden ref updated");
    Ok(())
}

/// Drop a stale hidden ref so the force-push cannot conflict with it
async fn clear_hidden_ref(ctx: &PipelineContext, base_repo: &Repository, refname: &str) {
    let outcome = match ctx.git.open(&base_repo.path).await {
        Ok(base) => base.delete_ref(refname).await,
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        debug!(%refname, error = %e, "could not clear hidden ref");
    }
}

async fn load_issue_with_poster(ctx: &PipelineContext, pr: &PullRequest) -> Result<Issue> {
    let mut issue = ctx.issues.get_issue(pr.issue_id()).await?;
    issue.poster = ctx.issues.get_user(issue.poster.id).await?;
    Ok(issue)
}
