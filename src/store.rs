//! Persistence seams
//!
//! Repositories, issues and pull request rows are owned by an external
//! record store. These traits describe exactly what the pipeline needs from
//! it, so the same protocols run against a database or an in-memory double.

use crate::error::Result;
use crate::git::GitRepository;
use crate::pull::{Column, PullRequest};
use crate::types::{
    Comment, CreateComment, Issue, IssueId, NewIssue, ProtectedBranch, PullRequestId, RepoId,
    Repository, User, UserId,
};
use async_trait::async_trait;

/// Repository lookups
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Fetch a repository by id
    async fn get_repository(&self, id: RepoId) -> Result<Repository>;

    /// Fetch a repository by owner and name
    async fn get_repository_by_name(&self, owner: &str, name: &str) -> Result<Repository>;

    /// Protected-branch rule for a branch, if one exists
    async fn get_protected_branch(
        &self,
        repo_id: RepoId,
        branch: &str,
    ) -> Result<Option<ProtectedBranch>>;
}

/// Issue, user and comment operations
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Fetch an issue by id
    async fn get_issue(&self, id: IssueId) -> Result<Issue>;

    /// Fetch a user by id
    async fn get_user(&self, id: UserId) -> Result<User>;

    /// Record an audit comment
    async fn create_comment(&self, opts: CreateComment) -> Result<Comment>;

    /// Request a review from `reviewer_id`
    async fn add_reviewer(&self, issue: &Issue, doer: &User, reviewer_id: UserId) -> Result<()>;

    /// Mark code comments on rewritten lines of `branch` as outdated
    async fn invalidate_code_comments(
        &self,
        prs: &[PullRequest],
        doer: &User,
        repo: &dyn GitRepository,
        branch: &str,
    ) -> Result<()>;
}

/// Pull request rows
#[async_trait]
pub trait PullRequestStore: Send + Sync {
    /// Fetch a pull request by id
    async fn get_pull_request(&self, id: PullRequestId) -> Result<PullRequest>;

    /// Fetch a pull request by target repository and index
    async fn get_pull_request_by_index(&self, repo_id: RepoId, index: i64) -> Result<PullRequest>;

    /// Fetch the pull request backed by an issue
    async fn get_pull_request_by_issue(&self, issue_id: IssueId) -> Result<PullRequest>;

    /// The open, unmerged pull request proposing exactly this change, if any
    async fn find_unmerged(
        &self,
        head_repo_id: RepoId,
        base_repo_id: RepoId,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<Option<PullRequest>>;

    /// Most recent pull request for a source branch, whatever its state
    async fn latest_by_head(&self, repo_id: RepoId, branch: &str) -> Result<Option<PullRequest>>;

    /// Unmerged pull requests whose source is `(repo_id, branch)`
    async fn unmerged_by_head(&self, repo_id: RepoId, branch: &str) -> Result<Vec<PullRequest>>;

    /// Unmerged pull requests whose target is `(repo_id, branch)`
    async fn unmerged_by_base(&self, repo_id: RepoId, branch: &str) -> Result<Vec<PullRequest>>;

    /// Unmerged pull requests whose status is `checking`
    async fn list_checking(&self) -> Result<Vec<PullRequest>>;

    /// One insert attempt: allocate the next issue index of `repo` and insert
    /// the issue and the pull request in a single transaction
    ///
    /// Returns [`crate::error::Error::DuplicateIndex`] when another writer took
    /// the index first; nothing is persisted in that case.
    async fn insert_pull_request(
        &self,
        repo: &Repository,
        issue: &NewIssue,
        pr: &PullRequest,
    ) -> Result<(Issue, PullRequest)>;

    /// Write back the given columns of `pr`
    async fn update_columns(&self, pr: &PullRequest, columns: &[Column]) -> Result<()>;

    /// Close the backing issue as the merger and write the merge columns,
    /// atomically
    async fn finalize_merge(&self, pr: &PullRequest) -> Result<()>;
}

/// Load the source and target repositories of a pull request
///
/// Same-repository pull requests share a single lookup.
pub async fn load_repositories(
    repos: &dyn RepositoryStore,
    pr: &PullRequest,
) -> Result<(Repository, Repository)> {
    let base = repos.get_repository(pr.base_repo_id()).await?;
    let head = if pr.is_same_repo() {
        base.clone()
    } else {
        repos.get_repository(pr.head_repo_id()).await?
    };
    Ok((head, base))
}

/// Attach the protected-branch rule of the target branch
pub async fn load_protected_branch(
    repos: &dyn RepositoryStore,
    pr: &mut PullRequest,
) -> Result<()> {
    let rule = repos
        .get_protected_branch(pr.base_repo_id(), pr.base_branch())
        .await?;
    pr.set_protected_branch(rule);
    Ok(())
}
