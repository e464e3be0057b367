//! Version-control primitives
//!
//! The pipeline never touches object storage directly: it opens repositories,
//! reads branch tips, checks ancestry and pushes through these traits.

mod cli;

pub use cli::GitCli;

use crate::error::Result;
use crate::types::{Repository, User};
use async_trait::async_trait;
use std::path::Path;

/// Env var marking a push as internal (skips user-facing hooks)
pub const ENV_IS_INTERNAL: &str = "PULLQ_IS_INTERNAL";
/// Env var carrying the acting user's id
pub const ENV_PUSHER_ID: &str = "PULLQ_PUSHER_ID";
/// Env var carrying the acting user's login
pub const ENV_PUSHER_NAME: &str = "PULLQ_PUSHER_NAME";
/// Env var carrying the acting user's email
pub const ENV_PUSHER_EMAIL: &str = "PULLQ_PUSHER_EMAIL";
/// Env var carrying the target repository id
pub const ENV_REPO_ID: &str = "PULLQ_REPO_ID";
/// Env var carrying the target repository `owner/name`
pub const ENV_REPO_FULL_NAME: &str = "PULLQ_REPO_FULL_NAME";

/// Options for a single push
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Remote name to push through
    pub remote: String,
    /// `src:dst` refspec
    pub refspec: String,
    /// Force-update the destination
    pub force: bool,
    /// Extra environment for the push and the hooks it triggers
    pub env: Vec<(String, String)>,
}

/// Opens repositories and pushes between them
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Open the repository at `path`; the handle is closed when dropped
    async fn open(&self, path: &Path) -> Result<Box<dyn GitRepository>>;

    /// Push from the repository at `repo_path`
    async fn push(&self, repo_path: &Path, opts: &PushOptions) -> Result<()>;
}

/// An open repository
#[async_trait]
pub trait GitRepository: Send + Sync {
    /// Location on disk
    fn path(&self) -> &Path;

    /// Commit id at the tip of `branch`
    async fn branch_commit_id(&self, branch: &str) -> Result<String>;

    /// Whether `ancestor` is reachable from `descendant`
    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Register a remote
    async fn add_remote(&self, name: &str, url: &str) -> Result<()>;

    /// Unregister a remote
    async fn remove_remote(&self, name: &str) -> Result<()>;

    /// Names of the registered remotes
    async fn remotes(&self) -> Result<Vec<String>>;

    /// Delete a ref if it exists
    async fn delete_ref(&self, refname: &str) -> Result<()>;
}

/// Environment for a push performed by the system on behalf of `pusher`
///
/// Pushes into hidden refs carry this so hooks can attribute the write
/// without applying the checks meant for direct branch pushes.
pub fn internal_push_env(pusher: &User, repo: &Repository) -> Vec<(String, String)> {
    vec![
        (ENV_IS_INTERNAL.to_string(), "true".to_string()),
        (ENV_PUSHER_ID.to_string(), pusher.id.to_string()),
        (ENV_PUSHER_NAME.to_string(), pusher.name.clone()),
        (ENV_PUSHER_EMAIL.to_string(), pusher.email.clone()),
        (ENV_REPO_ID.to_string(), repo.id.to_string()),
        (ENV_REPO_FULL_NAME.to_string(), repo.full_name()),
        ("GIT_AUTHOR_NAME".to_string(), pusher.name.clone()),
        ("GIT_AUTHOR_EMAIL".to_string(), pusher.email.clone()),
        ("GIT_COMMITTER_NAME".to_string(), pusher.name.clone()),
        ("GIT_COMMITTER_EMAIL".to_string(), pusher.email.clone()),
    ]
}

/// Whether every commit of `head_branch` is already contained in `branch`
/// of the base repository
pub async fn is_head_equal_with_branch(
    git: &dyn GitBackend,
    head_repo: &Repository,
    head_branch: &str,
    base_repo: &Repository,
    branch: &str,
) -> Result<bool> {
    let base = git.open(&base_repo.path).await?;
    let base_commit = base.branch_commit_id(branch).await?;

    let head = git.open(&head_repo.path).await?;
    let head_commit = head.branch_commit_id(head_branch).await?;

    base.is_ancestor(&head_commit, &base_commit).await
}
