//! Error types for pullq

use crate::types::{IssueId, PullRequestId, RepoId};
use thiserror::Error;

/// Errors produced by the pipeline
///
/// Variants fall into four groups: business rejections (never retried),
/// race errors (retried by the creation protocol), collaborator failures
/// (surfaced to the immediate caller) and queue/config errors.
#[derive(Debug, Error)]
pub enum Error {
    // =========================================================================
    // Business rejections
    // =========================================================================
    /// The issue backing the pull request is closed
    #[error("issue #{index} (id {id}) in repository {repo_id} is closed")]
    IssueClosed {
        /// Issue id
        id: IssueId,
        /// Repository the issue belongs to
        repo_id: RepoId,
        /// Per-repository sequential index
        index: i64,
    },

    /// The pull request has already been merged
    #[error("pull request #{index} ({head_branch} -> {base_branch}) has already been merged")]
    AlreadyMerged {
        /// Pull request id
        id: PullRequestId,
        /// Per-repository sequential index
        index: i64,
        /// Source branch
        head_branch: String,
        /// Target branch
        base_branch: String,
    },

    /// Every commit of the source branch is already in the target branch
    #[error("branches are equal: {head_branch} is already contained in {base_branch}")]
    BranchesEqual {
        /// Source branch
        head_branch: String,
        /// Target branch
        base_branch: String,
    },

    /// Source and target are the same branch of the same repository
    #[error("source and target are the same branch: {0}")]
    SameBranch(String),

    /// Another open, unmerged pull request already proposes the same change
    #[error(
        "pull request #{index} (id {id}) already exists for {head_branch} -> {base_branch}"
    )]
    PullRequestAlreadyExists {
        /// Existing pull request id
        id: PullRequestId,
        /// Existing pull request index
        index: i64,
        /// Source branch
        head_branch: String,
        /// Target branch
        base_branch: String,
    },

    /// Merge fields must be filled in before finalizing a merge
    #[error("unable to merge pull request #{index}: merged commit, merge time and merger are required")]
    MissingMergeFields {
        /// Per-repository sequential index
        index: i64,
    },

    /// A state transition that the state machine does not allow
    #[error("invalid pull request transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// The acting user may not perform the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // =========================================================================
    // Race errors
    // =========================================================================
    /// Another writer took the sequential index first
    #[error("duplicate index {index} for repository {repo_id}")]
    DuplicateIndex {
        /// Target repository
        repo_id: RepoId,
        /// The index that collided
        index: i64,
    },

    /// Index allocation kept colliding until the attempt ceiling was hit
    #[error("too many errors attempting to insert the new pull request ({attempts} attempts), last error: {last}")]
    IndexAllocationExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The last collision
        last: Box<Error>,
    },

    // =========================================================================
    // Lookups and collaborators
    // =========================================================================
    /// Pull request lookup failed
    #[error("pull request not found: {0}")]
    PullRequestNotFound(String),

    /// Repository lookup failed
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    /// Issue lookup failed
    #[error("issue not found: {0}")]
    IssueNotFound(IssueId),

    /// User lookup failed
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Version-control operation failed
    #[error("git error: {0}")]
    Git(String),

    /// Persistent store failure
    #[error("store error: {0}")]
    Store(String),

    /// Patch test failure
    #[error("patch test failed: {0}")]
    Patch(String),

    // =========================================================================
    // Queue, config, misc
    // =========================================================================
    /// Work queue failure
    #[error("queue error: {0}")]
    Queue(String),

    /// The queue has been shut down
    #[error("queue is closed")]
    QueueClosed,

    /// Malformed work item payload
    #[error("invalid work item payload: {0}")]
    InvalidPayload(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a sequential-index collision that may be retried
    pub const fn is_duplicate_index(&self) -> bool {
        matches!(self, Self::DuplicateIndex { .. })
    }

    /// Whether this error is a business rejection surfaced verbatim to callers
    pub const fn is_business(&self) -> bool {
        matches!(
            self,
            Self::IssueClosed { .. }
                | Self::AlreadyMerged { .. }
                | Self::BranchesEqual { .. }
                | Self::SameBranch(_)
                | Self::PullRequestAlreadyExists { .. }
                | Self::MissingMergeFields { .. }
                | Self::InvalidTransition { .. }
                | Self::PermissionDenied(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Queue(e.to_string())
    }
}

/// Result type alias for pullq operations
pub type Result<T> = std::result::Result<T, Error>;
