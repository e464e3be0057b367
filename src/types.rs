//! Core types for pullq

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Repository id
    RepoId
);
id_type!(
    /// User id
    UserId
);
id_type!(
    /// Issue id
    IssueId
);
id_type!(
    /// Pull request id
    PullRequestId
);
id_type!(
    /// Comment id
    CommentId
);

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// User id
    pub id: UserId,
    /// Login name
    pub name: String,
    /// Primary email
    pub email: String,
}

/// A hosted repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    /// Repository id
    pub id: RepoId,
    /// Owner login
    pub owner_name: String,
    /// Repository name
    pub name: String,
    /// On-disk location of the bare repository
    pub path: PathBuf,
}

impl Repository {
    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner_name, self.name)
    }
}

/// The discussion thread a pull request is attached to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    /// Issue id
    pub id: IssueId,
    /// Repository the issue lives in
    pub repo_id: RepoId,
    /// Per-repository sequential index, shared by issues and pull requests
    pub index: i64,
    /// Title
    pub title: String,
    /// Body
    pub body: String,
    /// Author
    pub poster: User,
    /// Whether the issue is closed
    pub is_closed: bool,
    /// Whether the issue backs a pull request
    pub is_pull: bool,
    /// When the issue was created
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when opening a new pull request issue
#[derive(Debug, Clone)]
pub struct NewIssue {
    /// Title
    pub title: String,
    /// Body
    pub body: String,
    /// Author
    pub poster: User,
    /// Label ids to attach
    pub label_ids: Vec<i64>,
}

/// Kind of audit comment recorded on an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommentKind {
    /// Target branch of a pull request changed
    ChangeTargetBranch {
        /// Previous target branch
        old_ref: String,
        /// New target branch
        new_ref: String,
    },
    /// Issue was closed
    Close,
}

/// Options for recording an audit comment
#[derive(Debug, Clone)]
pub struct CreateComment {
    /// Comment kind and payload
    pub kind: CommentKind,
    /// Acting user
    pub doer: User,
    /// Repository the issue lives in
    pub repo_id: RepoId,
    /// Issue to comment on
    pub issue_id: IssueId,
}

/// An audit comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment id
    pub id: CommentId,
    /// Issue the comment belongs to
    pub issue_id: IssueId,
    /// Author
    pub poster_id: UserId,
    /// Kind and payload
    pub kind: CommentKind,
    /// When the comment was created
    pub created_at: DateTime<Utc>,
}

/// Protected-branch policy for a target branch
///
/// Derived at load time, never persisted with the pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedBranch {
    /// Repository the rule belongs to
    pub repo_id: RepoId,
    /// Protected branch name
    pub branch_name: String,
    /// Number of approvals required before merging
    pub required_approvals: u32,
}

/// Merge strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStyle {
    /// Create a merge commit
    #[default]
    Merge,
    /// Rebase before merging
    Rebase,
    /// Rebase before merging with a merge commit (--no-ff)
    RebaseMerge,
    /// Squash commits into a single commit
    Squash,
}

impl std::fmt::Display for MergeStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
            Self::RebaseMerge => write!(f, "rebase-merge"),
            Self::Squash => write!(f, "squash"),
        }
    }
}

impl FromStr for MergeStyle {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Self::Merge),
            "rebase" => Ok(Self::Rebase),
            "rebase-merge" => Ok(Self::RebaseMerge),
            "squash" => Ok(Self::Squash),
            other => Err(crate::error::Error::Config(format!(
                "unknown merge style: {other}"
            ))),
        }
    }
}
