//! Pull request entity and its state machine
//!
//! `PullRequest` keeps its fields private: status, conflict data and the
//! merged flag change only through the transition methods defined here.
//! Stores persist and hydrate it through [`PullRequestRecord`].

mod status;

pub use status::PullRequestStatus;

use crate::error::{Error, Result};
use crate::patch::PatchOutcome;
use crate::types::{
    Issue, IssueId, MergeStyle, ProtectedBranch, PullRequestId, RepoId, Repository, User,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the pull request is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestKind {
    /// Hosted here, head and base are local repositories
    #[default]
    Hosted,
    /// Mirrored from an external tracker
    External,
}

/// Caller-supplied fields for a new pull request
#[derive(Debug, Clone)]
pub struct NewPullRequest {
    /// Hosted or external
    pub kind: PullRequestKind,
    /// Source repository
    pub head_repo_id: RepoId,
    /// Source branch
    pub head_branch: String,
    /// Target repository
    pub base_repo_id: RepoId,
    /// Target branch
    pub base_branch: String,
}

/// Persisted columns of a pull request row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    /// Row id
    pub id: PullRequestId,
    /// Hosted or external
    pub kind: PullRequestKind,
    /// Mergeability status
    pub status: PullRequestStatus,
    /// Files that conflicted in the last test merge
    pub conflicted_files: Vec<String>,
    /// Backing issue
    pub issue_id: IssueId,
    /// Sequential index shared with the issue
    pub index: i64,
    /// Source repository
    pub head_repo_id: RepoId,
    /// Source branch
    pub head_branch: String,
    /// Target repository
    pub base_repo_id: RepoId,
    /// Target branch
    pub base_branch: String,
    /// Merge base commit id from the last test merge
    pub merge_base: String,
    /// Terminal merged flag
    pub has_merged: bool,
    /// Commit id produced by the merge
    pub merged_commit_id: String,
    /// User who merged
    pub merger: Option<User>,
    /// When the merge happened
    pub merged_at: Option<DateTime<Utc>>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Columns that can be written back selectively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// `status`
    Status,
    /// `conflicted_files`
    ConflictedFiles,
    /// `base_branch`
    BaseBranch,
    /// `merge_base`
    MergeBase,
    /// `has_merged`
    HasMerged,
    /// `merged_commit_id`
    MergedCommitId,
    /// `merger_id`
    Merger,
    /// `merged_unix`
    MergedAt,
    /// `updated_unix`
    UpdatedAt,
}

/// Columns written after a patch test
pub const STATUS_COLUMNS: &[Column] = &[
    Column::Status,
    Column::ConflictedFiles,
    Column::MergeBase,
    Column::UpdatedAt,
];

/// Columns written after a target-branch change
pub const RETARGET_COLUMNS: &[Column] = &[
    Column::Status,
    Column::ConflictedFiles,
    Column::BaseBranch,
    Column::MergeBase,
    Column::UpdatedAt,
];

/// Columns written when a merge is finalized
pub const MERGE_COLUMNS: &[Column] = &[
    Column::HasMerged,
    Column::Status,
    Column::MergedCommitId,
    Column::Merger,
    Column::MergedAt,
    Column::UpdatedAt,
];

/// A pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    id: PullRequestId,
    kind: PullRequestKind,
    status: PullRequestStatus,
    conflicted_files: Vec<String>,
    issue_id: IssueId,
    index: i64,
    head_repo_id: RepoId,
    head_branch: String,
    base_repo_id: RepoId,
    base_branch: String,
    protected_branch: Option<ProtectedBranch>,
    merge_base: String,
    has_merged: bool,
    merged_commit_id: String,
    merger: Option<User>,
    merged_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl PullRequest {
    /// A not-yet-persisted pull request in the `checking` state
    ///
    /// Id, issue and index are assigned by the store on insert.
    pub fn new(new: NewPullRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: PullRequestId(0),
            kind: new.kind,
            status: PullRequestStatus::Checking,
            conflicted_files: Vec::new(),
            issue_id: IssueId(0),
            index: 0,
            head_repo_id: new.head_repo_id,
            head_branch: new.head_branch,
            base_repo_id: new.base_repo_id,
            base_branch: new.base_branch,
            protected_branch: None,
            merge_base: String::new(),
            has_merged: false,
            merged_commit_id: String::new(),
            merger: None,
            merged_at: None,
            updated_at: now,
        }
    }

    /// Snapshot of the persisted columns
    pub fn to_record(&self) -> PullRequestRecord {
        PullRequestRecord {
            id: self.id,
            kind: self.kind,
            status: self.status,
            conflicted_files: self.conflicted_files.clone(),
            issue_id: self.issue_id,
            index: self.index,
            head_repo_id: self.head_repo_id,
            head_branch: self.head_branch.clone(),
            base_repo_id: self.base_repo_id,
            base_branch: self.base_branch.clone(),
            merge_base: self.merge_base.clone(),
            has_merged: self.has_merged,
            merged_commit_id: self.merged_commit_id.clone(),
            merger: self.merger.clone(),
            merged_at: self.merged_at,
            updated_at: self.updated_at,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Row id
    pub const fn id(&self) -> PullRequestId {
        self.id
    }

    /// Hosted or external
    pub const fn kind(&self) -> PullRequestKind {
        self.kind
    }

    /// Current mergeability status
    pub const fn status(&self) -> PullRequestStatus {
        self.status
    }

    /// Files that conflicted in the last test merge
    pub fn conflicted_files(&self) -> &[String] {
        &self.conflicted_files
    }

    /// Backing issue id
    pub const fn issue_id(&self) -> IssueId {
        self.issue_id
    }

    /// Sequential index shared with the issue
    pub const fn index(&self) -> i64 {
        self.index
    }

    /// Source repository id
    pub const fn head_repo_id(&self) -> RepoId {
        self.head_repo_id
    }

    /// Source branch
    pub fn head_branch(&self) -> &str {
        &self.head_branch
    }

    /// Target repository id
    pub const fn base_repo_id(&self) -> RepoId {
        self.base_repo_id
    }

    /// Target branch
    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    /// Protected-branch rule of the target branch, if loaded
    pub const fn protected_branch(&self) -> Option<&ProtectedBranch> {
        self.protected_branch.as_ref()
    }

    /// Merge base from the last test merge
    pub fn merge_base(&self) -> &str {
        &self.merge_base
    }

    /// Terminal merged flag
    pub const fn is_merged(&self) -> bool {
        self.has_merged
    }

    /// Commit produced by the merge
    pub fn merged_commit_id(&self) -> &str {
        &self.merged_commit_id
    }

    /// User who merged
    pub const fn merger(&self) -> Option<&User> {
        self.merger.as_ref()
    }

    /// When the merge happened
    pub const fn merged_at(&self) -> Option<DateTime<Utc>> {
        self.merged_at
    }

    /// Last modification time
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Hidden ref that stages the source commits inside the target repository
    pub fn git_ref_name(&self) -> String {
        format!("refs/pull/{}/head", self.index)
    }

    /// Name of the temporary remote used while synchronizing this pull request
    pub fn temp_remote_name(&self) -> String {
        format!("tmp-pull-{}", self.id)
    }

    /// Whether source and target live in the same repository
    pub fn is_same_repo(&self) -> bool {
        self.head_repo_id == self.base_repo_id
    }

    /// Whether mergeability is still being computed
    pub fn is_checking(&self) -> bool {
        self.status == PullRequestStatus::Checking
    }

    /// Whether the pull request can be merged automatically
    pub fn can_auto_merge(&self) -> bool {
        self.status == PullRequestStatus::Mergeable
    }

    /// Whether the last test merge reported conflicting files
    pub fn is_files_conflicted(&self) -> bool {
        !self.conflicted_files.is_empty()
    }

    /// Default commit message for a merge commit
    pub fn default_merge_message(&self, head_repo: &Repository) -> String {
        format!(
            "Merge branch '{}' of {}/{} into {}",
            self.head_branch, head_repo.owner_name, head_repo.name, self.base_branch
        )
    }

    /// Default commit message for a squash merge
    pub fn default_squash_message(issue: &Issue) -> String {
        format!("{} (#{})", issue.title, issue.index)
    }

    /// Default commit message for the given merge style
    pub fn default_message(
        &self,
        style: MergeStyle,
        head_repo: &Repository,
        issue: &Issue,
    ) -> String {
        match style {
            MergeStyle::Squash => Self::default_squash_message(issue),
            MergeStyle::Merge | MergeStyle::Rebase | MergeStyle::RebaseMerge => {
                self.default_merge_message(head_repo)
            }
        }
    }

    /// Verify the caller filled in every merge field
    pub fn check_merge_fields(&self) -> Result<()> {
        if self.merged_commit_id.is_empty() || self.merged_at.is_none() || self.merger.is_none()
        {
            return Err(Error::MissingMergeFields { index: self.index });
        }
        Ok(())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Invalidate the previous verdict and re-enter `checking`
    pub fn begin_check(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_merged()?;
        if self.status == PullRequestStatus::ManuallyMerged {
            return Err(self.invalid(PullRequestStatus::Checking));
        }
        self.status = PullRequestStatus::Checking;
        self.conflicted_files.clear();
        self.updated_at = now;
        Ok(())
    }

    /// Apply a completed patch test: `checking` → `mergeable` or `conflict`
    pub fn apply_patch_outcome(&mut self, outcome: PatchOutcome, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_merged()?;
        let next = if outcome.conflicted_files.is_empty() {
            PullRequestStatus::Mergeable
        } else {
            PullRequestStatus::Conflict
        };
        if self.status != PullRequestStatus::Checking {
            return Err(self.invalid(next));
        }
        self.status = next;
        self.conflicted_files = outcome.conflicted_files;
        self.merge_base = outcome.merge_base;
        self.updated_at = now;
        Ok(())
    }

    /// Fill in merge fields ahead of [`crate::merge::set_merged`]
    pub fn record_merge(
        &mut self,
        merged_commit_id: impl Into<String>,
        merger: User,
        merged_at: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_not_merged()?;
        self.merged_commit_id = merged_commit_id.into();
        self.merger = Some(merger);
        self.merged_at = Some(merged_at);
        Ok(())
    }

    /// Attach the derived protected-branch rule of the target branch
    pub fn set_protected_branch(&mut self, rule: Option<ProtectedBranch>) {
        self.protected_branch = rule;
    }

    pub(crate) fn set_base_branch(&mut self, branch: impl Into<String>) {
        self.base_branch = branch.into();
    }

    pub(crate) fn mark_manually_merged(&mut self) -> Result<()> {
        self.ensure_not_merged()?;
        if self.status != PullRequestStatus::Mergeable {
            return Err(self.invalid(PullRequestStatus::ManuallyMerged));
        }
        self.status = PullRequestStatus::ManuallyMerged;
        Ok(())
    }

    pub(crate) fn mark_merged(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_merged()?;
        self.check_merge_fields()?;
        self.has_merged = true;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_not_merged(&self) -> Result<()> {
        if self.has_merged {
            return Err(Error::AlreadyMerged {
                id: self.id,
                index: self.index,
                head_branch: self.head_branch.clone(),
                base_branch: self.base_branch.clone(),
            });
        }
        Ok(())
    }

    fn invalid(&self, to: PullRequestStatus) -> Error {
        Error::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

impl TryFrom<PullRequestRecord> for PullRequest {
    type Error = Error;

    fn try_from(record: PullRequestRecord) -> Result<Self> {
        if record.has_merged
            && (record.merged_commit_id.is_empty()
                || record.merged_at.is_none()
                || record.merger.is_none())
        {
            return Err(Error::Store(format!(
                "pull request {} is marked merged but its merge fields are empty",
                record.id
            )));
        }
        Ok(Self {
            id: record.id,
            kind: record.kind,
            status: record.status,
            conflicted_files: record.conflicted_files,
            issue_id: record.issue_id,
            index: record.index,
            head_repo_id: record.head_repo_id,
            head_branch: record.head_branch,
            base_repo_id: record.base_repo_id,
            base_branch: record.base_branch,
            protected_branch: None,
            merge_base: record.merge_base,
            has_merged: record.has_merged,
            merged_commit_id: record.merged_commit_id,
            merger: record.merger,
            merged_at: record.merged_at,
            updated_at: record.updated_at,
        })
    }
}

/// Returns the work-in-progress prefix of `title` as written, if any
///
/// Prefixes match case-insensitively.
pub fn work_in_progress_prefix<'a>(title: &'a str, prefixes: &[String]) -> Option<&'a str> {
    prefixes
        .iter()
        .find_map(|prefix| strip_prefix_ignore_case(title, prefix))
}

/// The leading part of `title` matching `prefix` char by char, ignoring case
fn strip_prefix_ignore_case<'a>(title: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = title.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = chars.next()?;
        if !actual.to_uppercase().eq(expected.to_uppercase()) {
            return None;
        }
    }
    let end = chars.next().map_or(title.len(), |(i, _)| i);
    title.get(..end)
}

/// Whether `title` marks the pull request as work in progress
pub fn is_work_in_progress(title: &str, prefixes: &[String]) -> bool {
    work_in_progress_prefix(title, prefixes).is_some()
}
