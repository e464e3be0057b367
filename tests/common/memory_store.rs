//! In-memory record store for testing
//!
//! Implements all three store traits over one `Mutex`, so multi-row writes
//! (insert, merge finalization) are atomic the same way a database
//! transaction would be.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use pullq::error::{Error, Result};
use pullq::git::GitRepository;
use pullq::pull::{
    Column, MERGE_COLUMNS, NewPullRequest, PullRequest, PullRequestRecord, PullRequestStatus,
};
use pullq::store::{IssueStore, PullRequestStore, RepositoryStore};
use pullq::types::{
    Comment, CommentId, CommentKind, CreateComment, Issue, IssueId, NewIssue, ProtectedBranch,
    PullRequestId, RepoId, Repository, User, UserId,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Call record for `invalidate_code_comments`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidateCall {
    pub pr_ids: Vec<PullRequestId>,
    pub doer_id: UserId,
    pub repo_path: PathBuf,
    pub branch: String,
}

/// Call record for `update_columns`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub pr_id: PullRequestId,
    pub columns: Vec<Column>,
}

#[derive(Default)]
struct State {
    repos: HashMap<RepoId, Repository>,
    protected: Vec<ProtectedBranch>,
    users: HashMap<UserId, User>,
    issues: HashMap<IssueId, Issue>,
    pulls: HashMap<PullRequestId, PullRequestRecord>,
    comments: Vec<Comment>,
    reviewers: Vec<(IssueId, UserId)>,
    last_index: HashMap<RepoId, i64>,
    next_id: i64,
    // Call tracking
    insert_attempts: usize,
    invalidations: Vec<InvalidateCall>,
    updates: Vec<UpdateCall>,
    // Error injection
    collisions_left: usize,
    deny_insert: Option<String>,
    error_on_finalize: Option<String>,
    error_on_update: Option<String>,
    error_on_get_issue: Option<String>,
    error_on_invalidate: Option<String>,
    error_on_comment: Option<String>,
    error_on_unmerged_by_head: Option<String>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn take_index(&mut self, repo_id: RepoId) -> i64 {
        let last = self.last_index.entry(repo_id).or_insert(0);
        *last += 1;
        *last
    }

    fn is_open(&self, record: &PullRequestRecord) -> bool {
        !record.has_merged
            && self
                .issues
                .get(&record.issue_id)
                .is_some_and(|issue| !issue.is_closed)
    }

    fn hydrate(&self, record: &PullRequestRecord) -> Result<PullRequest> {
        PullRequest::try_from(record.clone())
    }

    fn select(&self, pred: impl Fn(&PullRequestRecord) -> bool) -> Result<Vec<PullRequest>> {
        let mut records: Vec<&PullRequestRecord> =
            self.pulls.values().filter(|r| pred(r)).collect();
        records.sort_by_key(|r| r.id);
        records.into_iter().map(|r| self.hydrate(r)).collect()
    }

    fn insert(
        &mut self,
        repo: &Repository,
        issue: &NewIssue,
        pr: &PullRequest,
    ) -> Result<(Issue, PullRequest)> {
        self.insert_attempts += 1;
        if let Some(msg) = &self.deny_insert {
            return Err(Error::PermissionDenied(msg.clone()));
        }

        let index = self.take_index(repo.id);
        if self.collisions_left > 0 {
            // Another writer won this index
            self.collisions_left -= 1;
            return Err(Error::DuplicateIndex {
                repo_id: repo.id,
                index,
            });
        }

        let issue = Issue {
            id: IssueId(self.next_id()),
            repo_id: repo.id,
            index,
            title: issue.title.clone(),
            body: issue.body.clone(),
            poster: issue.poster.clone(),
            is_closed: false,
            is_pull: true,
            created_at: Utc::now(),
        };
        let mut record = pr.to_record();
        record.id = PullRequestId(self.next_id());
        record.issue_id = issue.id;
        record.index = index;

        let pr = self.hydrate(&record)?;
        self.issues.insert(issue.id, issue.clone());
        self.pulls.insert(record.id, record);
        Ok((issue, pr))
    }

    fn record_mut(&mut self, id: PullRequestId) -> Result<&mut PullRequestRecord> {
        self.pulls
            .get_mut(&id)
            .ok_or_else(|| Error::PullRequestNotFound(id.to_string()))
    }
}

fn apply_columns(target: &mut PullRequestRecord, source: &PullRequestRecord, columns: &[Column]) {
    for column in columns {
        match column {
            Column::Status => target.status = source.status,
            Column::ConflictedFiles => target.conflicted_files = source.conflicted_files.clone(),
            Column::BaseBranch => target.base_branch = source.base_branch.clone(),
            Column::MergeBase => target.merge_base = source.merge_base.clone(),
            Column::HasMerged => target.has_merged = source.has_merged,
            Column::MergedCommitId => target.merged_commit_id = source.merged_commit_id.clone(),
            Column::Merger => target.merger = source.merger.clone(),
            Column::MergedAt => target.merged_at = source.merged_at,
            Column::UpdatedAt => target.updated_at = source.updated_at,
        }
    }
}

/// In-memory store with call tracking and error injection
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Seeding ===

    pub fn add_repo(&self, repo: Repository) {
        self.state.lock().unwrap().repos.insert(repo.id, repo);
    }

    pub fn add_user(&self, user: User) {
        self.state.lock().unwrap().users.insert(user.id, user);
    }

    pub fn add_protected_branch(&self, rule: ProtectedBranch) {
        self.state.lock().unwrap().protected.push(rule);
    }

    /// Insert a pull request directly, bypassing the creation protocol
    pub fn seed_pull_request(
        &self,
        repo: &Repository,
        poster: &User,
        title: &str,
        new: NewPullRequest,
    ) -> PullRequest {
        let issue = NewIssue {
            title: title.to_string(),
            body: String::new(),
            poster: poster.clone(),
            label_ids: vec![],
        };
        let pr = PullRequest::new(new, Utc::now());
        self.state
            .lock()
            .unwrap()
            .insert(repo, &issue, &pr)
            .unwrap()
            .1
    }

    /// Edit a stored row in place
    pub fn edit_pull(&self, id: PullRequestId, edit: impl FnOnce(&mut PullRequestRecord)) {
        let mut state = self.state.lock().unwrap();
        edit(state.pulls.get_mut(&id).unwrap());
    }

    /// Put a stored row into `status`
    pub fn set_status(&self, id: PullRequestId, status: PullRequestStatus) {
        self.edit_pull(id, |r| r.status = status);
    }

    pub fn close_issue(&self, id: IssueId) {
        self.state
            .lock()
            .unwrap()
            .issues
            .get_mut(&id)
            .unwrap()
            .is_closed = true;
    }

    // === Inspection ===

    pub fn pull(&self, id: PullRequestId) -> PullRequest {
        let state = self.state.lock().unwrap();
        state.hydrate(&state.pulls[&id]).unwrap()
    }

    pub fn record(&self, id: PullRequestId) -> PullRequestRecord {
        self.state.lock().unwrap().pulls[&id].clone()
    }

    pub fn issue(&self, id: IssueId) -> Issue {
        self.state.lock().unwrap().issues[&id].clone()
    }

    pub fn pull_count(&self) -> usize {
        self.state.lock().unwrap().pulls.len()
    }

    pub fn issue_count(&self) -> usize {
        self.state.lock().unwrap().issues.len()
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn reviewers(&self) -> Vec<(IssueId, UserId)> {
        self.state.lock().unwrap().reviewers.clone()
    }

    pub fn insert_attempts(&self) -> usize {
        self.state.lock().unwrap().insert_attempts
    }

    pub fn invalidations(&self) -> Vec<InvalidateCall> {
        self.state.lock().unwrap().invalidations.clone()
    }

    pub fn updates(&self) -> Vec<UpdateCall> {
        self.state.lock().unwrap().updates.clone()
    }

    // === Error injection ===

    /// Make the next `n` insert attempts lose their index to another writer
    pub fn collide_next_inserts(&self, n: usize) {
        self.state.lock().unwrap().collisions_left = n;
    }

    /// Reject inserts as a permission failure
    pub fn deny_inserts(&self, msg: &str) {
        self.state.lock().unwrap().deny_insert = Some(msg.to_string());
    }

    pub fn fail_finalize(&self, msg: &str) {
        self.state.lock().unwrap().error_on_finalize = Some(msg.to_string());
    }

    pub fn fail_update(&self, msg: &str) {
        self.state.lock().unwrap().error_on_update = Some(msg.to_string());
    }

    pub fn fail_get_issue(&self, msg: &str) {
        self.state.lock().unwrap().error_on_get_issue = Some(msg.to_string());
    }

    pub fn fail_invalidate(&self, msg: &str) {
        self.state.lock().unwrap().error_on_invalidate = Some(msg.to_string());
    }

    pub fn fail_comment(&self, msg: &str) {
        self.state.lock().unwrap().error_on_comment = Some(msg.to_string());
    }

    pub fn fail_unmerged_by_head(&self, msg: &str) {
        self.state.lock().unwrap().error_on_unmerged_by_head = Some(msg.to_string());
    }
}

#[async_trait]
impl RepositoryStore for MemoryStore {
    async fn get_repository(&self, id: RepoId) -> Result<Repository> {
        self.state
            .lock()
            .unwrap()
            .repos
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::RepositoryNotFound(id.to_string()))
    }

    async fn get_repository_by_name(&self, owner: &str, name: &str) -> Result<Repository> {
        self.state
            .lock()
            .unwrap()
            .repos
            .values()
            .find(|r| r.owner_name == owner && r.name == name)
            .cloned()
            .ok_or_else(|| Error::RepositoryNotFound(format!("{owner}/{name}")))
    }

    async fn get_protected_branch(
        &self,
        repo_id: RepoId,
        branch: &str,
    ) -> Result<Option<ProtectedBranch>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .protected
            .iter()
            .find(|p| p.repo_id == repo_id && p.branch_name == branch)
            .cloned())
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn get_issue(&self, id: IssueId) -> Result<Issue> {
        let state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_get_issue {
            return Err(Error::Store(msg.clone()));
        }
        state
            .issues
            .get(&id)
            .cloned()
            .ok_or(Error::IssueNotFound(id))
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::UserNotFound(id.to_string()))
    }

    async fn create_comment(&self, opts: CreateComment) -> Result<Comment> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_comment {
            return Err(Error::Store(msg.clone()));
        }
        let comment = Comment {
            id: CommentId(state.next_id()),
            issue_id: opts.issue_id,
            poster_id: opts.doer.id,
            kind: opts.kind,
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn add_reviewer(&self, issue: &Issue, _doer: &User, reviewer_id: UserId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.users.contains_key(&reviewer_id) {
            return Err(Error::UserNotFound(reviewer_id.to_string()));
        }
        state.reviewers.push((issue.id, reviewer_id));
        Ok(())
    }

    async fn invalidate_code_comments(
        &self,
        prs: &[PullRequest],
        doer: &User,
        repo: &dyn GitRepository,
        branch: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.invalidations.push(InvalidateCall {
            pr_ids: prs.iter().map(PullRequest::id).collect(),
            doer_id: doer.id,
            repo_path: repo.path().to_path_buf(),
            branch: branch.to_string(),
        });
        match &state.error_on_invalidate {
            Some(msg) => Err(Error::Store(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PullRequestStore for MemoryStore {
    async fn get_pull_request(&self, id: PullRequestId) -> Result<PullRequest> {
        let state = self.state.lock().unwrap();
        let record = state
            .pulls
            .get(&id)
            .ok_or_else(|| Error::PullRequestNotFound(id.to_string()))?;
        state.hydrate(record)
    }

    async fn get_pull_request_by_index(&self, repo_id: RepoId, index: i64) -> Result<PullRequest> {
        let state = self.state.lock().unwrap();
        let record = state
            .pulls
            .values()
            .find(|r| r.base_repo_id == repo_id && r.index == index)
            .ok_or_else(|| Error::PullRequestNotFound(format!("{repo_id}#{index}")))?;
        state.hydrate(record)
    }

    async fn get_pull_request_by_issue(&self, issue_id: IssueId) -> Result<PullRequest> {
        let state = self.state.lock().unwrap();
        let record = state
            .pulls
            .values()
            .find(|r| r.issue_id == issue_id)
            .ok_or_else(|| Error::PullRequestNotFound(format!("issue {issue_id}")))?;
        state.hydrate(record)
    }

    async fn find_unmerged(
        &self,
        head_repo_id: RepoId,
        base_repo_id: RepoId,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<Option<PullRequest>> {
        let state = self.state.lock().unwrap();
        let found = state.select(|r| {
            state.is_open(r)
                && r.head_repo_id == head_repo_id
                && r.base_repo_id == base_repo_id
                && r.head_branch == head_branch
                && r.base_branch == base_branch
        })?;
        Ok(found.into_iter().next())
    }

    async fn latest_by_head(&self, repo_id: RepoId, branch: &str) -> Result<Option<PullRequest>> {
        let state = self.state.lock().unwrap();
        let found =
            state.select(|r| r.head_repo_id == repo_id && r.head_branch == branch)?;
        Ok(found.into_iter().last())
    }

    async fn unmerged_by_head(&self, repo_id: RepoId, branch: &str) -> Result<Vec<PullRequest>> {
        let state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_unmerged_by_head {
            return Err(Error::Store(msg.clone()));
        }
        state.select(|r| state.is_open(r) && r.head_repo_id == repo_id && r.head_branch == branch)
    }

    async fn unmerged_by_base(&self, repo_id: RepoId, branch: &str) -> Result<Vec<PullRequest>> {
        let state = self.state.lock().unwrap();
        state.select(|r| state.is_open(r) && r.base_repo_id == repo_id && r.base_branch == branch)
    }

    async fn list_checking(&self) -> Result<Vec<PullRequest>> {
        let state = self.state.lock().unwrap();
        state.select(|r| !r.has_merged && r.status == PullRequestStatus::Checking)
    }

    async fn insert_pull_request(
        &self,
        repo: &Repository,
        issue: &NewIssue,
        pr: &PullRequest,
    ) -> Result<(Issue, PullRequest)> {
        self.state.lock().unwrap().insert(repo, issue, pr)
    }

    async fn update_columns(&self, pr: &PullRequest, columns: &[Column]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_update {
            return Err(Error::Store(msg.clone()));
        }
        let source = pr.to_record();
        apply_columns(state.record_mut(pr.id())?, &source, columns);
        state.updates.push(UpdateCall {
            pr_id: pr.id(),
            columns: columns.to_vec(),
        });
        Ok(())
    }

    async fn finalize_merge(&self, pr: &PullRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.error_on_finalize {
            return Err(Error::Store(msg.clone()));
        }
        let merger = pr
            .merger()
            .cloned()
            .ok_or(Error::MissingMergeFields { index: pr.index() })?;

        if !state.issues.contains_key(&pr.issue_id()) {
            return Err(Error::IssueNotFound(pr.issue_id()));
        }

        let source = pr.to_record();
        apply_columns(state.record_mut(pr.id())?, &source, MERGE_COLUMNS);
        if let Some(issue) = state.issues.get_mut(&pr.issue_id()) {
            issue.is_closed = true;
        }
        let comment = Comment {
            id: CommentId(state.next_id()),
            issue_id: pr.issue_id(),
            poster_id: merger.id,
            kind: CommentKind::Close,
            created_at: Utc::now(),
        };
        state.comments.push(comment);
        Ok(())
    }
}
