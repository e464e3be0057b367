//! Patch tester, notifier and queue doubles

#![allow(dead_code)]

use async_trait::async_trait;
use pullq::config::QueueKind;
use pullq::error::{Error, Result};
use pullq::notify::Notifier;
use pullq::patch::{PatchOutcome, PatchTester};
use pullq::pull::PullRequest;
use pullq::queue::{WorkHandler, WorkItem, WorkQueue};
use pullq::types::{Issue, PullRequestId, User, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// =============================================================================
// Patch tester
// =============================================================================

/// Call record for `test_patch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPatchCall {
    pub pr_id: PullRequestId,
    pub base_branch: String,
}

/// Patch tester returning clean merges unless told otherwise
#[derive(Default)]
pub struct MockPatchTester {
    conflicts: Mutex<HashMap<PullRequestId, Vec<String>>>,
    errors: Mutex<HashMap<PullRequestId, String>>,
    calls: Mutex<Vec<TestPatchCall>>,
}

impl MockPatchTester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report these conflicting files for `id`
    pub fn set_conflicts(&self, id: PullRequestId, files: &[&str]) {
        self.conflicts
            .lock()
            .unwrap()
            .insert(id, files.iter().map(|f| (*f).to_string()).collect());
    }

    /// Report a clean merge for `id` again
    pub fn clear_conflicts(&self, id: PullRequestId) {
        self.conflicts.lock().unwrap().remove(&id);
    }

    pub fn fail_for(&self, id: PullRequestId, msg: &str) {
        self.errors.lock().unwrap().insert(id, msg.to_string());
    }

    pub fn calls(&self) -> Vec<TestPatchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PatchTester for MockPatchTester {
    async fn test_patch(&self, pr: &PullRequest) -> Result<PatchOutcome> {
        self.calls.lock().unwrap().push(TestPatchCall {
            pr_id: pr.id(),
            base_branch: pr.base_branch().to_string(),
        });
        if let Some(msg) = self.errors.lock().unwrap().get(&pr.id()) {
            return Err(Error::Patch(msg.clone()));
        }
        Ok(PatchOutcome {
            merge_base: format!("base-of-{}", pr.base_branch()),
            conflicted_files: self
                .conflicts
                .lock()
                .unwrap()
                .get(&pr.id())
                .cloned()
                .unwrap_or_default(),
        })
    }
}

// =============================================================================
// Notifier
// =============================================================================

/// A recorded notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    NewPullRequest(PullRequestId),
    Synchronized { pr_id: PullRequestId, doer_id: UserId },
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn new_pull_request(&self, pr: &PullRequest, _issue: &Issue) {
        self.events
            .lock()
            .unwrap()
            .push(Notification::NewPullRequest(pr.id()));
    }

    async fn pull_request_synchronized(&self, doer: &User, pr: &PullRequest, _issue: &Issue) {
        self.events.lock().unwrap().push(Notification::Synchronized {
            pr_id: pr.id(),
            doer_id: doer.id,
        });
    }
}

// =============================================================================
// Queue
// =============================================================================

/// Queue that records pushes and never delivers them
#[derive(Default)]
pub struct RecordingQueue {
    pushed: Mutex<Vec<WorkItem>>,
    fail_all: Mutex<Option<String>>,
    fail_ids: Mutex<HashSet<PullRequestId>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_push(&self, msg: &str) {
        *self.fail_all.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_push_for(&self, id: PullRequestId) {
        self.fail_ids.lock().unwrap().insert(id);
    }

    /// Ids pushed so far, in order
    pub fn pushed_ids(&self) -> Vec<PullRequestId> {
        self.pushed
            .lock()
            .unwrap()
            .iter()
            .map(|item| item.pull_request_id)
            .collect()
    }

    /// How many times `id` was pushed
    pub fn count(&self, id: PullRequestId) -> usize {
        self.pushed_ids().iter().filter(|p| **p == id).count()
    }
}

#[async_trait]
impl WorkQueue for RecordingQueue {
    fn kind(&self) -> QueueKind {
        QueueKind::Channel
    }

    async fn push(&self, item: WorkItem) -> Result<()> {
        if let Some(msg) = self.fail_all.lock().unwrap().as_ref() {
            return Err(Error::Queue(msg.clone()));
        }
        if self.fail_ids.lock().unwrap().contains(&item.pull_request_id) {
            return Err(Error::QueueClosed);
        }
        self.pushed.lock().unwrap().push(item);
        Ok(())
    }

    async fn run(&self, _handler: Arc<dyn WorkHandler>, shutdown: CancellationToken) -> Result<()> {
        shutdown.cancelled().await;
        Ok(())
    }
}
