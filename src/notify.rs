//! Notification sink

use crate::pull::PullRequest;
use crate::types::{Issue, User};
use async_trait::async_trait;
use tracing::info;

/// Fire-and-forget notifications about pull request events
///
/// Delivery failures are the sink's concern and never reach the pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A pull request was opened
    async fn new_pull_request(&self, pr: &PullRequest, issue: &Issue);

    /// The source branch of a pull request received new commits
    async fn pull_request_synchronized(&self, doer: &User, pr: &PullRequest, issue: &Issue);
}

/// Notifier that only records events in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn new_pull_request(&self, pr: &PullRequest, issue: &Issue) {
        info!(
            pr_id = %pr.id(),
            index = pr.index(),
            poster = %issue.poster.name,
            "new pull request: {}",
            issue.title
        );
    }

    async fn pull_request_synchronized(&self, doer: &User, pr: &PullRequest, issue: &Issue) {
        info!(
            pr_id = %pr.id(),
            index = pr.index(),
            doer = %doer.name,
            "pull request synchronized: {}",
            issue.title
        );
    }
}
