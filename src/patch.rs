//! Patch testing seam
//!
//! Computing the test merge itself lives outside this crate; the pipeline
//! only consumes its verdict and applies it through the state machine.

use crate::error::Result;
use crate::pull::PullRequest;
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

/// Verdict of a test merge of source into target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Merge base of source and target
    pub merge_base: String,
    /// Files that conflicted (empty when the merge is clean)
    pub conflicted_files: Vec<String>,
}

/// Computes mergeability of a pull request
#[async_trait]
pub trait PatchTester: Send + Sync {
    /// Test-merge the pull request's source into its target
    ///
    /// The result is treated as ground truth.
    async fn test_patch(&self, pr: &PullRequest) -> Result<PatchOutcome>;
}

/// Re-enter `checking`, run the patch test and apply its verdict
///
/// Leaves `pr` in `checking` if the test itself fails.
pub async fn retest(pr: &mut PullRequest, tester: &dyn PatchTester) -> Result<()> {
    pr.begin_check(Utc::now())?;
    let outcome = tester.test_patch(pr).await?;
    debug!(
        pr_id = %pr.id(),
        conflicts = outcome.conflicted_files.len(),
        "patch test finished"
    );
    pr.apply_patch_outcome(outcome, Utc::now())
}
