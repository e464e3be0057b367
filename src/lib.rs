//! pullq: pull request test-and-merge pipeline
//!
//! Decides, in the background, whether pull requests can be merged and keeps
//! that verdict current as either side moves.
//!
//! - [`pull`]: the pull request entity and its status state machine
//! - [`queue`]: work queue with in-memory and durable SQLite backends
//! - [`sync`]: mirrors source branches into `refs/pull/<index>/head`
//! - [`orchestrator`]: re-queues affected pull requests when a branch moves
//! - [`create`], [`retarget`], [`merge`]: request-time protocols
//! - [`worker`]: queue consumer that runs patch tests
//!
//! Storage, version control, patch testing and notifications are reached
//! through traits ([`store`], [`git`], [`patch`], [`notify`]) bundled in a
//! [`context::PipelineContext`].

pub mod config;
pub mod context;
pub mod create;
pub mod error;
pub mod git;
pub mod merge;
pub mod notify;
pub mod orchestrator;
pub mod patch;
pub mod pull;
pub mod queue;
pub mod retarget;
pub mod store;
pub mod sync;
pub mod tasks;
pub mod types;
pub mod worker;

pub use context::PipelineContext;
pub use error::{Error, Result};
pub use pull::{PullRequest, PullRequestStatus};
pub use queue::{QueueService, WorkItem, WorkQueue};
