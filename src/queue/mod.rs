//! Asynchronous work queue
//!
//! Producers (creation, orchestrator scans, startup recovery) push
//! [`WorkItem`]s; a single consumer loop drains them into a [`WorkHandler`].
//! Two backends implement [`WorkQueue`]:
//!
//! - [`ChannelQueue`]: in-process bounded channel. `push` waits while the
//!   buffer is full.
//! - [`SqliteQueue`]: durable list in a SQLite file that several processes can
//!   push to. Pushes retry under a timeout; the consumer polls.
//!
//! The backend is chosen once at startup by [`QueueService::start`].

mod channel;
mod sqlite;

pub use channel::ChannelQueue;
pub use sqlite::SqliteQueue;

use crate::config::{QueueKind, QueueSettings};
use crate::error::{Error, Result};
use crate::types::PullRequestId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A pull request that needs (re-)testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkItem {
    /// Pull request to test
    pub pull_request_id: PullRequestId,
}

impl WorkItem {
    /// Work item for a pull request
    pub const fn new(pull_request_id: PullRequestId) -> Self {
        Self { pull_request_id }
    }

    /// Wire payload: the pull request id as ASCII decimal
    pub fn encode(&self) -> Vec<u8> {
        self.pull_request_id.0.to_string().into_bytes()
    }

    /// Parse a wire payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| Error::InvalidPayload(format!("not utf-8: {payload:?}")))?;
        let id: i64 = text
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPayload(format!("not a pull request id: {text:?}")))?;
        if id <= 0 {
            return Err(Error::InvalidPayload(format!(
                "pull request id must be positive: {id}"
            )));
        }
        Ok(Self::new(PullRequestId(id)))
    }
}

/// Consumer side of the queue
#[async_trait]
pub trait WorkHandler: Send + Sync {
    /// Process one item; errors are logged by the queue and the item dropped
    async fn handle(&self, item: WorkItem) -> Result<()>;
}

/// Enqueue/dequeue substrate
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> QueueKind;

    /// Enqueue one item
    ///
    /// Failures reach the caller; the item is not retained.
    async fn push(&self, item: WorkItem) -> Result<()>;

    /// Drain the queue into `handler` until `shutdown` fires
    ///
    /// Only one consumer loop may run per queue.
    async fn run(&self, handler: Arc<dyn WorkHandler>, shutdown: CancellationToken) -> Result<()>;
}

/// Hand one item to the handler, logging and dropping failures
pub(crate) async fn dispatch(handler: &dyn WorkHandler, item: WorkItem) {
    debug!(pr_id = %item.pull_request_id, "handling work item");
    if let Err(e) = handler.handle(item).await {
        error!(pr_id = %item.pull_request_id, error = %e, "work item failed");
    }
}

/// Build the configured backend
pub async fn init(settings: &QueueSettings) -> Result<Arc<dyn WorkQueue>> {
    let queue: Arc<dyn WorkQueue> = match settings.kind {
        QueueKind::Channel => Arc::new(ChannelQueue::new(settings.length)?),
        QueueKind::Sqlite => Arc::new(SqliteQueue::open(settings).await?),
    };
    info!(kind = %settings.kind, "work queue initialized");
    Ok(queue)
}

/// The process's queue and its consumer loop
///
/// Created once at startup; hand [`QueueService::queue`] to producers.
pub struct QueueService {
    queue: Arc<dyn WorkQueue>,
    shutdown: CancellationToken,
    consumer: JoinHandle<Result<()>>,
}

impl QueueService {
    /// Initialize the configured backend and start the consumer loop
    pub async fn start(settings: &QueueSettings, handler: Arc<dyn WorkHandler>) -> Result<Self> {
        let queue = init(settings).await?;
        Ok(Self::with_queue(queue, handler))
    }

    /// Start the consumer loop on an existing queue
    pub fn with_queue(queue: Arc<dyn WorkQueue>, handler: Arc<dyn WorkHandler>) -> Self {
        let shutdown = CancellationToken::new();
        let consumer = {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { queue.run(handler, shutdown).await })
        };
        Self {
            queue,
            shutdown,
            consumer,
        }
    }

    /// Producer handle
    pub fn queue(&self) -> Arc<dyn WorkQueue> {
        Arc::clone(&self.queue)
    }

    /// Stop the consumer, waiting up to `grace` for the item in hand
    pub async fn shutdown(self, grace: Duration) -> Result<()> {
        self.shutdown.cancel();
        let mut consumer = self.consumer;
        match tokio::time::timeout(grace, &mut consumer).await {
            Ok(Ok(result)) => {
                info!("work queue stopped");
                result
            }
            Ok(Err(e)) => Err(Error::Internal(format!("queue consumer panicked: {e}"))),
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "queue consumer did not stop in time");
                consumer.abort();
                Ok(())
            }
        }
    }
}
