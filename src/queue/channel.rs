//! In-process bounded channel backend

use super::{WorkHandler, WorkItem, WorkQueue, dispatch};
use crate::config::{MAX_QUEUE_LENGTH, QueueKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bounded in-memory queue
///
/// `push` waits while `capacity` items are buffered. Items still buffered
/// when the process exits are lost.
pub struct ChannelQueue {
    tx: mpsc::Sender<WorkItem>,
    rx: Mutex<Option<mpsc::Receiver<WorkItem>>>,
}

impl ChannelQueue {
    /// Queue holding at most `capacity` pending items
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("queue length must be at least 1".to_string()));
        }
        if capacity > MAX_QUEUE_LENGTH {
            return Err(Error::Config(format!(
                "queue length must be at most {MAX_QUEUE_LENGTH}"
            )));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            tx,
            rx: Mutex::new(Some(rx)),
        })
    }

    /// Items currently buffered
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_receiver(&self) -> Result<mpsc::Receiver<WorkItem>> {
        self.rx
            .lock()
            .map_err(|_| Error::Internal("queue receiver lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| Error::Queue("consumer loop already started".to_string()))
    }
}

#[async_trait]
impl WorkQueue for ChannelQueue {
    fn kind(&self) -> QueueKind {
        QueueKind::Channel
    }

    async fn push(&self, item: WorkItem) -> Result<()> {
        self.tx.send(item).await.map_err(|_| Error::QueueClosed)
    }

    async fn run(&self, handler: Arc<dyn WorkHandler>, shutdown: CancellationToken) -> Result<()> {
        let mut rx = self.take_receiver()?;
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => dispatch(handler.as_ref(), item).await,
                    None => break,
                },
            }
        }
        debug!(pending = rx.len(), "channel consumer stopped");
        Ok(())
    }
}
