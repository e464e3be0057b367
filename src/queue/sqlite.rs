//! Durable SQLite list backend
//!
//! Items live in a single `queue_items` table ordered by rowid. Any number of
//! processes may push; the consumer pops the oldest row with a single
//! `DELETE ... RETURNING`, so each item is handed out at most once.
//!
//! The push deadline is SQLite's own busy timeout: an insert either commits
//! or fails with `SQLITE_BUSY` having written nothing, so a failed push never
//! leaves an item behind.

use super::{WorkHandler, WorkItem, WorkQueue, dispatch};
use crate::config::{QueueKind, QueueSettings};
use crate::error::{Error, Result};
use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS queue_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payload BLOB NOT NULL,
    enqueued_at INTEGER NOT NULL
);
";

/// Durable queue backed by a SQLite database file
pub struct SqliteQueue {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    push_timeout: Duration,
    push_attempts: u32,
    poll_interval: Duration,
    consuming: AtomicBool,
}

impl SqliteQueue {
    /// Open (creating if needed) the database named by `settings.conn_str`
    pub async fn open(settings: &QueueSettings) -> Result<Self> {
        let path = settings.database_path();
        let conn = {
            let path = path.clone();
            let busy_timeout = settings.push_timeout();
            tokio::task::spawn_blocking(move || open_connection(&path, busy_timeout))
                .await
                .map_err(|e| Error::Internal(format!("queue open task failed: {e}")))??
        };
        debug!(path = %path.display(), "opened durable queue");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            push_timeout: settings.push_timeout(),
            push_attempts: settings.push_attempts.max(1),
            poll_interval: settings.poll_interval(),
            consuming: AtomicBool::new(false),
        })
    }

    /// Database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Push a raw payload
    ///
    /// Each attempt waits at most the push timeout for the database lock.
    /// Only lock timeouts are retried; they guarantee nothing was written.
    pub async fn push_payload(&self, payload: Vec<u8>) -> Result<()> {
        for attempt in 1..=self.push_attempts {
            let payload = payload.clone();
            let outcome = self
                .run_blocking(move |conn| {
                    conn.execute(
                        "INSERT INTO queue_items (payload, enqueued_at) VALUES (?1, ?2)",
                        params![payload, chrono::Utc::now().timestamp()],
                    )
                    .map(drop)
                })
                .await?;
            match outcome {
                Ok(()) => return Ok(()),
                Err(e) if is_busy(&e) => {
                    warn!(attempt, max_attempts = self.push_attempts, error = %e, "queue database busy");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Queue(format!(
            "push failed after {} attempts: database busy for {}ms each",
            self.push_attempts,
            self.push_timeout.as_millis()
        )))
    }

    /// Number of items waiting
    pub async fn len(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM queue_items", [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .await
        .map(|n| u64::try_from(n).unwrap_or(0))
    }

    /// Remove and return the oldest payload
    async fn pop(&self) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            conn.query_row(
                "DELETE FROM queue_items
                 WHERE id = (SELECT MIN(id) FROM queue_items)
                 RETURNING payload",
                [],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        self.run_blocking(f).await?.map_err(Error::from)
    }

    /// Run `f` on the connection, keeping SQLite errors unconverted
    async fn run_blocking<T, F>(&self, f: F) -> Result<rusqlite::Result<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| Error::Internal("queue connection lock poisoned".to_string()))?;
            Ok(f(&conn))
        })
        .await
        .map_err(|e| Error::Internal(format!("queue task failed: {e}")))?
    }

    async fn idle(&self, shutdown: &CancellationToken) {
        tokio::select! {
            () = shutdown.cancelled() => {}
            () = tokio::time::sleep(self.poll_interval) => {}
        }
    }
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Queue(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
    }
    let conn = Connection::open(path)?;
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

#[async_trait]
impl WorkQueue for SqliteQueue {
    fn kind(&self) -> QueueKind {
        QueueKind::Sqlite
    }

    async fn push(&self, item: WorkItem) -> Result<()> {
        self.push_payload(item.encode()).await
    }

    async fn run(&self, handler: Arc<dyn WorkHandler>, shutdown: CancellationToken) -> Result<()> {
        if self.consuming.swap(true, Ordering::SeqCst) {
            return Err(Error::Queue("consumer loop already started".to_string()));
        }

        while !shutdown.is_cancelled() {
            match self.pop().await {
                Ok(Some(payload)) => match WorkItem::decode(&payload) {
                    Ok(item) => dispatch(handler.as_ref(), item).await,
                    Err(e) => warn!(error = %e, "dropping malformed queue payload"),
                },
                Ok(None) => self.idle(&shutdown).await,
                Err(e) => {
                    error!(error = %e, "failed to pop from durable queue");
                    self.idle(&shutdown).await;
                }
            }
        }

        debug!(path = %self.path.display(), "durable consumer stopped");
        Ok(())
    }
}
