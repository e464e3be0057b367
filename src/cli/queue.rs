//! `queue` command
//!
//! Producers in other processes can only reach the durable queue; the
//! in-memory channel lives inside the serving process.

use crate::cli::QueueAction;
use crate::cli::style::{Stylize, check};
use anstream::println;
use pullq::config::{QueueKind, load_settings};
use pullq::error::{Error, Result};
use pullq::queue::{SqliteQueue, WorkItem, WorkQueue};
use pullq::types::PullRequestId;
use std::path::Path;

/// Run a `queue` subcommand
pub async fn run(path: &Path, action: QueueAction) -> Result<()> {
    let settings = load_settings(path)?;
    if settings.queue.kind != QueueKind::Sqlite {
        return Err(Error::Config(format!(
            "queue type is '{}'; set [queue] type = \"sqlite\" to reach the queue from outside the server",
            settings.queue.kind
        )));
    }
    let queue = SqliteQueue::open(&settings.queue).await?;

    match action {
        QueueAction::Push { ids } => {
            for id in ids {
                if id <= 0 {
                    return Err(Error::InvalidPayload(format!(
                        "pull request id must be positive: {id}"
                    )));
                }
                queue.push(WorkItem::new(PullRequestId(id))).await?;
                println!("{} Queued pull request {}", check(), id.emphasis());
            }
        }
        QueueAction::Pending => {
            let pending = queue.len().await?;
            println!(
                "{} {}",
                pending.emphasis(),
                format!("pending in {}", queue.path().display()).muted()
            );
        }
    }
    Ok(())
}
