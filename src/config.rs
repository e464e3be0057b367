//! Settings for the pipeline, loaded from `config.toml`.

use crate::error::{Error, Result};
use crate::types::MergeStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name for pullq settings within the user config dir.
const CONFIG_DIR: &str = "pullq";

/// Filename for settings.
const CONFIG_FILE: &str = "config.toml";

/// Default ceiling for duplicate-index retries when creating pull requests.
pub const DEFAULT_MAX_DUP_INDEX_ATTEMPTS: u32 = 3;

/// Largest in-process queue the channel backend can allocate.
pub const MAX_QUEUE_LENGTH: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Which work queue backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// In-process bounded channel
    #[default]
    Channel,
    /// Durable list in a SQLite database shared between processes
    Sqlite,
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel => write!(f, "channel"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// `[queue]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Backend type
    #[serde(rename = "type")]
    pub kind: QueueKind,
    /// Capacity of the in-process channel
    pub length: usize,
    /// Database path for the durable backend (`sqlite://` prefix optional)
    pub conn_str: String,
    /// How long one durable push waits on a locked database
    pub push_timeout_ms: u64,
    /// Attempts per durable push before giving up
    pub push_attempts: u32,
    /// How long the durable consumer sleeps when the list is empty
    pub poll_interval_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            kind: QueueKind::Channel,
            length: 1000,
            conn_str: "data/queues/pull_requests.db".to_string(),
            push_timeout_ms: 5_000,
            push_attempts: 3,
            poll_interval_ms: 500,
        }
    }
}

impl QueueSettings {
    /// How long one durable push waits on a locked database
    pub const fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    /// Empty-list poll interval
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Filesystem path of the durable queue database
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(
            self.conn_str
                .strip_prefix("sqlite://")
                .unwrap_or(&self.conn_str),
        )
    }
}

/// `[pull_request]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestSettings {
    /// Title prefixes that mark a pull request as work in progress
    pub work_in_progress_prefixes: Vec<String>,
    /// Ceiling for duplicate-index retries on creation
    pub max_dup_index_attempts: u32,
    /// Merge style used for default commit messages
    pub default_merge_style: MergeStyle,
}

impl Default for PullRequestSettings {
    fn default() -> Self {
        Self {
            work_in_progress_prefixes: vec!["WIP:".to_string(), "[WIP]".to_string()],
            max_dup_index_attempts: DEFAULT_MAX_DUP_INDEX_ATTEMPTS,
            default_merge_style: MergeStyle::Merge,
        }
    }
}

/// `[tasks]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Grace period for background tasks at shutdown
    pub shutdown_grace_secs: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 10,
        }
    }
}

impl TaskSettings {
    /// Shutdown grace period
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// All settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Work queue
    pub queue: QueueSettings,
    /// Pull request behaviour
    pub pull_request: PullRequestSettings,
    /// Background tasks
    pub tasks: TaskSettings,
}

impl Settings {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue.length == 0 {
            return Err(Error::Config("queue.length must be at least 1".to_string()));
        }
        if self.queue.length > MAX_QUEUE_LENGTH {
            return Err(Error::Config(format!(
                "queue.length must be at most {MAX_QUEUE_LENGTH}"
            )));
        }
        if self.queue.push_attempts == 0 {
            return Err(Error::Config(
                "queue.push_attempts must be at least 1".to_string(),
            ));
        }
        if self.queue.kind == QueueKind::Sqlite && self.queue.conn_str.trim().is_empty() {
            return Err(Error::Config(
                "queue.conn_str is required for the sqlite queue".to_string(),
            ));
        }
        if self.pull_request.max_dup_index_attempts == 0 {
            return Err(Error::Config(
                "pull_request.max_dup_index_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default settings path (`~/.config/pullq/config.toml` on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load settings from disk.
///
/// Returns defaults if the file doesn't exist.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let settings: Settings = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    settings.validate()?;
    Ok(settings)
}

/// Save settings to disk.
///
/// Creates the parent directory if it doesn't exist.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::Config(format!("failed to create {}: {e}", dir.display())))?;
        }
    }

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("failed to serialize settings: {e}")))?;

    let content_with_header = format!("# pullq settings\n\n{content}");

    fs::write(path, content_with_header)
        .map_err(|e| Error::Config(format!("failed to write {}: {e}", path.display())))?;

    Ok(())
}
