//! Command-line interface

pub mod config;
pub mod queue;
pub mod style;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pull request test-and-merge pipeline
#[derive(Debug, Parser)]
#[command(name = "pullq", version, about)]
pub struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "PULLQ_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Settings file to use
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => pullq::config::default_config_path()
                .ok_or_else(|| anyhow::anyhow!("could not determine config directory")),
        }
    }
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect or initialize settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Work with the durable queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

/// `config` subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Write default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// `queue` subcommands
#[derive(Debug, Subcommand)]
pub enum QueueAction {
    /// Queue pull requests for testing
    Push {
        /// Pull request ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Show how many items are waiting
    Pending,
}
