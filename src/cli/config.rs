//! `config` command

use crate::cli::ConfigAction;
use crate::cli::style::{Stylize, check};
use anstream::println;
use pullq::config::{Settings, load_settings, save_settings};
use pullq::error::{Error, Result};
use std::path::Path;

/// Run a `config` subcommand
pub fn run(path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show(path),
        ConfigAction::Init { force } => init(path, force),
    }
}

fn show(path: &Path) -> Result<()> {
    let settings = load_settings(path)?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };
    let rendered = toml::to_string_pretty(&settings)
        .map_err(|e| Error::Config(format!("failed to render settings: {e}")))?;

    println!("{} {}", "Settings".heading(), source.muted());
    println!();
    println!("{rendered}");
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    save_settings(path, &Settings::default())?;
    println!("{} Wrote default settings to {}", check(), path.display().emphasis());
    Ok(())
}
