//! Git backend driving the `git` executable

use super::{GitBackend, GitRepository, PushOptions};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Runs `git` subprocesses against repositories on disk
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Run git in `dir` and return the raw output, whatever the exit status
async fn run_raw(
    binary: &Path,
    dir: &Path,
    args: &[&str],
    env: &[(String, String)],
) -> Result<Output> {
    debug!(dir = %dir.display(), ?args, "running git");
    Command::new(binary)
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .output()
        .await
        .map_err(|e| Error::Git(format!("failed to run git {}: {e}", args.join(" "))))
}

/// Run git in `dir`, failing on a non-zero exit status
async fn run(binary: &Path, dir: &Path, args: &[&str]) -> Result<String> {
    let output = run_raw(binary, dir, args, &[]).await?;
    check(&output, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn check(output: &Output, args: &[&str]) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(Error::Git(format!(
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

#[async_trait]
impl GitBackend for GitCli {
    async fn open(&self, path: &Path) -> Result<Box<dyn GitRepository>> {
        if !path.exists() {
            return Err(Error::Git(format!(
                "repository does not exist: {}",
                path.display()
            )));
        }
        run(&self.binary, path, &["rev-parse", "--git-dir"]).await?;
        Ok(Box::new(CliRepository {
            binary: self.binary.clone(),
            path: path.to_path_buf(),
        }))
    }

    async fn push(&self, repo_path: &Path, opts: &PushOptions) -> Result<()> {
        let mut args = vec!["push"];
        if opts.force {
            args.push("--force");
        }
        args.push(opts.remote.as_str());
        args.push(opts.refspec.as_str());

        let output = run_raw(&self.binary, repo_path, &args, &opts.env).await?;
        check(&output, &args)
    }
}

/// A repository opened through [`GitCli`]
struct CliRepository {
    binary: PathBuf,
    path: PathBuf,
}

#[async_trait]
impl GitRepository for CliRepository {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn branch_commit_id(&self, branch: &str) -> Result<String> {
        let rev = format!("refs/heads/{branch}^{{commit}}");
        run(&self.binary, &self.path, &["rev-parse", "--verify", "--quiet", rev.as_str()])
            .await
            .map_err(|_| Error::Git(format!("branch does not exist: {branch}")))
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        // A commit this repository has never seen cannot be in its history
        let object = format!("{ancestor}^{{commit}}");
        let present =
            run_raw(&self.binary, &self.path, &["cat-file", "-e", object.as_str()], &[]).await?;
        if !present.status.success() {
            debug!(repo = %self.path.display(), commit = ancestor, "commit not present");
            return Ok(false);
        }

        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let output = run_raw(&self.binary, &self.path, &args, &[]).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => check(&output, &args).map(|()| false),
        }
    }

    async fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        run(&self.binary, &self.path, &["remote", "add", name, url])
            .await
            .map(drop)
    }

    async fn remove_remote(&self, name: &str) -> Result<()> {
        run(&self.binary, &self.path, &["remote", "remove", name])
            .await
            .map(drop)
    }

    async fn remotes(&self) -> Result<Vec<String>> {
        let out = run(&self.binary, &self.path, &["remote"]).await?;
        Ok(out.lines().map(str::to_string).collect())
    }

    async fn delete_ref(&self, refname: &str) -> Result<()> {
        run(&self.binary, &self.path, &["update-ref", "-d", refname])
            .await
            .map(drop)
    }
}
