//! Throwaway git repositories driven by the real `git` binary

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Whether a usable `git` is on `PATH`
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

/// A working repository inside a temp dir, removed on drop
pub struct TempGitRepo {
    _dir: TempDir,
    path: PathBuf,
}

impl TempGitRepo {
    /// Empty repository on `main` with one commit
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("repo");
        std::fs::create_dir(&path).expect("failed to create repo dir");
        let repo = Self { _dir: dir, path };
        repo.git(&["init", "-q"]);
        repo.git(&["checkout", "-q", "-b", "main"]);
        repo.commit("initial");
        repo
    }

    /// Clone of `origin` in a separate temp dir
    pub fn clone_of(origin: &Self) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("repo");
        let status = Command::new("git")
            .args(["clone", "-q"])
            .arg(&origin.path)
            .arg(&path)
            .status()
            .expect("failed to run git clone");
        assert!(status.success(), "git clone failed");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run git in the repository and return trimmed stdout
    pub fn git(&self, args: &[&str]) -> String {
        let out = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .output()
            .expect("failed to run git");
        assert!(
            out.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    /// Empty commit on the current branch
    pub fn commit(&self, message: &str) -> String {
        self.git(&["commit", "-q", "--allow-empty", "-m", message]);
        self.git(&["rev-parse", "HEAD"])
    }

    /// Create `branch` from the current head, commit on it and return to `main`
    pub fn branch_with_commit(&self, branch: &str, message: &str) -> String {
        self.git(&["checkout", "-q", "-b", branch]);
        let commit = self.commit(message);
        self.git(&["checkout", "-q", "main"]);
        commit
    }

    /// Commit a ref points at, if it exists
    pub fn resolve(&self, refname: &str) -> Option<String> {
        let out = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(["rev-parse", "--verify", "--quiet", refname])
            .output()
            .expect("failed to run git");
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    pub fn remotes(&self) -> Vec<String> {
        self.git(&["remote"])
            .lines()
            .map(str::to_string)
            .collect()
    }
}
