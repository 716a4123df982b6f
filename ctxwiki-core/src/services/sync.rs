// src/services/sync.rs
//! Remote synchronization, called only after a successful local commit.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{WikiError, WikiResult};

pub trait RemoteSync {
    fn commit(&self, files: &[PathBuf], message: &str) -> WikiResult<()>;
    fn push(&self) -> WikiResult<()>;
}

/// Used when `commit.sync_enabled` is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSync;

impl RemoteSync for NoopSync {
    fn commit(&self, _files: &[PathBuf], _message: &str) -> WikiResult<()> {
        Ok(())
    }

    fn push(&self) -> WikiResult<()> {
        Ok(())
    }
}

/// `git add` / `git commit` / `git push` inside the context root.
#[derive(Debug, Clone)]
pub struct GitSync {
    repo: PathBuf,
    remote: String,
}

impl GitSync {
    pub fn new(repo: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            remote: remote.into(),
        }
    }

    fn git(&self, args: &[&str]) -> WikiResult<String> {
        debug!(repo = %self.repo.display(), ?args, "git");
        let out = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .output()
            .map_err(|e| WikiError::SyncFailure(format!("spawn git: {e}")))?;
        if !out.status.success() {
            return Err(WikiError::SyncFailure(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }

    fn rel<'p>(&self, p: &'p Path) -> &'p Path {
        p.strip_prefix(&self.repo).unwrap_or(p)
    }
}

impl RemoteSync for GitSync {
    fn commit(&self, files: &[PathBuf], message: &str) -> WikiResult<()> {
        if files.is_empty() {
            return Ok(());
        }
        let mut add = vec!["add", "--"];
        let rels: Vec<String> = files
            .iter()
            .map(|f| self.rel(f).to_string_lossy().to_string())
            .collect();
        add.extend(rels.iter().map(String::as_str));
        self.git(&add)?;

        // Nothing staged means the files were already committed as-is.
        if self.git(&["diff", "--cached", "--quiet"]).is_ok() {
            return Ok(());
        }
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    fn push(&self) -> WikiResult<()> {
        self.git(&["push", &self.remote])?;
        Ok(())
    }
}
