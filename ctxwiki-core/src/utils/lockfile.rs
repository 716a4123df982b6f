// src/utils/lockfile.rs
//! Per-project advisory lock.
//!
//! The guard keeps the lock file open with an OS-level exclusive lock
//! (`fs2::FileExt::try_lock_exclusive`) for its whole lifetime. The file body
//! records the owner (`pid`, a per-guard `nonce`, `acquired_at`).
//!
//! A leftover file is reclaimed only when nobody holds its OS lock AND the
//! recorded process is dead or the record is older than `stale_after`.
//! Drop removes the file only while it still records this guard as owner.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{WikiError, WikiResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    nonce: String,
    acquired_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    path: PathBuf,
    nonce: String,
}

impl LockGuard {
    /// Take the lock for `project` or fail with `Busy`. Never waits.
    pub fn acquire(
        dir: &Path,
        project: &str,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> WikiResult<Self> {
        fs::create_dir_all(dir).map_err(|e| WikiError::io(dir, e))?;
        let path = dir.join(format!("{}.lock", lock_name(project)));
        let busy = || WikiError::Busy {
            project: project.to_string(),
        };

        for _ in 0..3 {
            let (file, fresh) = match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(f) => (f, true),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    match OpenOptions::new().read(true).write(true).open(&path) {
                        Ok(f) => (f, false),
                        // removed between the two opens
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(WikiError::io(&path, e)),
                    }
                }
                Err(e) => return Err(WikiError::io(&path, e)),
            };

            if file.try_lock_exclusive().is_err() {
                debug!(project, lock = %path.display(), "lock held by a live guard");
                return Err(busy());
            }
            // The previous owner may have unlinked the path after we opened it.
            if !still_at(&file, &path) {
                continue;
            }

            let mut file = file;
            if !fresh {
                let previous = read_info(&mut file);
                if !reclaimable(previous.as_ref(), &file, now, stale_after) {
                    return Err(busy());
                }
                warn!(
                    project,
                    lock = %path.display(),
                    pid = previous.as_ref().map(|i| i.pid),
                    "reclaiming abandoned lock"
                );
            }

            let info = LockInfo {
                pid: std::process::id(),
                nonce: uuid::Uuid::new_v4().to_string(),
                acquired_at: now,
            };
            write_info(&mut file, &info).map_err(|e| WikiError::io(&path, e))?;
            return Ok(Self {
                file: Some(file),
                path,
                nonce: info.nonce,
            });
        }
        Err(busy())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(mut file) = self.file.take() {
            let owned = still_at(&file, &self.path)
                && read_info(&mut file).is_some_and(|i| i.nonce == self.nonce);
            if owned {
                let _ = fs::remove_file(&self.path);
            } else {
                warn!(lock = %self.path.display(), "lock file no longer ours, leaving it");
            }
            // closing the file releases the OS lock
            let _ = file.unlock();
        }
    }
}

// ---------- helpers ----------

fn read_info(file: &mut File) -> Option<LockInfo> {
    let mut body = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut body).ok()?;
    serde_json::from_str(&body).ok()
}

fn write_info(file: &mut File, info: &LockInfo) -> std::io::Result<()> {
    let body = serde_json::to_vec(info)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&body)?;
    file.sync_all()
}

/// The OS lock is already ours here; decide whether the record it carries is abandoned.
fn reclaimable(
    info: Option<&LockInfo>,
    file: &File,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> bool {
    let (pid, at) = match info {
        Some(i) => (Some(i.pid), Some(i.acquired_at)),
        // Unreadable body (crash mid-write): only the file's mtime is left.
        None => (
            None,
            file.metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from),
        ),
    };
    if pid.is_some_and(|p| !is_process_alive(p)) {
        return true;
    }
    at.is_some_and(|at| now - at >= stale_after)
}

/// Whether `path` still names the open `file`.
#[cfg(unix)]
fn still_at(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), fs::metadata(path)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_at(_file: &File, path: &Path) -> bool {
    path.exists()
}

#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}/stat")).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}

/// File-name-safe form of a project identity.
fn lock_name(project: &str) -> String {
    let safe: String = project
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let hash = blake3::hash(project.as_bytes()).to_hex();
    format!("{}-{}", safe, &hash.as_str()[..12])
}
