// src/utils/fsio.rs
//! Atomic file replacement and pre-write snapshots.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{WikiError, WikiResult};

/// Write via `<path>.tmp` + rename so readers never observe a torn file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> WikiResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| WikiError::io(parent, e))?;
    }
    let tmp = tmp_path(path);
    {
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|e| WikiError::io(&tmp, e))?;
        f.write_all(bytes).map_err(|e| WikiError::io(&tmp, e))?;
        f.sync_all().map_err(|e| WikiError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        WikiError::io(path, e)
    })
}

/// Read a file that may legitimately be absent (first run).
pub fn read_optional(path: &Path) -> WikiResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WikiError::io(path, e)),
    }
}

/// Bytes of a file before an update touched it; `None` when it did not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: PathBuf,
    pub bytes: Option<Vec<u8>>,
}

impl Snapshot {
    pub fn capture(path: &Path) -> WikiResult<Self> {
        let bytes = if path.is_file() {
            Some(fs::read(path).map_err(|e| WikiError::io(path, e))?)
        } else if path.exists() {
            return Err(WikiError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "not a regular file"),
            ));
        } else {
            None
        };
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    /// Put the file back exactly as captured.
    pub fn restore(&self) -> WikiResult<()> {
        match &self.bytes {
            Some(bytes) => write_atomic(&self.path, bytes),
            // Parent may itself be missing or not a directory.
            None if !self.path.exists() => Ok(()),
            None => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(WikiError::io(&self.path, e)),
            },
        }
    }
}

// `context.md` and `architecture.md` share a directory; keep their tmp names distinct.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
