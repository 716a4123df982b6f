// src/error.rs
//! Typed failures of the consolidation engine.
//!
//! Parser and merge failures abort an update before persisted state is touched.
//! `MustFixViolation` aborts after merge with a full revert. `Busy` abandons the
//! attempt; the next session-end event is the natural retry. `SyncFailure` is
//! reported alongside a successful local commit and never rolls it back.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WikiError {
    /// Structural violation found while parsing a wiki document.
    /// `line` is 1-based; 0 means the violation is not tied to a line.
    #[error("malformed document (line {line}): {reason}")]
    MalformedDocument { line: usize, reason: String },

    /// Another update for the same project is in flight.
    #[error("update already in progress for project {project}")]
    Busy { project: String },

    /// The review gate returned MustFix; nothing was persisted.
    #[error("review gate blocked commit: {}", issues.join("; "))]
    MustFixViolation { issues: Vec<String> },

    /// Remote synchronization failed after a successful local commit.
    #[error("remote sync failed: {0}")]
    SyncFailure(String),

    #[error("i/o error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Keyed state store (cooldowns, monorepo bindings) failure.
    #[error("state store error: {0}")]
    State(String),
}

impl WikiError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        WikiError::MalformedDocument {
            line,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WikiError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<rusqlite::Error> for WikiError {
    fn from(e: rusqlite::Error) -> Self {
        WikiError::State(e.to_string())
    }
}

pub type WikiResult<T> = std::result::Result<T, WikiError>;
