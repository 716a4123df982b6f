// src/services/state.rs
//! Keyed state that must survive across invocations.
//!
//! - Owns a single SQLite connection (WAL).
//! - `cooldowns`: project identity -> last successful commit (RFC3339 UTC).
//! - `monorepo_bindings`: canonical root path -> confirmed classification.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::error::{WikiError, WikiResult};
use crate::services::hierarchy::MonorepoBinding;

pub struct StateStore {
    db: Connection,
}

impl StateStore {
    /// Open/create the store and ensure schema. Creates the parent directory.
    pub fn open(db_path: &Path) -> WikiResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WikiError::io(parent, e))?;
        }
        let db = Connection::open(db_path)?;
        Self::init(db)
    }

    /// Throwaway store, for callers that do not persist anything.
    pub fn in_memory() -> WikiResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> WikiResult<Self> {
        db.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS cooldowns (
              project       TEXT PRIMARY KEY,  -- project identity, e.g. work/acme/api
              last_success  TEXT NOT NULL      -- RFC3339 UTC
            );

            CREATE TABLE IF NOT EXISTS monorepo_bindings (
              root          TEXT PRIMARY KEY,  -- canonicalized root path
              is_monorepo   INTEGER NOT NULL,  -- 0/1 answer to the classification question
              confirmed_at  TEXT NOT NULL      -- RFC3339 UTC
            );
            "#,
        )?;
        Ok(Self { db })
    }

    pub fn last_success(&self, project: &str) -> WikiResult<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .db
            .query_row(
                "SELECT last_success FROM cooldowns WHERE project = ?1",
                [project],
                |r| r.get(0),
            )
            .optional()?;
        raw.map(|s| parse_ts(&s)).transpose()
    }

    pub fn record_success(&self, project: &str, at: DateTime<Utc>) -> WikiResult<()> {
        self.db.execute(
            r#"
            INSERT INTO cooldowns(project, last_success) VALUES (?1, ?2)
            ON CONFLICT(project) DO UPDATE SET last_success = excluded.last_success
            "#,
            (project, at.to_rfc3339()),
        )?;
        Ok(())
    }

    pub fn binding(&self, root: &Path) -> WikiResult<Option<MonorepoBinding>> {
        let key = root.to_string_lossy().to_string();
        let row: Option<(i64, String)> = self
            .db
            .query_row(
                "SELECT is_monorepo, confirmed_at FROM monorepo_bindings WHERE root = ?1",
                [key.as_str()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        row.map(|(flag, ts)| {
            Ok(MonorepoBinding {
                root: PathBuf::from(&key),
                is_monorepo: flag != 0,
                confirmed_at: parse_ts(&ts)?,
            })
        })
        .transpose()
    }

    pub fn save_binding(&self, binding: &MonorepoBinding) -> WikiResult<()> {
        self.db.execute(
            r#"
            INSERT INTO monorepo_bindings(root, is_monorepo, confirmed_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(root) DO UPDATE SET
              is_monorepo  = excluded.is_monorepo,
              confirmed_at = excluded.confirmed_at
            "#,
            (
                binding.root.to_string_lossy().to_string(),
                binding.is_monorepo as i64,
                binding.confirmed_at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }
}

fn parse_ts(s: &str) -> WikiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| WikiError::State(format!("bad timestamp '{s}': {e}")))
}
