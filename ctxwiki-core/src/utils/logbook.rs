// src/utils/logbook.rs
//! Append-only JSONL transcript.
//!
//! - `<state_dir>/logbook.jsonl` gets lifecycle events (committed, reverted, busy, ...).
//! - `<state_dir>/logbook/reviews.jsonl` gets one line per review with its issues.
//!
//! Callers treat these writes as best-effort.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::{fs, io::Write, path::Path};

use crate::services::reviewer::{Issue, Verdict};

#[derive(Debug, Clone, Serialize)]
pub struct ReviewRecord<'a> {
    pub run_id: &'a str,
    pub ts: String,
    pub project: &'a str,
    /// Which document pair was reviewed, e.g. `root` or `workspace:packages/api`.
    pub target: &'a str,
    pub verdict: Verdict,
    pub issues: &'a [Issue],
}

pub fn append_review(state_dir: &Path, record: &ReviewRecord<'_>) -> Result<()> {
    let dir = state_dir.join("logbook");
    fs::create_dir_all(&dir).with_context(|| format!("create_dir_all({:?})", dir))?;
    append_line(&dir.join("reviews.jsonl"), &serde_json::to_string(record)?)
}

pub fn emit_event(state_dir: &Path, event: &str, data: Value, ts: &str) -> Result<()> {
    fs::create_dir_all(state_dir).with_context(|| format!("create_dir_all({:?})", state_dir))?;
    let line = serde_json::json!({
        "timestamp": ts,
        "event": event,
        "data": data
    });
    append_line(&state_dir.join("logbook.jsonl"), &serde_json::to_string(&line)?)
}

fn append_line(path: &Path, json: &str) -> Result<()> {
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open logbook {:?}", path))?;
    writeln!(f, "{}", json)?;
    Ok(())
}
