// ctxwiki-core/src/commands/init.rs

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::CoreConfig;
use crate::utils::write_atomic;

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub config: CoreConfig,
    pub created: Vec<String>,
    pub existed: Vec<String>,
}

/// Resolve the state root. `CTXWIKI_ROOT` overrides `~/.ctxwiki`.
pub fn default_root() -> PathBuf {
    if let Some(root) = std::env::var_os("CTXWIKI_ROOT") {
        return PathBuf::from(root);
    }
    std::env::var_os("HOME")
        .map(|h| PathBuf::from(h).join(".ctxwiki"))
        .unwrap_or_else(|| PathBuf::from(".ctxwiki"))
}

/// Idempotent: creates what is missing, reports what already existed.
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let mut created = Vec::new();
    let mut existed = Vec::new();

    ensure_dir(root, "", &mut created, &mut existed)?;
    ensure_file(root, "config.toml", DEFAULT_CONFIG_TOML, &mut created, &mut existed)?;

    // Paths below come from the (possibly user-edited) config.
    let config = CoreConfig::load(root)?;
    ensure_abs_dir(&config.paths.context_root, &mut created, &mut existed)?;
    ensure_abs_dir(&config.paths.state_dir, &mut created, &mut existed)?;
    ensure_abs_dir(&config.logbook_dir(), &mut created, &mut existed)?;
    ensure_abs_dir(&config.locks_dir(), &mut created, &mut existed)?;

    let init_event = serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "event": "system_init",
        "data": { "version": env!("CARGO_PKG_VERSION") }
    })
    .to_string();
    ensure_seeded_jsonl(&config.paths.state_dir, "logbook.jsonl", &init_event, &mut created, &mut existed)?;

    Ok(InitReport {
        root: root.to_path_buf(),
        config,
        created,
        existed,
    })
}

fn ensure_dir(
    base: &Path,
    rel: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = if rel.is_empty() { base.to_path_buf() } else { base.join(rel) };
    let label = if rel.is_empty() { ".".to_string() } else { rel.to_string() };
    if p.exists() {
        existed.push(label);
        return Ok(());
    }
    fs::create_dir_all(&p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(label);
    Ok(())
}

fn ensure_abs_dir(p: &Path, created: &mut Vec<String>, existed: &mut Vec<String>) -> Result<()> {
    let label = p.display().to_string();
    if p.exists() {
        existed.push(label);
        return Ok(());
    }
    fs::create_dir_all(p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(label);
    Ok(())
}

fn ensure_file(
    base: &Path,
    rel_file: &str,
    content_if_absent: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = base.join(rel_file);
    if p.exists() {
        existed.push(rel_file.to_string());
        return Ok(());
    }
    write_atomic(&p, content_if_absent.as_bytes())?;
    created.push(rel_file.to_string());
    Ok(())
}

fn ensure_seeded_jsonl(
    dir: &Path,
    file: &str,
    init_line: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = dir.join(file);
    if !p.exists() {
        return ensure_file(dir, file, &format!("{init_line}\n"), created, existed);
    }
    existed.push(file.to_string());
    if fs::metadata(&p)?.len() == 0 {
        let mut f = OpenOptions::new().append(true).open(&p)?;
        f.write_all(init_line.as_bytes())?;
        f.write_all(b"\n")?;
    }
    Ok(())
}

// ---------- defaults ----------

const DEFAULT_CONFIG_TOML: &str = r#"[paths]
context_root = "context"
state_dir = "state"

[wiki]
title = "Project Context"
max_recent = 5
dedup_threshold = 0.80
overlap_metric = "containment"
shrink_ratio = 0.5
trivial_architecture_chars = 80

[workspace]
markers = ["pnpm-workspace.yaml", "lerna.json", "nx.json", "turbo.json", "rush.json", "go.work"]
workspace_dirs = ["packages", "apps", "services", "libs", "crates", "modules"]
custom_dirs = []

[commit]
cooldown_secs = 3600
stale_lock_secs = 900
sync_enabled = false
remote = "origin"
block_on_needs_changes = false

[classify]
work_path_patterns = []
personal_path_patterns = []
excluded_paths = []
"#;
