use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing;

use crate::wiki::overlap::OverlapMetric;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub wiki: WikiConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<CoreConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.commit
            .validate()
            .with_context(|| format!("invalid [commit] in {}", path.display()))?;
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.paths.context_root = absolutize(root, &expand_home(&self.paths.context_root));
        self.paths.state_dir = absolutize(root, &expand_home(&self.paths.state_dir));
    }

    /// Logbook directory under the state dir.
    pub fn logbook_dir(&self) -> PathBuf {
        self.paths.state_dir.join("logbook")
    }

    pub fn state_db_path(&self) -> PathBuf {
        self.paths.state_dir.join("state.db")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.paths.state_dir.join("locks")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "PathsConfig::default_context_root")]
    pub context_root: PathBuf,
    #[serde(default = "PathsConfig::default_state_dir")]
    pub state_dir: PathBuf,
}

impl PathsConfig {
    fn default_context_root() -> PathBuf {
        PathBuf::from("context")
    }

    fn default_state_dir() -> PathBuf {
        PathBuf::from("state")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            context_root: Self::default_context_root(),
            state_dir: Self::default_state_dir(),
        }
    }
}

// -------------------------------------------------------------------------
// Merge + review policy (used by services::merger and services::reviewer)
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    #[serde(default = "WikiConfig::default_title")]
    pub title: String,
    #[serde(default = "WikiConfig::default_max_recent")]
    pub max_recent: usize,
    #[serde(default = "WikiConfig::default_dedup_threshold")]
    pub dedup_threshold: f64,
    #[serde(default)]
    pub overlap_metric: OverlapMetric,
    #[serde(default = "WikiConfig::default_shrink_ratio")]
    pub shrink_ratio: f64,
    #[serde(default = "WikiConfig::default_trivial_architecture_chars")]
    pub trivial_architecture_chars: usize,
    /// Sentinels that may not open a line of the output.
    #[serde(default = "WikiConfig::default_boundary_markers")]
    pub boundary_markers: Vec<String>,
}

impl WikiConfig {
    fn default_title() -> String {
        "Project Context".to_string()
    }

    fn default_max_recent() -> usize {
        5
    }

    fn default_dedup_threshold() -> f64 {
        0.80
    }

    fn default_shrink_ratio() -> f64 {
        0.5
    }

    fn default_trivial_architecture_chars() -> usize {
        80
    }

    fn default_boundary_markers() -> Vec<String> {
        [
            "<<<",
            ">>>",
            "=== BEGIN",
            "=== END",
            "```",
            "<wiki>",
            "</wiki>",
            "<architecture>",
            "</architecture>",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            max_recent: Self::default_max_recent(),
            dedup_threshold: Self::default_dedup_threshold(),
            overlap_metric: OverlapMetric::default(),
            shrink_ratio: Self::default_shrink_ratio(),
            trivial_architecture_chars: Self::default_trivial_architecture_chars(),
            boundary_markers: Self::default_boundary_markers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "WorkspaceConfig::default_markers")]
    pub markers: Vec<String>,
    #[serde(default = "WorkspaceConfig::default_workspace_dirs")]
    pub workspace_dirs: Vec<String>,
    #[serde(default)]
    pub custom_dirs: Vec<String>,
}

impl WorkspaceConfig {
    fn default_markers() -> Vec<String> {
        [
            "pnpm-workspace.yaml",
            "lerna.json",
            "nx.json",
            "turbo.json",
            "rush.json",
            "go.work",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_workspace_dirs() -> Vec<String> {
        ["packages", "apps", "services", "libs", "crates", "modules"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Default plus custom nested-workspace directory names.
    pub fn all_workspace_dirs(&self) -> impl Iterator<Item = &str> {
        self.workspace_dirs
            .iter()
            .chain(self.custom_dirs.iter())
            .map(|s| s.as_str())
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            markers: Self::default_markers(),
            workspace_dirs: Self::default_workspace_dirs(),
            custom_dirs: vec![],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitConfig {
    #[serde(default = "CommitConfig::default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "CommitConfig::default_stale_lock_secs")]
    pub stale_lock_secs: u64,
    #[serde(default)]
    pub sync_enabled: bool,
    #[serde(default = "CommitConfig::default_remote")]
    pub remote: String,
    /// Treat NeedsChanges like MustFix. Off: NeedsChanges is advisory.
    #[serde(default)]
    pub block_on_needs_changes: bool,
}

impl CommitConfig {
    fn default_cooldown_secs() -> u64 {
        3600
    }

    fn default_stale_lock_secs() -> u64 {
        900
    }

    fn default_remote() -> String {
        "origin".into()
    }

    /// Both windows must be representable as a `chrono::Duration`.
    pub fn validate(&self) -> Result<()> {
        self.cooldown()?;
        self.stale_lock_after()?;
        Ok(())
    }

    pub fn cooldown(&self) -> Result<Duration> {
        secs_to_duration("cooldown_secs", self.cooldown_secs)
    }

    pub fn stale_lock_after(&self) -> Result<Duration> {
        secs_to_duration("stale_lock_secs", self.stale_lock_secs)
    }
}

fn secs_to_duration(field: &str, secs: u64) -> Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| anyhow::anyhow!("{field} = {secs} is out of range"))
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: Self::default_cooldown_secs(),
            stale_lock_secs: Self::default_stale_lock_secs(),
            sync_enabled: false,
            remote: Self::default_remote(),
            block_on_needs_changes: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyConfig {
    #[serde(default)]
    pub work_path_patterns: Vec<String>,
    #[serde(default)]
    pub personal_path_patterns: Vec<String>,
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}

/// Expand a leading `~` to the home directory (from `$HOME`).
pub fn expand_home(value: &Path) -> PathBuf {
    let Ok(rest) = value.strip_prefix("~") else {
        return value.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => value.to_path_buf(),
    }
}
