// src/services/hierarchy.rs
//! Hierarchy resolver: which wiki documents a session update must touch.
//!
//! Walks upward from the working directory looking for a workspace-root marker
//! file. Under a confirmed monorepo root, a path inside `<workspace_dir>/<name>`
//! updates both the root wiki and the workspace wiki. The "is this a monorepo?"
//! question is asked once per canonical root and persisted as a
//! [`MonorepoBinding`].

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::WorkspaceConfig;
use crate::services::locate::{PathClassifier, ProjectLocation};
use crate::services::state::StateStore;
use crate::utils::Clock;

pub const WIKI_FILE: &str = "context.md";
pub const ARCHITECTURE_FILE: &str = "architecture.md";

/// Persisted answer to the classification question for one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonorepoBinding {
    pub root: PathBuf,
    pub is_monorepo: bool,
    pub confirmed_at: DateTime<Utc>,
}

/// Asked when a workspace root is seen for the first time.
pub trait ClassificationPrompt {
    /// `Some(true)` when `root` should be treated as a monorepo whose
    /// `workspace` gets its own wiki next to the shared root wiki.
    /// `None` means nobody could answer; nothing is persisted and the
    /// question comes back on the next run.
    fn is_monorepo(&self, root: &Path, workspace: &Path) -> anyhow::Result<Option<bool>>;
}

/// Non-interactive prompt with a preset answer. Counts how often it was asked.
#[derive(Debug, Default)]
pub struct FixedAnswer {
    answer: bool,
    asked: AtomicUsize,
}

impl FixedAnswer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ClassificationPrompt for FixedAnswer {
    fn is_monorepo(&self, _root: &Path, _workspace: &Path) -> anyhow::Result<Option<bool>> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.answer))
    }
}

/// A marker-bearing directory found above the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    pub path: PathBuf,
    pub marker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Project root: the marker directory when one was found, else the cwd.
    pub root: PathBuf,
    /// Nested workspace relative to `root`, e.g. `packages/api`.
    pub workspace: Option<PathBuf>,
    pub binding: Option<MonorepoBinding>,
}

impl Resolution {
    pub fn is_pair(&self) -> bool {
        self.workspace.is_some()
    }

    /// Root target first, then the workspace target when present.
    pub fn targets(&self, classifier: &PathClassifier, context_root: &Path) -> Vec<Target> {
        let root_loc = classifier.locate(&self.root);
        let mut out = vec![Target::new("root", root_loc.clone(), context_root)];
        if let Some(ws) = &self.workspace {
            let loc = ProjectLocation {
                classification: root_loc.classification,
                relative: format!("{}/{}", root_loc.relative, slash_path(ws)),
            };
            out.push(Target::new(
                format!("workspace:{}", slash_path(ws)),
                loc,
                context_root,
            ));
        }
        out
    }
}

/// One wiki + architecture pair to update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub label: String,
    pub location: ProjectLocation,
    pub wiki_path: PathBuf,
    pub architecture_path: PathBuf,
}

impl Target {
    pub fn new(label: impl Into<String>, location: ProjectLocation, context_root: &Path) -> Self {
        let dir = location.context_dir(context_root);
        Self {
            label: label.into(),
            wiki_path: dir.join(WIKI_FILE),
            architecture_path: dir.join(ARCHITECTURE_FILE),
            location,
        }
    }

    pub fn identity(&self) -> String {
        self.location.identity()
    }
}

pub struct HierarchyResolver<'a> {
    cfg: &'a WorkspaceConfig,
    state: &'a StateStore,
    prompt: &'a dyn ClassificationPrompt,
    clock: &'a dyn Clock,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(
        cfg: &'a WorkspaceConfig,
        state: &'a StateStore,
        prompt: &'a dyn ClassificationPrompt,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            cfg,
            state,
            prompt,
            clock,
        }
    }

    pub fn resolve(&self, cwd: &Path) -> anyhow::Result<Resolution> {
        let cwd = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());

        let Some(found) = find_workspace_root(&cwd, self.cfg) else {
            return Ok(Resolution {
                root: cwd,
                workspace: None,
                binding: None,
            });
        };
        debug!(root = %found.path.display(), marker = %found.marker, "workspace root found");

        let Some(workspace) = workspace_of(&found.path, &cwd, self.cfg) else {
            let binding = self.state.binding(&found.path)?;
            return Ok(Resolution {
                root: found.path,
                workspace: None,
                binding,
            });
        };

        let binding = self.binding_for(&found.path, &workspace)?;
        let is_pair = binding.as_ref().is_some_and(|b| b.is_monorepo);
        Ok(Resolution {
            root: found.path,
            workspace: is_pair.then_some(workspace),
            binding,
        })
    }

    fn binding_for(&self, root: &Path, workspace: &Path) -> anyhow::Result<Option<MonorepoBinding>> {
        if let Some(b) = self.state.binding(root)? {
            return Ok(Some(b));
        }
        let Some(is_monorepo) = self.prompt.is_monorepo(root, workspace)? else {
            warn!(root = %root.display(), "monorepo question unanswered, updating the root wiki only this time");
            return Ok(None);
        };
        let binding = MonorepoBinding {
            root: root.to_path_buf(),
            is_monorepo,
            confirmed_at: self.clock.now(),
        };
        self.state.save_binding(&binding)?;
        info!(root = %root.display(), is_monorepo, "monorepo binding confirmed");
        Ok(Some(binding))
    }
}

/// Nearest directory at or above `start` containing one of the marker files.
pub fn find_workspace_root(start: &Path, cfg: &WorkspaceConfig) -> Option<WorkspaceRoot> {
    start.ancestors().find_map(|dir| {
        cfg.markers
            .iter()
            .find(|m| dir.join(m.as_str()).is_file())
            .map(|m| WorkspaceRoot {
                path: dir.to_path_buf(),
                marker: m.clone(),
            })
    })
}

/// `<workspace_dir>/<name>` when `path` lies inside a nested workspace of `root`.
pub fn workspace_of(root: &Path, path: &Path, cfg: &WorkspaceConfig) -> Option<PathBuf> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = rel.components().filter_map(|c| match c {
        Component::Normal(s) => Some(s),
        _ => None,
    });
    let dir = parts.next()?;
    let name = parts.next()?;
    let dir_str = dir.to_str()?;
    cfg.all_workspace_dirs()
        .any(|d| d == dir_str)
        .then(|| Path::new(dir).join(name))
}

fn slash_path(p: &Path) -> String {
    p.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
