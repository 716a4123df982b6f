// src/services/locate.rs
//! Where a working directory's context lives.
//!
//! Directories are classified `work` or `personal` by path prefix, and the
//! context directory is `<context_root>/<classification>/<relative path>`.
//! Prefix matching is per path component, so `~/work` does not match `~/workshop`.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::{expand_home, ClassifyConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Work,
    Personal,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Work => "work",
            Classification::Personal => "personal",
        }
    }
}

/// A classified project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectLocation {
    pub classification: Classification,
    /// Relative context path, `/`-separated, never empty.
    pub relative: String,
}

impl ProjectLocation {
    /// Stable identity: `<classification>/<relative>`.
    pub fn identity(&self) -> String {
        format!("{}/{}", self.classification.as_str(), self.relative)
    }

    pub fn context_dir(&self, context_root: &Path) -> PathBuf {
        context_root.join(self.classification.as_str()).join(&self.relative)
    }
}

#[derive(Debug, Clone)]
pub struct PathClassifier {
    work: Vec<PathBuf>,
    personal: Vec<PathBuf>,
    excluded: Vec<PathBuf>,
    home: Option<PathBuf>,
}

impl PathClassifier {
    pub fn new(cfg: &ClassifyConfig) -> Self {
        Self::with_home(cfg, std::env::var_os("HOME").map(PathBuf::from))
    }

    pub fn with_home(cfg: &ClassifyConfig, home: Option<PathBuf>) -> Self {
        let expand = |v: &Vec<String>| -> Vec<PathBuf> {
            v.iter()
                .map(|p| match (&home, Path::new(p).strip_prefix("~")) {
                    (Some(h), Ok(rest)) => h.join(rest),
                    _ => expand_home(Path::new(p)),
                })
                .collect()
        };
        Self {
            work: expand(&cfg.work_path_patterns),
            personal: expand(&cfg.personal_path_patterns),
            excluded: expand(&cfg.excluded_paths),
            home,
        }
    }

    pub fn classify(&self, cwd: &Path) -> Classification {
        if self.work.iter().any(|p| cwd.starts_with(p)) {
            Classification::Work
        } else {
            Classification::Personal
        }
    }

    pub fn is_excluded(&self, cwd: &Path) -> bool {
        self.excluded.iter().any(|p| cwd.starts_with(p))
    }

    /// Path below the matching pattern; else below `$HOME` with a leading
    /// classification segment stripped; else the last two segments.
    pub fn relative_path(&self, cwd: &Path, class: Classification) -> String {
        let patterns = match class {
            Classification::Work => &self.work,
            Classification::Personal => &self.personal,
        };

        let rel = patterns
            .iter()
            .find_map(|p| cwd.strip_prefix(p).ok())
            .map(segments)
            .or_else(|| {
                let home = self.home.as_ref()?;
                let mut segs = segments(cwd.strip_prefix(home).ok()?);
                if segs.len() > 1 && segs.first().map(String::as_str) == Some(class.as_str()) {
                    segs.remove(0);
                }
                Some(segs)
            })
            .unwrap_or_else(|| {
                let segs = segments(cwd);
                segs[segs.len().saturating_sub(2)..].to_vec()
            });

        if rel.is_empty() {
            // cwd is the pattern itself
            segments(cwd).pop().unwrap_or_else(|| "root".to_string())
        } else {
            rel.join("/")
        }
    }

    pub fn locate(&self, cwd: &Path) -> ProjectLocation {
        let classification = self.classify(cwd);
        ProjectLocation {
            classification,
            relative: self.relative_path(cwd, classification),
        }
    }
}

fn segments(p: &Path) -> Vec<String> {
    p.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect()
}
