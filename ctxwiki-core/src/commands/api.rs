// src/commands/api.rs
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::commands::init::ensure_initialized;
use crate::commands::update::{self, SessionUpdate, UpdateOutcome};
use crate::config::CoreConfig;
use crate::services::coordinator::Coordinator;
use crate::services::hierarchy::{ClassificationPrompt, HierarchyResolver, Resolution, Target};
use crate::services::locate::PathClassifier;
use crate::services::state::StateStore;
use crate::services::sync::RemoteSync;
use crate::utils::{Clock, SystemClock};

pub struct Commands {
    coordinator: Coordinator, // owns the one SQLite connection
    classifier: PathClassifier,
}

impl Commands {
    /// Initialize `root` if needed and open its state with the system clock.
    pub fn open(root: &Path) -> Result<Self> {
        let report = ensure_initialized(root)?;
        if !report.created.is_empty() {
            info!(root = %root.display(), created = ?report.created, "state root initialized");
        }
        Self::with_clock(report.config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let state = StateStore::open(&config.state_db_path())?;
        let classifier = PathClassifier::new(&config.classify);
        Ok(Self {
            coordinator: Coordinator::new(config, state, clock),
            classifier,
        })
    }

    /// Replace the remote collaborator (tests, custom remotes).
    pub fn with_sync(mut self, sync: Box<dyn RemoteSync>) -> Self {
        self.coordinator = self.coordinator.with_sync(sync);
        self
    }

    /// Swap the classifier, e.g. to pin `$HOME`.
    pub fn with_classifier(mut self, classifier: PathClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        self.coordinator.config()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Run one session update end to end.
    pub fn update(&self, req: &SessionUpdate, prompt: &dyn ClassificationPrompt) -> Result<UpdateOutcome> {
        update::run(&self.coordinator, &self.classifier, prompt, req)
    }

    /// Which documents an update from `cwd` would touch.
    pub fn resolve(&self, cwd: &Path, prompt: &dyn ClassificationPrompt) -> Result<(Resolution, Vec<Target>)> {
        let cfg = self.coordinator.config();
        let resolver = HierarchyResolver::new(
            &cfg.workspace,
            self.coordinator.state(),
            prompt,
            self.coordinator.clock(),
        );
        let resolution = resolver.resolve(cwd)?;
        let targets = resolution.targets(&self.classifier, &cfg.paths.context_root);
        Ok((resolution, targets))
    }
}
