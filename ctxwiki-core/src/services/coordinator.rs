// src/services/coordinator.rs
//! Commit coordinator.
//!
//! - `begin`: cooldown throttle (no document I/O), then the per-project lock.
//! - `UpdateSession::apply`: snapshot -> atomic write -> review of the written
//!   bytes -> commit, or restore every snapshot. All-or-nothing across the
//!   files of one update (single project or root + workspace pair).
//! - After a commit, best-effort remote sync; a failure there degrades the
//!   result but never rolls back local files.
//!
//! The lock is released when the `UpdateSession` is dropped, on every path.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::error::{WikiError, WikiResult};
use crate::services::hierarchy::Target;
use crate::services::reviewer::{self, Review, ReviewPolicy, Verdict};
use crate::services::state::StateStore;
use crate::services::sync::{GitSync, RemoteSync};
use crate::utils::fsio::{read_optional, write_atomic, Snapshot};
use crate::utils::logbook::{self, ReviewRecord};
use crate::utils::{Clock, LockGuard};
use crate::wiki::WikiDocument;

/// Rendered documents for one target plus what they replace.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub target: Target,
    pub wiki: String,
    pub architecture: String,
    pub previous_wiki: WikiDocument,
    pub previous_architecture: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReview {
    pub target: String,
    pub review: Review,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SyncStatus {
    Disabled,
    Synced,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    pub run_id: String,
    pub project: String,
    pub files: Vec<PathBuf>,
    pub reviews: Vec<TargetReview>,
    pub sync: SyncStatus,
}

impl CommitResult {
    /// Committed locally but the remote did not get it.
    pub fn is_degraded(&self) -> bool {
        matches!(self.sync, SyncStatus::Failed(_))
    }

    pub fn sync_error(&self) -> Option<WikiError> {
        match &self.sync {
            SyncStatus::Failed(msg) => Some(WikiError::SyncFailure(msg.clone())),
            _ => None,
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.reviews
            .iter()
            .map(|r| r.review.verdict)
            .max()
            .unwrap_or(Verdict::Pass)
    }

    /// `[target] severity: message` for every issue of every review.
    pub fn notes(&self) -> Vec<String> {
        self.reviews
            .iter()
            .flat_map(|r| {
                r.review
                    .notes()
                    .into_iter()
                    .map(move |n| format!("[{}] {n}", r.target))
            })
            .collect()
    }
}

pub enum Admission<'c> {
    Ready(UpdateSession<'c>),
    /// The last successful update is within the cooldown window.
    Throttled {
        project: String,
        last_success: DateTime<Utc>,
        retry_after: Duration,
    },
}

pub struct Coordinator {
    config: CoreConfig,
    state: StateStore,
    clock: Arc<dyn Clock>,
    sync: Option<Box<dyn RemoteSync>>,
}

impl Coordinator {
    /// Sync defaults to git in the context root when `commit.sync_enabled`.
    pub fn new(config: CoreConfig, state: StateStore, clock: Arc<dyn Clock>) -> Self {
        let sync: Option<Box<dyn RemoteSync>> = config.commit.sync_enabled.then(|| {
            Box::new(GitSync::new(
                config.paths.context_root.clone(),
                config.commit.remote.clone(),
            )) as Box<dyn RemoteSync>
        });
        Self {
            config,
            state,
            clock,
            sync,
        }
    }

    pub fn with_sync(mut self, sync: Box<dyn RemoteSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Cooldown check keyed by `cooldown_key`, then the lock keyed by `lock_key`.
    /// A held lock yields `Busy`; the attempt is not queued.
    pub fn begin(&self, lock_key: &str, cooldown_key: &str) -> WikiResult<Admission<'_>> {
        let now = self.clock.now();

        let cooldown = self
            .config
            .commit
            .cooldown()
            .map_err(|e| WikiError::State(e.to_string()))?;
        if cooldown > Duration::zero() {
            if let Some(last) = self.state.last_success(cooldown_key)? {
                let elapsed = now - last;
                if elapsed < cooldown {
                    info!(project = cooldown_key, "update throttled by cooldown");
                    self.event("throttled", json!({ "project": cooldown_key, "last_success": last.to_rfc3339() }));
                    return Ok(Admission::Throttled {
                        project: cooldown_key.to_string(),
                        last_success: last,
                        retry_after: cooldown - elapsed,
                    });
                }
            }
        }

        let stale = self
            .config
            .commit
            .stale_lock_after()
            .map_err(|e| WikiError::State(e.to_string()))?;
        let lock = match LockGuard::acquire(&self.config.locks_dir(), lock_key, now, stale) {
            Ok(l) => l,
            Err(e) => {
                if matches!(e, WikiError::Busy { .. }) {
                    warn!(project = lock_key, "update already in flight");
                    self.event("busy", json!({ "project": lock_key }));
                }
                return Err(e);
            }
        };

        Ok(Admission::Ready(UpdateSession {
            coordinator: self,
            project: lock_key.to_string(),
            cooldown_key: cooldown_key.to_string(),
            run_id: uuid::Uuid::new_v4().to_string(),
            _lock: lock,
        }))
    }

    fn event(&self, name: &str, data: serde_json::Value) {
        let ts = self.clock.now().to_rfc3339();
        if let Err(e) = logbook::emit_event(&self.config.paths.state_dir, name, data, &ts) {
            warn!(error = %e, event = name, "logbook write failed");
        }
    }
}

/// Holds the project lock from `begin` until drop.
pub struct UpdateSession<'c> {
    coordinator: &'c Coordinator,
    project: String,
    cooldown_key: String,
    run_id: String,
    _lock: LockGuard,
}

impl UpdateSession<'_> {
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Read a persisted document under the lock; absent means first run.
    pub fn read(&self, path: &std::path::Path) -> WikiResult<String> {
        Ok(read_optional(path)?.unwrap_or_default())
    }

    pub fn apply(self, candidates: Vec<Candidate>) -> WikiResult<CommitResult> {
        let c = self.coordinator;
        let cfg = &c.config;
        let strict = cfg.commit.block_on_needs_changes;
        let policy = ReviewPolicy::from(&cfg.wiki);

        let mut snapshots = Vec::with_capacity(candidates.len() * 2);
        for cand in &candidates {
            snapshots.push(Snapshot::capture(&cand.target.wiki_path)?);
            snapshots.push(Snapshot::capture(&cand.target.architecture_path)?);
        }

        for cand in &candidates {
            let writes = [
                (&cand.target.wiki_path, &cand.wiki),
                (&cand.target.architecture_path, &cand.architecture),
            ];
            for (path, text) in writes {
                if let Err(e) = write_atomic(path, text.as_bytes()) {
                    warn!(project = %self.project, error = %e, "write failed, reverting");
                    self.revert(&snapshots, &[e.to_string()])?;
                    return Err(e);
                }
            }
        }

        let mut reviews = Vec::with_capacity(candidates.len());
        let mut blocking = Vec::new();
        for cand in &candidates {
            let written = read_optional(&cand.target.wiki_path)
                .and_then(|w| Ok((w, read_optional(&cand.target.architecture_path)?)));
            let (wiki, arch) = match written {
                Ok((w, a)) => (w.unwrap_or_default(), a.unwrap_or_default()),
                Err(e) => {
                    self.revert(&snapshots, &[e.to_string()])?;
                    return Err(e);
                }
            };

            let review = reviewer::review(
                &wiki,
                &cand.previous_wiki,
                &arch,
                &cand.previous_architecture,
                &policy,
            );
            info!(
                project = %self.project,
                target = %cand.target.label,
                verdict = review.verdict.as_str(),
                issues = review.issues.len(),
                "review complete"
            );
            self.record_review(&cand.target.label, &review);

            if review.blocks_commit(strict) {
                blocking.extend(
                    review
                        .issues
                        .iter()
                        .filter(|i| i.severity == Verdict::MustFix || (strict && i.severity == Verdict::NeedsChanges))
                        .map(|i| format!("[{}] {}", cand.target.label, i.message)),
                );
            }
            reviews.push(TargetReview {
                target: cand.target.label.clone(),
                review,
            });
        }

        if !blocking.is_empty() {
            warn!(project = %self.project, issues = blocking.len(), "review blocked commit, reverting");
            self.revert(&snapshots, &blocking)?;
            return Err(WikiError::MustFixViolation { issues: blocking });
        }

        let now = c.clock.now();
        if let Err(e) = c.state.record_success(&self.cooldown_key, now) {
            warn!(project = %self.cooldown_key, error = %e, "cooldown not recorded");
        }

        let files: Vec<PathBuf> = candidates
            .iter()
            .flat_map(|cand| {
                [
                    cand.target.wiki_path.clone(),
                    cand.target.architecture_path.clone(),
                ]
            })
            .collect();

        let sync = match &c.sync {
            None => SyncStatus::Disabled,
            Some(remote) => {
                let message = format!("ctxwiki: update {}", self.project);
                match remote.commit(&files, &message).and_then(|_| remote.push()) {
                    Ok(()) => SyncStatus::Synced,
                    Err(e) => {
                        warn!(project = %self.project, error = %e, "remote sync failed; local commit kept");
                        c.event("sync_failed", json!({ "project": self.project, "error": e.to_string() }));
                        SyncStatus::Failed(e.to_string())
                    }
                }
            }
        };

        info!(project = %self.project, files = files.len(), "update committed");
        c.event(
            "committed",
            json!({
                "run_id": self.run_id,
                "project": self.project,
                "files": files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>(),
            }),
        );

        Ok(CommitResult {
            run_id: self.run_id.clone(),
            project: self.project.clone(),
            files,
            reviews,
            sync,
        })
    }

    fn revert(&self, snapshots: &[Snapshot], reasons: &[String]) -> WikiResult<()> {
        let mut failed = Vec::new();
        for snap in snapshots.iter().rev() {
            if let Err(e) = snap.restore() {
                failed.push(e.to_string());
            }
        }
        self.coordinator.event(
            "reverted",
            json!({ "run_id": self.run_id, "project": self.project, "reasons": reasons }),
        );
        if failed.is_empty() {
            Ok(())
        } else {
            Err(WikiError::State(format!("revert incomplete: {}", failed.join("; "))))
        }
    }

    fn record_review(&self, target: &str, review: &Review) {
        let c = self.coordinator;
        let record = ReviewRecord {
            run_id: &self.run_id,
            ts: c.clock.now().to_rfc3339(),
            project: &self.project,
            target,
            verdict: review.verdict,
            issues: &review.issues,
        };
        if let Err(e) = logbook::append_review(&c.config.paths.state_dir, &record) {
            warn!(error = %e, "review transcript write failed");
        }
    }
}
