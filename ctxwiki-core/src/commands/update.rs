// ctxwiki-core/src/commands/update.rs
//! Session-update pipeline:
//! exclusion -> hierarchy -> parse proposal -> cooldown + lock -> read previous
//! -> merge -> render -> coordinator (write, review, commit or revert, sync).
//!
//! Parse and merge failures return before any persisted file is touched.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::services::coordinator::{Admission, Candidate, CommitResult, Coordinator};
use crate::services::hierarchy::{ClassificationPrompt, HierarchyResolver, Target};
use crate::services::locate::PathClassifier;
use crate::services::merger::{merge_with_report, MergePolicy, MergeReport};
use crate::services::reviewer::{self, Review, ReviewPolicy};
use crate::wiki::{parse, render, WikiDocument, WorkEntry};

/// What the summarizer produced for one ended session.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub cwd: PathBuf,
    /// Proposed wiki markdown; may be empty.
    pub proposed_wiki: String,
    /// Architecture prose for the leaf target (the workspace in a pair).
    /// Blank keeps the persisted overview.
    pub proposed_architecture: String,
    /// Architecture prose for the shared root of a pair. `None` keeps it.
    pub root_architecture: Option<String>,
    /// Extra Recent Work line built from the session summary.
    pub session_note: Option<SessionNote>,
}

#[derive(Debug, Clone)]
pub struct SessionNote {
    pub date: NaiveDate,
    pub summary: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetMerge {
    pub target: String,
    pub report: MergeReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Excluded {
        cwd: PathBuf,
    },
    Throttled {
        project: String,
        retry_after_secs: i64,
    },
    Committed {
        result: CommitResult,
        merges: Vec<TargetMerge>,
    },
}

pub(crate) fn run(
    coordinator: &Coordinator,
    classifier: &PathClassifier,
    prompt: &dyn ClassificationPrompt,
    req: &SessionUpdate,
) -> Result<UpdateOutcome> {
    let cfg = coordinator.config();
    let cwd = req.cwd.canonicalize().unwrap_or_else(|_| req.cwd.clone());
    if classifier.is_excluded(&cwd) || classifier.is_excluded(&req.cwd) {
        info!(cwd = %cwd.display(), "path excluded, skipping update");
        return Ok(UpdateOutcome::Excluded { cwd });
    }

    let resolver = HierarchyResolver::new(&cfg.workspace, coordinator.state(), prompt, coordinator.clock());
    let resolution = resolver.resolve(&cwd)?;
    let targets = resolution.targets(classifier, &cfg.paths.context_root);
    debug!(targets = targets.len(), pair = resolution.is_pair(), "targets resolved");

    let mut proposed = parse(&req.proposed_wiki)?;
    if let Some(note) = &req.session_note {
        proposed
            .recent_work
            .insert(0, WorkEntry::from_session(note.date, &note.summary, &note.topics));
    }

    let (Some(root), Some(leaf)) = (targets.first(), targets.last()) else {
        anyhow::bail!("no update target for {}", cwd.display());
    };
    let session = match coordinator.begin(&root.identity(), &leaf.identity())? {
        Admission::Ready(s) => s,
        Admission::Throttled {
            project,
            retry_after,
            ..
        } => {
            return Ok(UpdateOutcome::Throttled {
                project,
                retry_after_secs: retry_after.num_seconds().max(0),
            })
        }
    };

    let policy = MergePolicy::from(&cfg.wiki);
    let leaf_label = leaf.label.clone();
    let mut candidates = Vec::with_capacity(targets.len());
    let mut merges = Vec::with_capacity(targets.len());

    for target in &targets {
        let previous_text = session.read(&target.wiki_path)?;
        let previous = parse(&previous_text)?;
        let (merged, report) = merge_with_report(&previous, &proposed, &policy);

        let previous_architecture = session.read(&target.architecture_path)?;
        let proposal = if target.label == leaf_label {
            Some(req.proposed_architecture.as_str())
        } else {
            req.root_architecture.as_deref()
        };
        let architecture = next_architecture(&previous_architecture, proposal);

        merges.push(TargetMerge {
            target: target.label.clone(),
            report,
        });
        candidates.push(candidate(target, &merged, previous, architecture, previous_architecture, &cfg.wiki.title));
    }

    let result = session.apply(candidates)?;
    Ok(UpdateOutcome::Committed { result, merges })
}

fn candidate(
    target: &Target,
    merged: &WikiDocument,
    previous_wiki: WikiDocument,
    architecture: String,
    previous_architecture: String,
    title: &str,
) -> Candidate {
    Candidate {
        target: target.clone(),
        wiki: render::render(merged, title),
        architecture,
        previous_wiki,
        previous_architecture,
    }
}

/// Blank or absent proposals keep what is persisted.
fn next_architecture(previous: &str, proposal: Option<&str>) -> String {
    match proposal.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => render::render_architecture(p),
        None if previous.trim().is_empty() => render::render_architecture(""),
        None => previous.to_string(),
    }
}

/// Review persisted files without writing, for the `review` admin command.
pub fn review_files(
    new_wiki: &Path,
    old_wiki: Option<&Path>,
    new_architecture: Option<&Path>,
    old_architecture: Option<&Path>,
    policy: &ReviewPolicy,
) -> Result<Review> {
    let read = |p: Option<&Path>| -> Result<String> {
        match p {
            Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())),
            None => Ok(String::new()),
        }
    };
    let new_text = read(Some(new_wiki))?;
    let old = parse(&read(old_wiki)?)?;
    Ok(reviewer::review(
        &new_text,
        &old,
        &read(new_architecture)?,
        &read(old_architecture)?,
        policy,
    ))
}
