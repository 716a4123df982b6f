// src/services/merger.rs
//! Merger: previous wiki + proposed wiki -> merged wiki.
//!
//! Pure and deterministic. Rules, in order:
//! 1. Decisions start from `previous`; each proposed decision either supersedes
//!    its near-duplicate (when it has strictly more distinct words and still
//!    covers every text that slot replaced), is dropped in favour of it, or is
//!    appended. A more detailed phrasing is never dropped. Nothing is deleted
//!    outright.
//! 2. Patterns are `previous` followed by genuinely new proposed patterns.
//! 3. Recent Work is proposed entries (newest first) ahead of previous ones,
//!    de-duplicated and truncated to `max_recent`. Bounded, intentionally lossy.

use serde::Serialize;
use tracing::debug;

use crate::config::WikiConfig;
use crate::error::WikiResult;
use crate::wiki::overlap::{self, OverlapMetric};
use crate::wiki::{parse, DecisionEntry, WikiDocument, WorkEntry};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergePolicy {
    pub dedup_threshold: f64,
    pub metric: OverlapMetric,
    pub max_recent: usize,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self::from(&WikiConfig::default())
    }
}

impl From<&WikiConfig> for MergePolicy {
    fn from(cfg: &WikiConfig) -> Self {
        Self {
            dedup_threshold: cfg.dedup_threshold,
            metric: cfg.overlap_metric,
            // A zero-length log would violate the [1, max] bound; clamp.
            max_recent: cfg.max_recent.max(1),
        }
    }
}

/// What the merge did, for logs and the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub decisions_added: usize,
    pub decisions_superseded: Vec<Supersession>,
    pub decisions_duplicate: usize,
    pub patterns_added: usize,
    pub recent_added: usize,
    pub recent_dropped: usize,
}

/// `old` was replaced in place by the more detailed `new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Supersession {
    pub old: String,
    pub new: String,
}

pub fn merge(previous: &WikiDocument, proposed: &WikiDocument, policy: &MergePolicy) -> WikiDocument {
    merge_with_report(previous, proposed, policy).0
}

/// Parse both texts, then merge. Fails only when an input fails to parse.
pub fn merge_text(previous: &str, proposed: &str, policy: &MergePolicy) -> WikiResult<WikiDocument> {
    let previous = parse(previous)?;
    let proposed = parse(proposed)?;
    Ok(merge(&previous, &proposed, policy))
}

pub fn merge_with_report(
    previous: &WikiDocument,
    proposed: &WikiDocument,
    policy: &MergePolicy,
) -> (WikiDocument, MergeReport) {
    let mut report = MergeReport::default();

    let decisions = merge_decisions(&previous.decisions, &proposed.decisions, policy, &mut report);
    let patterns = merge_patterns(&previous.patterns, &proposed.patterns, policy, &mut report);
    let recent_work = merge_recent(&previous.recent_work, &proposed.recent_work, policy, &mut report);

    debug!(
        added = report.decisions_added,
        superseded = report.decisions_superseded.len(),
        patterns_added = report.patterns_added,
        recent_added = report.recent_added,
        recent_dropped = report.recent_dropped,
        "wiki merged"
    );

    (
        WikiDocument {
            decisions,
            patterns,
            recent_work,
        },
        report,
    )
}

// ---- Internal helpers --------------------------------------------------

fn merge_decisions(
    previous: &[DecisionEntry],
    proposed: &[DecisionEntry],
    policy: &MergePolicy,
    report: &mut MergeReport,
) -> Vec<DecisionEntry> {
    let mut kept: Vec<DecisionEntry> = previous.to_vec();
    // Previous texts each slot stands for. A replacement must still cover all of
    // them, otherwise a chain of supersessions could drift away from the original.
    let mut lineage: Vec<Vec<String>> = previous.iter().map(|d| vec![d.text.clone()]).collect();

    for cand in proposed {
        match best_match(kept.iter().map(|d| d.text.as_str()), &cand.text, policy) {
            Some(idx) => {
                let existing = kept[idx].clone();
                let more_detailed =
                    overlap::distinct_words(&cand.text) > overlap::distinct_words(&existing.text);
                let covers = lineage[idx]
                    .iter()
                    .all(|orig| overlap::is_same(orig, &cand.text, policy.metric, policy.dedup_threshold));
                if more_detailed && covers {
                    report.decisions_superseded.push(Supersession {
                        old: existing.text.clone(),
                        new: cand.text.clone(),
                    });
                    kept[idx] = absorb(cand.clone(), &existing);
                } else if more_detailed {
                    // Wider than the slot but drifted from what it stands for:
                    // keep both rather than lose either phrasing.
                    kept.push(cand.clone());
                    lineage.push(vec![cand.text.clone()]);
                    report.decisions_added += 1;
                } else {
                    kept[idx] = absorb(existing, cand);
                    report.decisions_duplicate += 1;
                }
            }
            None => {
                kept.push(cand.clone());
                lineage.push(vec![cand.text.clone()]);
                report.decisions_added += 1;
            }
        }
    }
    kept
}

/// The winner keeps its own text; missing rationale/alternatives come from the loser.
fn absorb(mut winner: DecisionEntry, loser: &DecisionEntry) -> DecisionEntry {
    if winner.rationale.is_none() {
        winner.rationale = loser.rationale.clone();
    }
    if winner.alternatives.is_empty() {
        winner.alternatives = loser.alternatives.clone();
    }
    winner
}

fn merge_patterns(
    previous: &[String],
    proposed: &[String],
    policy: &MergePolicy,
    report: &mut MergeReport,
) -> Vec<String> {
    let mut kept = previous.to_vec();
    for cand in proposed {
        if best_match(kept.iter().map(String::as_str), cand, policy).is_none() {
            kept.push(cand.clone());
            report.patterns_added += 1;
        }
    }
    kept
}

fn merge_recent(
    previous: &[WorkEntry],
    proposed: &[WorkEntry],
    policy: &MergePolicy,
    report: &mut MergeReport,
) -> Vec<WorkEntry> {
    let mut out: Vec<WorkEntry> = Vec::with_capacity(policy.max_recent);
    let mut seen = std::collections::HashSet::new();

    for entry in proposed.iter().chain(previous.iter()) {
        if seen.insert(entry.dedup_key()) {
            out.push(entry.clone());
        }
    }

    let prev_keys: std::collections::HashSet<_> = previous.iter().map(WorkEntry::dedup_key).collect();
    report.recent_added = out
        .iter()
        .take(policy.max_recent)
        .filter(|e| !prev_keys.contains(&e.dedup_key()))
        .count();
    report.recent_dropped = out.len().saturating_sub(policy.max_recent);

    out.truncate(policy.max_recent);
    out
}

/// Index of the retained text with the highest overlap at or above the
/// threshold; ties go to the earliest entry.
fn best_match<'a>(
    existing: impl Iterator<Item = &'a str>,
    cand: &str,
    policy: &MergePolicy,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, text) in existing.enumerate() {
        if !overlap::is_same(text, cand, policy.metric, policy.dedup_threshold) {
            continue;
        }
        let r = overlap::ratio(text, cand, policy.metric);
        if best.map(|(_, b)| r > b).unwrap_or(true) {
            best = Some((i, r));
        }
    }
    best.map(|(i, _)| i)
}
