// src/services/reviewer.rs
//! Review gate: structural checks on a merged wiki and its architecture document.
//!
//! Only [`Verdict::MustFix`] makes the coordinator refuse to persist.
//! `NeedsChanges` and `PassWithConcerns` are surfaced in the transcript but do
//! not block unless `commit.block_on_needs_changes` is set.

use serde::{Deserialize, Serialize};

use crate::config::WikiConfig;
use crate::wiki::overlap::{self, OverlapMetric};
use crate::wiki::parser::{self, headings};
use crate::wiki::{render, ArchitectureDocument, WikiDocument, RECENT_WORK, SECTIONS};

/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    PassWithConcerns,
    NeedsChanges,
    MustFix,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::PassWithConcerns => "pass_with_concerns",
            Verdict::NeedsChanges => "needs_changes",
            Verdict::MustFix => "must_fix",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Missing, duplicate, foreign or out-of-order section.
    Structure,
    /// Document-boundary marker or template sentinel left in the output.
    Leakage,
    RecentWorkCount,
    DateGrammar,
    /// A previous decision or pattern vanished without a superseding entry.
    Regression,
    ArchitectureShrinkage,
    ArchitectureShape,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Verdict,
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub verdict: Verdict,
    pub issues: Vec<Issue>,
}

impl Review {
    /// Whether this review forbids persisting. `strict` promotes NeedsChanges.
    pub fn blocks_commit(&self, strict: bool) -> bool {
        match self.verdict {
            Verdict::MustFix => true,
            Verdict::NeedsChanges => strict,
            _ => false,
        }
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    /// `severity: message` lines for the human-facing transcript.
    pub fn notes(&self) -> Vec<String> {
        self.issues
            .iter()
            .map(|i| format!("{}: {}", i.severity.as_str(), i.message))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ReviewPolicy {
    pub max_recent: usize,
    pub dedup_threshold: f64,
    pub metric: OverlapMetric,
    pub shrink_ratio: f64,
    pub trivial_architecture_chars: usize,
    pub boundary_markers: Vec<String>,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self::from(&WikiConfig::default())
    }
}

impl From<&WikiConfig> for ReviewPolicy {
    fn from(cfg: &WikiConfig) -> Self {
        Self {
            max_recent: cfg.max_recent.max(1),
            dedup_threshold: cfg.dedup_threshold,
            metric: cfg.overlap_metric,
            shrink_ratio: cfg.shrink_ratio,
            trivial_architecture_chars: cfg.trivial_architecture_chars,
            boundary_markers: cfg.boundary_markers.clone(),
        }
    }
}

/// Review a rendered wiki (`new_wiki`) against the previous revision.
pub fn review(
    new_wiki: &str,
    old_wiki: &WikiDocument,
    new_architecture: &str,
    old_architecture: &str,
    policy: &ReviewPolicy,
) -> Review {
    let mut issues = Vec::new();

    check_structure(new_wiki, &mut issues);
    check_leakage(new_wiki, "wiki", policy, &mut issues);
    check_leakage(new_architecture, "architecture", policy, &mut issues);
    check_dates(new_wiki, &mut issues);

    match parser::parse(new_wiki) {
        Ok(doc) => {
            check_recent_count(&doc, policy, &mut issues);
            check_regression(&doc, old_wiki, policy, &mut issues);
            check_duplicates(&doc, policy, &mut issues);
        }
        Err(e) => issues.push(Issue {
            severity: Verdict::MustFix,
            kind: IssueKind::Structure,
            message: format!("wiki does not parse: {e}"),
        }),
    }

    check_architecture(new_architecture, old_architecture, policy, &mut issues);

    let verdict = issues
        .iter()
        .map(|i| i.severity)
        .max()
        .unwrap_or(Verdict::Pass);
    Review { verdict, issues }
}

// ---------- checks ----------

fn check_structure(text: &str, issues: &mut Vec<Issue>) {
    let mut push = |message: String| {
        issues.push(Issue {
            severity: Verdict::MustFix,
            kind: IssueKind::Structure,
            message,
        })
    };

    let mut sections: Vec<String> = Vec::new();
    for h in headings(text) {
        match h.level {
            1 if h.line != first_content_line(text) => {
                push(format!("line {}: title '{}' is not the first line", h.line, h.name))
            }
            1 => {}
            2 => {
                if !SECTIONS.contains(&h.name.as_str()) {
                    push(format!("line {}: foreign top-level section '{}'", h.line, h.name));
                } else if sections.contains(&h.name) {
                    push(format!("line {}: duplicate section '{}'", h.line, h.name));
                } else {
                    sections.push(h.name);
                }
            }
            _ => push(format!("line {}: nested heading '{}'", h.line, h.name)),
        }
    }

    for required in SECTIONS {
        if !sections.iter().any(|s| s == required) {
            push(format!("missing required section '{required}'"));
        }
    }
    let expected: Vec<&str> = SECTIONS
        .iter()
        .copied()
        .filter(|s| sections.iter().any(|x| x == s))
        .collect();
    if sections.iter().map(String::as_str).ne(expected.iter().copied()) {
        push(format!(
            "sections out of order: found [{}], expected [{}]",
            sections.join(", "),
            SECTIONS.join(", ")
        ));
    }
}

/// Markers are line-anchored: mid-sentence mentions (a `>>>` prompt in a decision) are content.
fn opens_with_marker(line: &str, marker: &str) -> bool {
    let marker = marker.trim();
    !marker.is_empty() && line.trim_start().starts_with(marker)
}

fn check_leakage(text: &str, what: &str, policy: &ReviewPolicy, issues: &mut Vec<Issue>) {
    for (i, line) in text.lines().enumerate() {
        if let Some(marker) = policy
            .boundary_markers
            .iter()
            .find(|m| opens_with_marker(line, m))
        {
            issues.push(Issue {
                severity: Verdict::MustFix,
                kind: IssueKind::Leakage,
                message: format!("{what} line {}: leaked boundary marker '{marker}'", i + 1),
            });
        }
    }

    if what != "wiki" {
        return;
    }
    // A template placeholder next to real entries means the template was echoed.
    for (name, body) in section_bodies(text) {
        let items = body.iter().filter(|(_, l)| is_item(l)).count();
        if items == 0 {
            continue;
        }
        for (line_no, l) in body.iter().filter(|(_, l)| render::is_placeholder(l.trim())) {
            issues.push(Issue {
                severity: Verdict::MustFix,
                kind: IssueKind::Leakage,
                message: format!(
                    "wiki line {line_no}: placeholder '{}' left in non-empty section '{name}'",
                    l.trim()
                ),
            });
        }
    }
}

fn check_dates(text: &str, issues: &mut Vec<Issue>) {
    let Some((_, body)) = section_bodies(text).into_iter().find(|(n, _)| n == RECENT_WORK) else {
        return;
    };
    for (line_no, line) in body {
        let t = line.trim();
        if t.is_empty() || render::is_placeholder(t) {
            continue;
        }
        if let Err(e) = parser::parse_work_line(line, line_no) {
            issues.push(Issue {
                severity: Verdict::MustFix,
                kind: IssueKind::DateGrammar,
                message: e.to_string(),
            });
        }
    }
}

fn check_recent_count(doc: &WikiDocument, policy: &ReviewPolicy, issues: &mut Vec<Issue>) {
    let n = doc.recent_work.len();
    if n == 0 || n > policy.max_recent {
        issues.push(Issue {
            severity: Verdict::MustFix,
            kind: IssueKind::RecentWorkCount,
            message: format!(
                "recent work has {n} entries, expected between 1 and {}",
                policy.max_recent
            ),
        });
    }
}

fn check_regression(
    new: &WikiDocument,
    old: &WikiDocument,
    policy: &ReviewPolicy,
    issues: &mut Vec<Issue>,
) {
    for d in old.decision_texts() {
        let represented = new.decision_texts().any(|n| {
            n == d
                || (overlap::is_same(d, n, policy.metric, policy.dedup_threshold)
                    && overlap::distinct_words(n) > overlap::distinct_words(d))
        });
        if !represented {
            issues.push(Issue {
                severity: Verdict::NeedsChanges,
                kind: IssueKind::Regression,
                message: format!("decision dropped without replacement: '{d}'"),
            });
        }
    }

    for p in &old.patterns {
        let represented = new
            .patterns
            .iter()
            .any(|n| n == p || overlap::is_same(p, n, policy.metric, policy.dedup_threshold));
        if !represented {
            issues.push(Issue {
                severity: Verdict::NeedsChanges,
                kind: IssueKind::Regression,
                message: format!("pattern dropped: '{p}'"),
            });
        }
    }
}

fn check_duplicates(doc: &WikiDocument, policy: &ReviewPolicy, issues: &mut Vec<Issue>) {
    let texts: Vec<&str> = doc.decision_texts().collect();
    for (i, a) in texts.iter().enumerate() {
        for b in &texts[i + 1..] {
            if overlap::is_same(a, b, policy.metric, policy.dedup_threshold) {
                issues.push(Issue {
                    severity: Verdict::PassWithConcerns,
                    kind: IssueKind::Duplicate,
                    message: format!("near-duplicate decisions: '{a}' / '{b}'"),
                });
            }
        }
    }
}

fn check_architecture(new: &str, old: &str, policy: &ReviewPolicy, issues: &mut Vec<Issue>) {
    let new_doc = ArchitectureDocument::new(new);
    let old_doc = ArchitectureDocument::new(old);
    let (new_len, old_len) = (new_doc.len(), old_doc.len());

    if old_len >= policy.trivial_architecture_chars
        && (new_len as f64) < policy.shrink_ratio * old_len as f64
    {
        issues.push(Issue {
            severity: Verdict::NeedsChanges,
            kind: IssueKind::ArchitectureShrinkage,
            message: format!(
                "architecture shrank to {}% of previous length ({new_len} of {old_len} chars)",
                new_len * 100 / old_len
            ),
        });
    }

    if new_doc.needs_enrichment() {
        let message = if old_doc.needs_enrichment() {
            "architecture overview is still empty"
        } else {
            "architecture overview was emptied"
        };
        issues.push(Issue {
            severity: Verdict::PassWithConcerns,
            kind: IssueKind::ArchitectureShape,
            message: message.into(),
        });
        return;
    }

    let sentences = new_doc.sentence_count();
    if !(4..=8).contains(&sentences) {
        issues.push(Issue {
            severity: Verdict::PassWithConcerns,
            kind: IssueKind::ArchitectureShape,
            message: format!("architecture has {sentences} sentences, expected 4-8"),
        });
    }
    if !headings(new).is_empty() {
        issues.push(Issue {
            severity: Verdict::PassWithConcerns,
            kind: IssueKind::ArchitectureShape,
            message: "architecture should be prose, found markdown headings".into(),
        });
    }
}

// ---------- helpers ----------

fn first_content_line(text: &str) -> usize {
    text.lines()
        .position(|l| !l.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// `(section name, [(line_no, line)])` for each `##` section.
fn section_bodies(text: &str) -> Vec<(String, Vec<(usize, &str)>)> {
    let mut out: Vec<(String, Vec<(usize, &str)>)> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let t = line.trim_end();
        if let Some(name) = t.strip_prefix("## ") {
            out.push((name.trim().to_string(), Vec::new()));
        } else if t.starts_with('#') && t.trim_start_matches('#').starts_with(' ') {
            continue;
        } else if let Some((_, body)) = out.last_mut() {
            body.push((i + 1, line));
        }
    }
    out
}

fn is_item(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("- ") || t.starts_with("* ")
}
