// src/wiki/render.rs
//! [`WikiDocument`] -> markdown. Output always re-parses to an equal document.

use crate::wiki::{WikiDocument, DECISIONS, PATTERNS, RECENT_WORK};

pub const NO_DECISIONS: &str = "_No decisions recorded yet._";
pub const NO_PATTERNS: &str = "_No patterns identified yet._";
pub const NO_RECENT_WORK: &str = "_No recent work yet._";
pub const NO_ARCHITECTURE: &str = "_No architecture overview yet._";

/// A whole-line italic note such as `_No decisions recorded yet._`.
pub fn is_placeholder(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('_') && line.ends_with('_')
}

pub fn render(doc: &WikiDocument, title: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {title}\n\n"));

    out.push_str(&format!("## {DECISIONS}\n\n"));
    if doc.decisions.is_empty() {
        out.push_str(NO_DECISIONS);
        out.push('\n');
    }
    for d in &doc.decisions {
        out.push_str(&format!("- {}\n", one_line(&d.text)));
        if let Some(r) = &d.rationale {
            out.push_str(&format!("  - Rationale: {}\n", one_line(r)));
        }
        if !d.alternatives.is_empty() {
            let alts = d
                .alternatives
                .iter()
                .map(|a| one_line(a))
                .collect::<Vec<_>>()
                .join("; ");
            out.push_str(&format!("  - Alternatives: {alts}\n"));
        }
    }

    out.push_str(&format!("\n## {PATTERNS}\n\n"));
    if doc.patterns.is_empty() {
        out.push_str(NO_PATTERNS);
        out.push('\n');
    }
    for p in &doc.patterns {
        out.push_str(&format!("- {}\n", one_line(p)));
    }

    out.push_str(&format!("\n## {RECENT_WORK}\n\n"));
    if doc.recent_work.is_empty() {
        out.push_str(NO_RECENT_WORK);
        out.push('\n');
    }
    for w in &doc.recent_work {
        out.push_str(&format!(
            "- [{}] {}\n",
            w.date.format("%Y-%m-%d"),
            one_line(&w.summary)
        ));
    }
    out
}

/// Architecture prose as persisted: trimmed body plus trailing newline.
pub fn render_architecture(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("{NO_ARCHITECTURE}\n")
    } else {
        format!("{body}\n")
    }
}

/// Collapse internal whitespace; list items are single-line.
pub(crate) fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
