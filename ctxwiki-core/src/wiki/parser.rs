// src/wiki/parser.rs
//! Markdown -> [`WikiDocument`].
//!
//! Grammar:
//! ```text
//! # <title>                      (optional, first non-blank line)
//! ## Decisions
//! - <text>
//!   - Rationale: <text>          (optional)
//!   - Alternatives: <a>; <b>     (optional)
//! ## Patterns
//! - <text>
//! ## Recent Work
//! - [YYYY-MM-DD] <text with [tag] tokens>
//! ```
//! `*` bullets are accepted wherever `-` is. Whole-line `_..._` placeholders and
//! blank lines are skipped. Empty or title-only input is a valid empty document;
//! once any `##` header is present, all three sections are required.
//!
//! The parser is structural only. Dedup and length bounds belong to the merger
//! and the reviewer.

use chrono::NaiveDate;

use crate::error::{WikiError, WikiResult};
use crate::wiki::{render, DecisionEntry, WikiDocument, WorkEntry, DECISIONS, PATTERNS, RECENT_WORK, SECTIONS};

/// A markdown ATX heading found in raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub line: usize,
    pub level: usize,
    pub name: String,
}

/// All `#`..`######` headings, 1-based line numbers.
pub fn headings(text: &str) -> Vec<Heading> {
    text.lines()
        .enumerate()
        .filter_map(|(i, l)| heading(l).map(|(level, name)| Heading {
            line: i + 1,
            level,
            name: name.to_string(),
        }))
        .collect()
}

pub fn parse(text: &str) -> WikiResult<WikiDocument> {
    let mut doc = WikiDocument::default();
    let mut seen: Vec<&'static str> = Vec::new();
    let mut current: Option<&'static str> = None;
    let mut saw_content = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if let Some((level, name)) = heading(line) {
            match level {
                1 => {
                    if saw_content {
                        return Err(WikiError::malformed(
                            line_no,
                            format!("title '{name}' must be the first line"),
                        ));
                    }
                    saw_content = true;
                }
                2 => {
                    saw_content = true;
                    let section = SECTIONS
                        .iter()
                        .copied()
                        .find(|s| *s == name)
                        .ok_or_else(|| {
                            WikiError::malformed(line_no, format!("unexpected section '{name}'"))
                        })?;
                    if seen.contains(&section) {
                        return Err(WikiError::malformed(
                            line_no,
                            format!("duplicate section '{section}'"),
                        ));
                    }
                    let expected = SECTIONS[seen.len()];
                    if section != expected {
                        return Err(WikiError::malformed(
                            line_no,
                            format!("section '{section}' out of order (expected '{expected}')"),
                        ));
                    }
                    seen.push(section);
                    current = Some(section);
                }
                _ => {
                    return Err(WikiError::malformed(
                        line_no,
                        format!("unexpected nested heading '{name}'"),
                    ));
                }
            }
            continue;
        }

        saw_content = true;
        if render::is_placeholder(line.trim()) {
            continue;
        }

        let Some(section) = current else {
            return Err(WikiError::malformed(
                line_no,
                "content before the first section",
            ));
        };

        match section {
            DECISIONS => parse_decision_line(&mut doc, line, line_no)?,
            PATTERNS => {
                let item = top_level_item(line)
                    .ok_or_else(|| WikiError::malformed(line_no, "expected a '- ' pattern item"))?;
                doc.patterns.push(render::one_line(non_empty(item, line_no)?));
            }
            RECENT_WORK => doc.recent_work.push(parse_work_line(line, line_no)?),
            _ => unreachable!("section names come from SECTIONS"),
        }
    }

    if !seen.is_empty() {
        if let Some(missing) = SECTIONS.iter().find(|s| !seen.contains(s)) {
            return Err(WikiError::malformed(
                0,
                format!("missing required section '{missing}'"),
            ));
        }
    }

    Ok(doc)
}

/// Parse one Recent Work line: `- [YYYY-MM-DD] <text>`.
pub fn parse_work_line(line: &str, line_no: usize) -> WikiResult<WorkEntry> {
    let bad = || {
        WikiError::malformed(
            line_no,
            format!("recent work entry '{}' does not match '- [YYYY-MM-DD] <text>'", line.trim()),
        )
    };
    let item = top_level_item(line).ok_or_else(bad)?;
    let rest = item.strip_prefix('[').ok_or_else(bad)?;
    let (date_str, summary) = rest.split_once(']').ok_or_else(bad)?;
    let date = parse_date(date_str).ok_or_else(bad)?;
    let summary = render::one_line(summary);
    if summary.is_empty() {
        return Err(bad());
    }
    Ok(WorkEntry::new(date, summary))
}

/// Strict `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    let shaped = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

// ---------- helpers ----------

fn parse_decision_line(doc: &mut WikiDocument, line: &str, line_no: usize) -> WikiResult<()> {
    if let Some(item) = top_level_item(line) {
        doc.decisions
            .push(DecisionEntry::new(render::one_line(non_empty(item, line_no)?)));
        return Ok(());
    }

    let detail = sub_item(line)
        .ok_or_else(|| WikiError::malformed(line_no, "expected a '- ' decision item"))?;
    let entry = doc
        .decisions
        .last_mut()
        .ok_or_else(|| WikiError::malformed(line_no, "decision detail without a decision"))?;
    let detail = render::one_line(non_empty(detail, line_no)?);
    let detail = detail.as_str();

    if let Some(v) = strip_label(detail, "rationale") {
        entry.rationale = Some(v.to_string());
    } else if let Some(v) = strip_label(detail, "alternatives") {
        entry.alternatives = v
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    } else {
        // Unlabelled detail folds into the rationale.
        entry.rationale = Some(match entry.rationale.take() {
            Some(prev) => format!("{prev}; {detail}"),
            None => detail.to_string(),
        });
    }
    Ok(())
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim()))
}

fn top_level_item(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim)
}

fn sub_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.len() == line.len() {
        return None;
    }
    top_level_item(trimmed)
}

fn strip_label<'a>(detail: &'a str, label: &str) -> Option<&'a str> {
    let (head, tail) = detail.split_once(':')?;
    head.trim().eq_ignore_ascii_case(label).then(|| tail.trim())
}

fn non_empty(item: &str, line_no: usize) -> WikiResult<&str> {
    if item.is_empty() {
        Err(WikiError::malformed(line_no, "empty list item"))
    } else {
        Ok(item)
    }
}
