// src/wiki/mod.rs
//! Typed wiki model.
//!
//! A wiki document has exactly three sections, always in this order:
//! Decisions, Patterns, Recent Work. Architecture prose is a separate
//! document and is never embedded in the wiki.
//!
//! All merge and review logic runs on these types; raw markdown only crosses
//! the boundary through [`parser::parse`] and [`render::render`].

pub mod overlap;
pub mod parser;
pub mod render;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use parser::parse;
pub use render::render;

pub const DECISIONS: &str = "Decisions";
pub const PATTERNS: &str = "Patterns";
pub const RECENT_WORK: &str = "Recent Work";

/// Required `##` sections, in their fixed order.
pub const SECTIONS: [&str; 3] = [DECISIONS, PATTERNS, RECENT_WORK];

/// Topic tag used when a session has no detected topic.
pub const FALLBACK_TOPIC: &str = "general-changes";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiDocument {
    pub decisions: Vec<DecisionEntry>,
    pub patterns: Vec<String>,
    /// Newest first.
    pub recent_work: Vec<WorkEntry>,
}

impl WikiDocument {
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty() && self.patterns.is_empty() && self.recent_work.is_empty()
    }

    /// True when the patterns section still needs content from the summarizer.
    /// Decisions and recent work are filled on every session.
    pub fn needs_enrichment(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn decision_texts(&self) -> impl Iterator<Item = &str> {
        self.decisions.iter().map(|d| d.text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

impl DecisionEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rationale: None,
            alternatives: vec![],
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }
}

/// One line of the rolling log: `- [YYYY-MM-DD] summary [tag] [tag]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkEntry {
    pub date: NaiveDate,
    /// Free text after the date, inline `[tag]` tokens included.
    pub summary: String,
}

impl WorkEntry {
    pub fn new(date: NaiveDate, summary: impl Into<String>) -> Self {
        Self {
            date,
            summary: summary.into(),
        }
    }

    /// Build an entry from a session summary and its detected topics.
    pub fn from_session(date: NaiveDate, summary: &str, topics: &[String]) -> Self {
        let tags = if topics.is_empty() {
            format!("[{FALLBACK_TOPIC}]")
        } else {
            topics
                .iter()
                .map(|t| format!("[{}]", t.trim()))
                .collect::<Vec<_>>()
                .join(" ")
        };
        Self::new(date, format!("{} {}", summary.trim(), tags))
    }

    /// Inline `[tag]` tokens of the summary, in order of appearance.
    pub fn tags(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut rest = self.summary.as_str();
        while let Some(open) = rest.find('[') {
            let after = &rest[open + 1..];
            match after.find(']') {
                Some(close) => {
                    let tag = after[..close].trim();
                    if !tag.is_empty() && !tag.contains('[') {
                        out.push(tag);
                    }
                    rest = &after[close + 1..];
                }
                None => break,
            }
        }
        out
    }

    /// Identity used for de-duplication: date plus whitespace-normalized summary.
    pub(crate) fn dedup_key(&self) -> (NaiveDate, String) {
        let norm = self
            .summary
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        (self.date, norm)
    }
}

/// Free-text structural overview, persisted next to the wiki.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureDocument {
    pub body: String,
}

impl ArchitectureDocument {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Trimmed prose length in characters.
    pub fn len(&self) -> usize {
        self.body.trim().chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }

    /// Rough sentence count (terminal `.`, `!` or `?` followed by whitespace or end).
    pub fn sentence_count(&self) -> usize {
        let text = self.body.trim();
        let chars: Vec<char> = text.chars().collect();
        let mut count = 0;
        for (i, c) in chars.iter().enumerate() {
            if matches!(c, '.' | '!' | '?') {
                let at_end = i + 1 == chars.len();
                if at_end || chars[i + 1].is_whitespace() {
                    count += 1;
                }
            }
        }
        if count == 0 && !text.is_empty() {
            1
        } else {
            count
        }
    }

    /// Blank or still the `_No ... yet._` placeholder.
    pub fn needs_enrichment(&self) -> bool {
        let t = self.body.trim();
        t.is_empty() || render::is_placeholder(t)
    }
}
