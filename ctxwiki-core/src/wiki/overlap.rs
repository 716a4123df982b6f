// src/wiki/overlap.rs
//! Token-overlap ratio used for near-duplicate detection of decisions and patterns.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Denominator used for the overlap ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMetric {
    /// shared ÷ distinct words of the smaller set (default)
    #[default]
    Containment,
    /// shared ÷ union of distinct words
    Jaccard,
}

impl OverlapMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapMetric::Containment => "containment",
            OverlapMetric::Jaccard => "jaccard",
        }
    }
}

static STOP: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "and", "or", "of", "to", "in", "on", "at", "by", "as", "is", "be",
        "for", "with", "vs", "via", "that", "this", "from", "into", "than", "then", "it", "its",
    ]
    .into_iter()
    .collect()
});

/// Distinct normalized words of `text`.
///
/// Lowercases, splits on non-alphanumerics, splits digit/letter runs
/// (`24h` -> `24`, `h`) and drops stop words.
pub fn tokens(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        for piece in split_digit_runs(&raw.to_lowercase()) {
            if !STOP.contains(piece.as_str()) {
                out.insert(piece);
            }
        }
    }
    out
}

/// Number of distinct normalized words; used to pick the more detailed phrasing.
pub fn distinct_words(text: &str) -> usize {
    tokens(text).len()
}

/// Overlap ratio in `[0, 1]`.
///
/// Two texts without any content words compare equal (1.0) only when their
/// trimmed, lowercased forms are identical.
pub fn ratio(a: &str, b: &str, metric: OverlapMetric) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        let same = a.trim().to_lowercase() == b.trim().to_lowercase();
        return if same { 1.0 } else { 0.0 };
    }
    let shared = ta.intersection(&tb).count();
    let denom = match metric {
        OverlapMetric::Containment => ta.len().min(tb.len()),
        OverlapMetric::Jaccard => ta.union(&tb).count(),
    };
    shared as f64 / denom as f64
}

/// Inclusive threshold test: exactly `threshold` counts as the same entry.
pub fn is_same(a: &str, b: &str, metric: OverlapMetric, threshold: f64) -> bool {
    ratio(a, b, metric) + 1e-9 >= threshold
}

fn split_digit_runs(word: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_digit: Option<bool> = None;
    for c in word.chars() {
        let d = c.is_ascii_digit();
        if cur_digit.is_some_and(|prev| prev != d) {
            out.push(std::mem::take(&mut cur));
        }
        cur.push(c);
        cur_digit = Some(d);
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

