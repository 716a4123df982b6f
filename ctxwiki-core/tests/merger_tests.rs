// tests/merger_tests.rs
// Merge rules, the overlap boundary, and the re-merge properties.

use chrono::NaiveDate;

use ctxwiki_core::services::merger::{merge, merge_text, merge_with_report, MergePolicy};
use ctxwiki_core::wiki::overlap::{self, OverlapMetric};
use ctxwiki_core::wiki::{parse, render, DecisionEntry, WikiDocument, WorkEntry};
use ctxwiki_core::WikiError;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).expect("valid date")
}

fn decisions(texts: &[&str]) -> WikiDocument {
    WikiDocument {
        decisions: texts.iter().map(|t| DecisionEntry::new(*t)).collect(),
        ..Default::default()
    }
}

fn texts(doc: &WikiDocument) -> Vec<&str> {
    doc.decision_texts().collect()
}

/// `n` distinct letter-only words with a shared prefix (no stop words, no digits).
fn words(prefix: &str, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let a = (b'a' + (i / 26) as u8) as char;
            let b = (b'a' + (i % 26) as u8) as char;
            format!("{prefix}{a}{b}")
        })
        .collect()
}

/// Every previous decision survives verbatim or through a more detailed near-duplicate.
fn assert_non_regression(previous: &WikiDocument, merged: &WikiDocument, policy: &MergePolicy) {
    for old in previous.decision_texts() {
        let kept = merged.decision_texts().any(|new| {
            new == old
                || (overlap::is_same(old, new, policy.metric, policy.dedup_threshold)
                    && overlap::distinct_words(new) > overlap::distinct_words(old))
        });
        assert!(kept, "decision regressed: {old:?} -> {:?}", texts(merged));
    }
}

#[test]
fn jwt_scenario_supersedes_and_appends() {
    let policy = MergePolicy::default();
    let previous = decisions(&["Use JWT with 24h expiry (security vs UX)"]);
    let proposed = decisions(&[
        "Use JWT tokens with 24-hour expiry for balance of security and UX",
        "Bcrypt cost factor 12 per OWASP",
    ]);

    let (merged, report) = merge_with_report(&previous, &proposed, &policy);

    assert_eq!(
        texts(&merged),
        vec![
            "Use JWT tokens with 24-hour expiry for balance of security and UX",
            "Bcrypt cost factor 12 per OWASP",
        ]
    );
    assert_eq!(report.decisions_superseded.len(), 1);
    assert_eq!(report.decisions_superseded[0].old, "Use JWT with 24h expiry (security vs UX)");
    assert_eq!(report.decisions_added, 1);
    assert_non_regression(&previous, &merged, &policy);
}

#[test]
fn jaccard_metric_keeps_both_jwt_phrasings() {
    let policy = MergePolicy {
        metric: OverlapMetric::Jaccard,
        ..MergePolicy::default()
    };
    let previous = decisions(&["Use JWT with 24h expiry (security vs UX)"]);
    let proposed = decisions(&["Use JWT tokens with 24-hour expiry for balance of security and UX"]);

    assert_eq!(merge(&previous, &proposed, &policy).decisions.len(), 2);
}

#[test]
fn equally_detailed_near_duplicate_keeps_existing_text() {
    let policy = MergePolicy::default();
    let previous = decisions(&["Use regex for parsing wiki sections"]);
    let proposed = decisions(&["Use regex to parse wiki sections"]);

    let (merged, report) = merge_with_report(&previous, &proposed, &policy);
    assert_eq!(texts(&merged), vec!["Use regex for parsing wiki sections"]);
    assert_eq!(report.decisions_duplicate, 1);
}

#[test]
fn threshold_is_inclusive_at_exactly_080() {
    let policy = MergePolicy::default();

    // 4 of 5 words shared
    let a = "alpha bravo charlie delta echo";
    let b = "alpha bravo charlie delta foxtrot";
    assert!((overlap::ratio(a, b, OverlapMetric::Containment) - 0.80).abs() < 1e-12);
    assert_eq!(merge(&decisions(&[a]), &decisions(&[b]), &policy).decisions.len(), 1);

    // 80 of 100 words shared
    let base = words("q", 100);
    let mut other: Vec<String> = base[..80].to_vec();
    other.extend(words("x", 20));
    let (a, b) = (base.join(" "), other.join(" "));
    assert!((overlap::ratio(&a, &b, OverlapMetric::Containment) - 0.80).abs() < 1e-12);
    let merged = merge(&decisions(&[&a]), &decisions(&[&b]), &policy);
    assert_eq!(texts(&merged), vec![a.as_str()]);
}

#[test]
fn just_below_threshold_keeps_entries_distinct() {
    let policy = MergePolicy::default();
    let base = words("q", 100);
    let mut other: Vec<String> = base[..79].to_vec();
    other.extend(words("x", 21));
    let (a, b) = (base.join(" "), other.join(" "));
    assert!((overlap::ratio(&a, &b, OverlapMetric::Containment) - 0.79).abs() < 1e-12);

    let merged = merge(&decisions(&[&a]), &decisions(&[&b]), &policy);
    assert_eq!(texts(&merged), vec![a.as_str(), b.as_str()]);
}

#[test]
fn tokenizer_splits_digit_runs_and_drops_stop_words() {
    let t = overlap::tokens("Use JWT with 24h expiry (security vs UX)");
    let got: Vec<&str> = t.iter().map(String::as_str).collect();
    assert_eq!(got, vec!["24", "expiry", "h", "jwt", "security", "use", "ux"]);
    assert_eq!(overlap::ratio("the", "the", OverlapMetric::Containment), 1.0);
    assert_eq!(overlap::ratio("the", "a", OverlapMetric::Containment), 0.0);
}

#[test]
fn drifted_chain_is_kept_as_a_new_decision() {
    let policy = MergePolicy::default();
    let original = "alpha bravo charlie delta echo";
    let wider = "alpha bravo charlie delta echo foxtrot golf hotel india juliet";
    let drifted = "charlie delta echo foxtrot golf hotel india juliet kilo lima mike";
    assert!(overlap::is_same(wider, drifted, policy.metric, policy.dedup_threshold));
    assert!(!overlap::is_same(original, drifted, policy.metric, policy.dedup_threshold));

    let previous = decisions(&[original]);
    let (merged, report) = merge_with_report(&previous, &decisions(&[wider, drifted]), &policy);

    // the slot still stands for the original; the drifted phrasing is not lost
    assert_eq!(texts(&merged), vec![wider, drifted]);
    assert_eq!(report.decisions_superseded.len(), 1);
    assert_eq!(report.decisions_added, 1);
    assert_eq!(report.decisions_duplicate, 0);
    assert_non_regression(&previous, &merged, &policy);

    // re-applying the same proposal settles
    let again = merge(&merged, &decisions(&[wider, drifted]), &policy);
    assert_eq!(texts(&again), vec![wider, drifted]);
}

#[test]
fn superseding_decision_inherits_missing_rationale() {
    let policy = MergePolicy::default();
    let previous = WikiDocument {
        decisions: vec![DecisionEntry::new("Use SQLite for local state")
            .with_rationale("single writer")
            .with_alternatives(["Postgres"])],
        ..Default::default()
    };
    let proposed = decisions(&["Use SQLite in WAL mode for local state storage"]);

    let merged = merge(&previous, &proposed, &policy);
    assert_eq!(merged.decisions.len(), 1);
    let only = &merged.decisions[0];
    assert_eq!(only.text, "Use SQLite in WAL mode for local state storage");
    assert_eq!(only.rationale.as_deref(), Some("single writer"));
    assert_eq!(only.alternatives, vec!["Postgres".to_string()]);
}

#[test]
fn patterns_are_a_union_in_first_seen_order() {
    let policy = MergePolicy::default();
    let previous = WikiDocument {
        patterns: vec!["Errors use thiserror".into(), "Writes are atomic".into()],
        ..Default::default()
    };
    let proposed = WikiDocument {
        patterns: vec!["Errors use thiserror enums".into(), "Tests live under tests/".into()],
        ..Default::default()
    };

    let (merged, report) = merge_with_report(&previous, &proposed, &policy);
    assert_eq!(
        merged.patterns,
        vec!["Errors use thiserror", "Writes are atomic", "Tests live under tests/"]
    );
    assert_eq!(report.patterns_added, 1);

    // nothing proposed: nothing removed
    assert_eq!(merge(&previous, &WikiDocument::default(), &policy).patterns, previous.patterns);
}

#[test]
fn recent_work_keeps_five_newest_first() {
    let policy = MergePolicy::default();
    let previous = WikiDocument {
        recent_work: (1..=5).rev().map(|i| WorkEntry::new(d(i), format!("day {i}"))).collect(),
        ..Default::default()
    };
    let proposed = WikiDocument {
        recent_work: vec![WorkEntry::new(d(6), "day 6")],
        ..Default::default()
    };

    let (merged, report) = merge_with_report(&previous, &proposed, &policy);
    let days: Vec<u32> = merged.recent_work.iter().map(|w| chrono::Datelike::day(&w.date)).collect();
    assert_eq!(days, vec![6, 5, 4, 3, 2]);
    assert_eq!(report.recent_added, 1);
    assert_eq!(report.recent_dropped, 1);
}

#[test]
fn recent_work_bound_holds_for_varied_inputs() {
    let policy = MergePolicy::default();
    let entries = |n: u32, tag: &str| -> Vec<WorkEntry> {
        (1..=n).rev().map(|i| WorkEntry::new(d(i), format!("{tag} {i}"))).collect()
    };

    for (prev_n, prop_n) in [(0, 1), (1, 0), (3, 3), (0, 7), (5, 5)] {
        let previous = WikiDocument { recent_work: entries(prev_n, "prev"), ..Default::default() };
        let proposed = WikiDocument { recent_work: entries(prop_n, "prop"), ..Default::default() };
        let merged = merge(&previous, &proposed, &policy);

        assert!((1..=5).contains(&merged.recent_work.len()), "{prev_n}/{prop_n}");
        if let Some(first) = proposed.recent_work.first() {
            assert_eq!(&merged.recent_work[0], first);
        }
    }
}

#[test]
fn re_merging_the_same_proposal_is_idempotent() {
    let policy = MergePolicy::default();
    let previous = WikiDocument {
        decisions: vec![
            DecisionEntry::new("Use JWT with 24h expiry (security vs UX)"),
            DecisionEntry::new("Store sessions in Redis").with_rationale("shared across nodes"),
        ],
        patterns: vec!["Handlers return typed errors".into()],
        recent_work: (1..=4).rev().map(|i| WorkEntry::new(d(i), format!("work {i}"))).collect(),
    };
    let proposed = WikiDocument {
        decisions: vec![
            DecisionEntry::new("Use JWT tokens with 24-hour expiry for balance of security and UX"),
            DecisionEntry::new("Bcrypt cost factor 12 per OWASP"),
        ],
        patterns: vec!["Config is layered TOML".into()],
        recent_work: vec![
            WorkEntry::new(d(9), "Auth hardening [auth]"),
            WorkEntry::new(d(8), "Password hashing [auth]"),
        ],
    };

    let once = merge(&previous, &proposed, &policy);
    let reparsed = parse(&render(&once, "Project Context")).expect("reparse");
    assert_eq!(reparsed, once);

    let twice = merge(&reparsed, &proposed, &policy);
    assert_eq!(twice, once);
    assert_non_regression(&previous, &once, &policy);
}

#[test]
fn merge_text_fails_only_on_unparseable_input() {
    let policy = MergePolicy::default();
    let ok = merge_text("", "## Decisions\n- A\n## Patterns\n## Recent Work\n- [2024-01-01] start\n", &policy)
        .expect("merge");
    assert_eq!(ok.decisions.len(), 1);

    let err = merge_text("", "## Decisions\n## Patterns\n## Recent Work\n- [2024-1-1] bad\n", &policy)
        .expect_err("bad date");
    assert!(matches!(err, WikiError::MalformedDocument { line: 4, .. }));
}
