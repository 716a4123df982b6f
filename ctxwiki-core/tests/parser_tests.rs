// tests/parser_tests.rs
// Grammar and structural errors of the wiki parser.

use chrono::NaiveDate;

use ctxwiki_core::wiki::{parse, render, DecisionEntry, WikiDocument, WorkEntry};
use ctxwiki_core::WikiError;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

fn malformed_line(text: &str) -> usize {
    match parse(text) {
        Err(WikiError::MalformedDocument { line, .. }) => line,
        other => panic!("expected MalformedDocument, got {other:?}"),
    }
}

const FULL: &str = "# Project Context

## Decisions

- Use SQLite for state
  - Rationale: single writer, no server
  - Alternatives: Postgres; flat files
* Keep the merger pure

## Patterns

_No patterns identified yet._

## Recent Work

- [2024-05-02] Added review gate [review] [gate]
- [2024-05-01] Initial import
";

#[test]
fn empty_and_title_only_inputs_are_empty_documents() {
    assert_eq!(parse("").expect("empty"), WikiDocument::default());
    assert_eq!(parse("\n\n  \n").expect("blank"), WikiDocument::default());
    assert_eq!(parse("# Project Context\n").expect("title"), WikiDocument::default());
}

#[test]
fn parses_full_document() {
    let doc = parse(FULL).expect("parse");

    assert_eq!(
        doc.decisions,
        vec![
            DecisionEntry::new("Use SQLite for state")
                .with_rationale("single writer, no server")
                .with_alternatives(["Postgres", "flat files"]),
            DecisionEntry::new("Keep the merger pure"),
        ]
    );
    assert!(doc.patterns.is_empty(), "placeholder is not a pattern");
    assert!(doc.needs_enrichment());
    assert_eq!(doc.recent_work.len(), 2);
    assert_eq!(doc.recent_work[0].date, d(2024, 5, 2));
    assert_eq!(doc.recent_work[0].summary, "Added review gate [review] [gate]");
    assert_eq!(doc.recent_work[0].tags(), vec!["review", "gate"]);
    assert!(doc.recent_work[1].tags().is_empty());
}

#[test]
fn unlabelled_detail_folds_into_rationale() {
    let text = "## Decisions\n- Cache in memory\n  - hot path\n  - Rationale: latency\n## Patterns\n## Recent Work\n";
    let doc = parse(text).expect("parse");
    assert_eq!(doc.decisions[0].rationale.as_deref(), Some("latency"));

    let text = "## Decisions\n- Cache in memory\n  - hot path\n  - small data\n## Patterns\n## Recent Work\n";
    let doc = parse(text).expect("parse");
    assert_eq!(doc.decisions[0].rationale.as_deref(), Some("hot path; small data"));
}

#[test]
fn missing_section_is_reported_without_line() {
    let text = "## Decisions\n- a thing\n## Patterns\n";
    assert_eq!(malformed_line(text), 0);
}

#[test]
fn duplicate_section_is_reported_at_its_line() {
    let text = "## Decisions\n## Decisions\n## Patterns\n## Recent Work\n";
    assert_eq!(malformed_line(text), 2);
}

#[test]
fn out_of_order_section_is_rejected() {
    let text = "## Patterns\n## Decisions\n## Recent Work\n";
    assert_eq!(malformed_line(text), 1);
}

#[test]
fn foreign_and_nested_sections_are_rejected() {
    let foreign = "## Decisions\n## Patterns\n## Recent Work\n## Architecture\nprose\n";
    assert_eq!(malformed_line(foreign), 4);

    let nested = "## Decisions\n### Storage\n- x\n## Patterns\n## Recent Work\n";
    assert_eq!(malformed_line(nested), 2);
}

#[test]
fn title_after_content_is_rejected() {
    let text = "## Decisions\n# Project Context\n## Patterns\n## Recent Work\n";
    assert_eq!(malformed_line(text), 2);
}

#[test]
fn content_before_first_section_is_rejected() {
    assert_eq!(malformed_line("# T\nsome prose\n## Decisions\n"), 2);
}

#[test]
fn recent_work_lines_must_match_date_grammar() {
    let base = "## Decisions\n## Patterns\n## Recent Work\n";
    for bad in [
        "- 2024-05-01 no brackets",
        "- [2024-5-1] short date",
        "- [2024-13-01] month thirteen",
        "- [2024-02-30] no such day",
        "- [2024-05-01]",
        "[2024-05-01] no bullet",
    ] {
        let text = format!("{base}{bad}\n");
        assert_eq!(malformed_line(&text), 4, "should reject: {bad}");
    }
}

#[test]
fn non_item_lines_in_list_sections_are_rejected() {
    assert_eq!(malformed_line("## Decisions\nfree prose\n## Patterns\n## Recent Work\n"), 2);
    assert_eq!(malformed_line("## Decisions\n## Patterns\n-   \n## Recent Work\n"), 3);
}

#[test]
fn rendered_documents_parse_back_equal() {
    let doc = WikiDocument {
        decisions: vec![
            DecisionEntry::new("Use   JWT with\t24h expiry")
                .with_rationale("stateless")
                .with_alternatives(["sessions", "opaque tokens"]),
            DecisionEntry::new("Bcrypt cost factor 12"),
        ],
        patterns: vec!["Errors are typed with thiserror".into()],
        recent_work: vec![
            WorkEntry::from_session(d(2024, 6, 2), "Hardened auth", &["auth".to_string()]),
            WorkEntry::from_session(d(2024, 6, 1), "Tidied config", &[]),
        ],
    };

    let text = render(&doc, "Project Context");
    let back = parse(&text).expect("parse rendered");

    assert_eq!(back.decisions[0].text, "Use JWT with 24h expiry");
    assert_eq!(back.recent_work[1].summary, "Tidied config [general-changes]");
    assert_eq!(parse(&render(&back, "Project Context")).expect("reparse"), back);
}

#[test]
fn empty_document_renders_placeholders() {
    let text = render(&WikiDocument::default(), "Project Context");
    assert!(text.starts_with("# Project Context\n"));
    assert!(text.contains("_No decisions recorded yet._"));
    assert!(text.contains("_No patterns identified yet._"));
    assert!(text.contains("_No recent work yet._"));
    assert_eq!(parse(&text).expect("parse"), WikiDocument::default());
}
