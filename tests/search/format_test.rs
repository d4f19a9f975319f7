//! Tests for search result formatting and content attachment.

use conclave::search::{attach_content, format_hits, SearchHit};

fn hit(index: usize, title: &str) -> SearchHit {
    SearchHit {
        index,
        title: title.to_owned(),
        url: format!("https://example.com/{index}"),
        source: None,
        summary: "a short summary".to_owned(),
        content: None,
    }
}

#[test]
fn empty_hits_report_no_results() {
    assert_eq!(format_hits(&[]), "No web search results found.");
}

#[test]
fn summary_used_when_no_content() {
    let formatted = format_hits(&[hit(1, "First")]);
    assert_eq!(
        formatted,
        "Result 1:\nTitle: First\nURL: https://example.com/1\nSummary: a short summary"
    );
}

#[test]
fn source_line_appears_when_present() {
    let mut h = hit(1, "First");
    h.source = Some("Example Times".to_owned());
    let formatted = format_hits(&[h]);
    assert!(formatted.contains("\nSource: Example Times\n"));
}

#[test]
fn content_replaces_summary_when_present() {
    let mut h = hit(1, "First");
    h.content = Some("x".repeat(600));
    let formatted = format_hits(&[h]);
    assert!(formatted.contains("Content:\n"));
    assert!(!formatted.contains("Summary:"));
}

#[test]
fn hits_are_joined_with_blank_lines() {
    let formatted = format_hits(&[hit(1, "First"), hit(2, "Second")]);
    assert!(formatted.contains("Summary: a short summary\n\nResult 2:"));
}

#[test]
fn long_content_is_clipped_with_ellipsis() {
    let mut h = hit(1, "First");
    h.content = Some("y".repeat(2500));
    let formatted = format_hits(&[h]);
    assert!(formatted.contains(&format!("{}...", "y".repeat(2000))));
    assert!(!formatted.contains(&"y".repeat(2001)));
}

#[test]
fn short_enriched_content_keeps_original_summary() {
    let mut h = hit(1, "First");
    attach_content(&mut h, "paywall stub".to_owned());
    let content = h.content.expect("content should be attached");
    assert!(content.starts_with("paywall stub"));
    assert!(content.contains(
        "[System Note: Full content fetch yielded limited text. Appending original summary.]"
    ));
    assert!(content.ends_with("Original Summary: a short summary"));
}

#[test]
fn long_enriched_content_is_attached_verbatim() {
    let mut h = hit(1, "First");
    let body = "z".repeat(600);
    attach_content(&mut h, body.clone());
    assert_eq!(h.content.as_deref(), Some(body.as_str()));
}
