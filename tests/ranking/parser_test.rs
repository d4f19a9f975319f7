//! Tests for the free-form ranking parser.

use conclave::ranking::parse_ranking;

#[test]
fn parses_canonical_ranking() {
    let text = "Response A is thorough.\nResponse B is shallow.\n\nFINAL RANKING:\n1. Response A\n2. Response C\n3. Response B";
    assert_eq!(
        parse_ranking(text),
        vec!["Response A", "Response C", "Response B"]
    );
}

#[test]
fn sentinel_limits_region_to_suffix() {
    // Labels discussed before the sentinel must not leak into the result.
    let text = "I liked Response C best, then Response A.\nFINAL RANKING:\n1. Response B\n2. Response A";
    assert_eq!(parse_ranking(text), vec!["Response B", "Response A"]);
}

#[test]
fn numbered_entries_tolerate_spacing_variants() {
    let text = "FINAL RANKING:\n1.Response B\n2.   Response A";
    assert_eq!(parse_ranking(text), vec!["Response B", "Response A"]);
}

#[test]
fn bare_labels_used_when_no_numbered_list() {
    let text = "FINAL RANKING:\nbest is Response C, then Response A, worst Response B";
    assert_eq!(
        parse_ranking(text),
        vec!["Response C", "Response A", "Response B"]
    );
}

#[test]
fn whole_text_scanned_without_sentinel() {
    let text = "I would put Response B ahead of Response A.";
    assert_eq!(parse_ranking(text), vec!["Response B", "Response A"]);
}

#[test]
fn unparsable_text_yields_empty() {
    assert_eq!(parse_ranking("I refuse to rank."), Vec::<String>::new());
    assert_eq!(parse_ranking(""), Vec::<String>::new());
}

#[test]
fn duplicates_are_preserved() {
    let text = "FINAL RANKING:\n1. Response A\n2. Response A\n3. Response B";
    assert_eq!(
        parse_ranking(text),
        vec!["Response A", "Response A", "Response B"]
    );
}

#[test]
fn lowercase_labels_do_not_match() {
    assert_eq!(parse_ranking("response a beats response b"), Vec::<String>::new());
}

#[test]
fn suffix_after_first_sentinel_occurrence_is_used() {
    let text = "FINAL RANKING:\n1. Response A\nFINAL RANKING:\n1. Response B";
    // The region is everything after the first sentinel, so both numbered
    // entries are found in textual order.
    assert_eq!(parse_ranking(text), vec!["Response A", "Response B"]);
}

#[test]
fn parser_is_idempotent_on_canonical_output() {
    let labels = vec!["Response C", "Response A", "Response B"];
    let mut canonical = String::from("FINAL RANKING:\n");
    for (i, label) in labels.iter().enumerate() {
        canonical.push_str(&format!("{}. {label}\n", i.saturating_add(1)));
    }
    assert_eq!(parse_ranking(&canonical), labels);
}
