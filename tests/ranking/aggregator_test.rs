//! Tests for the consensus aggregator.

use std::collections::BTreeMap;

use conclave::council::Stage2Result;
use conclave::ranking::{aggregate_rankings, assign_labels};

fn ranking(model: &str, labels: &[&str]) -> Stage2Result {
    Stage2Result {
        model: model.to_owned(),
        ranking_raw: Some("raw".to_owned()),
        parsed_ranking: labels.iter().map(|l| (*l).to_owned()).collect(),
        error: None,
    }
}

fn label_map(models: &[&str]) -> BTreeMap<String, String> {
    let models: Vec<String> = models.iter().map(|m| (*m).to_owned()).collect();
    assign_labels(&models)
}

#[test]
fn identical_rankings_give_integer_means() {
    let map = label_map(&["m1", "m2", "m3"]);
    let order = ["Response A", "Response B", "Response C"];
    let results = vec![
        ranking("m1", &order),
        ranking("m2", &order),
        ranking("m3", &order),
    ];

    let aggregate = aggregate_rankings(&results, &map);
    assert_eq!(aggregate.len(), 3);
    assert_eq!(aggregate[0].model, "m1");
    assert!((aggregate[0].average_rank - 1.0).abs() < f64::EPSILON);
    assert_eq!(aggregate[1].model, "m2");
    assert!((aggregate[1].average_rank - 2.0).abs() < f64::EPSILON);
    assert_eq!(aggregate[2].model, "m3");
    assert!((aggregate[2].average_rank - 3.0).abs() < f64::EPSILON);
    assert!(aggregate.iter().all(|entry| entry.rankings_count == 3));
}

#[test]
fn models_absent_from_every_ranking_are_excluded() {
    let map = label_map(&["m1", "m2", "m3"]);
    let results = vec![ranking("m1", &["Response A", "Response C"])];

    let aggregate = aggregate_rankings(&results, &map);
    assert_eq!(aggregate.len(), 2);
    assert!(aggregate.iter().all(|entry| entry.model != "m2"));
}

#[test]
fn labels_outside_the_mapping_are_ignored() {
    let map = label_map(&["m1", "m2"]);
    let results = vec![ranking(
        "m1",
        &["Response Z", "Response B", "Response A"],
    )];

    let aggregate = aggregate_rankings(&results, &map);
    // Response Z has no mapping, but still occupies position 1.
    assert_eq!(aggregate[0].model, "m2");
    assert!((aggregate[0].average_rank - 2.0).abs() < f64::EPSILON);
    assert_eq!(aggregate[1].model, "m1");
    assert!((aggregate[1].average_rank - 3.0).abs() < f64::EPSILON);
}

#[test]
fn empty_parsed_rankings_contribute_nothing() {
    let map = label_map(&["m1", "m2"]);
    let refusal = Stage2Result {
        model: "m2".to_owned(),
        ranking_raw: Some("I refuse to rank.".to_owned()),
        parsed_ranking: Vec::new(),
        error: None,
    };
    let results = vec![ranking("m1", &["Response A", "Response B"]), refusal];

    let aggregate = aggregate_rankings(&results, &map);
    assert_eq!(aggregate.len(), 2);
    assert!(aggregate.iter().all(|entry| entry.rankings_count == 1));
}

#[test]
fn mean_is_rounded_to_two_decimals() {
    let map = label_map(&["m1", "m2", "m3"]);
    let results = vec![
        ranking("m1", &["Response A", "Response B", "Response C"]),
        ranking("m2", &["Response B", "Response C", "Response A"]),
        ranking("m3", &["Response A", "Response B", "Response C"]),
    ];

    let aggregate = aggregate_rankings(&results, &map);
    // m1 took positions 1, 3, 1 -> mean 5/3 -> 1.67 after rounding.
    let m1 = aggregate
        .iter()
        .find(|entry| entry.model == "m1")
        .expect("m1 should be ranked");
    assert!((m1.average_rank - 1.67).abs() < f64::EPSILON);
}

#[test]
fn ties_break_on_model_identifier() {
    let map = label_map(&["mb", "ma"]);
    // Each model gets one first place and one second place: both mean 1.5.
    let results = vec![
        ranking("mb", &["Response A", "Response B"]),
        ranking("ma", &["Response B", "Response A"]),
    ];

    let aggregate = aggregate_rankings(&results, &map);
    assert!((aggregate[0].average_rank - 1.5).abs() < f64::EPSILON);
    assert!((aggregate[1].average_rank - 1.5).abs() < f64::EPSILON);
    assert_eq!(aggregate[0].model, "ma");
    assert_eq!(aggregate[1].model, "mb");
}

#[test]
fn duplicate_labels_contribute_both_positions() {
    let map = label_map(&["m1"]);
    let results = vec![ranking("m1", &["Response A", "Response A"])];

    let aggregate = aggregate_rankings(&results, &map);
    assert_eq!(aggregate.len(), 1);
    assert_eq!(aggregate[0].rankings_count, 2);
    assert!((aggregate[0].average_rank - 1.5).abs() < f64::EPSILON);
}

#[test]
fn errored_rankings_are_skipped_via_empty_parse() {
    let map = label_map(&["m1"]);
    let errored = Stage2Result {
        model: "m1".to_owned(),
        ranking_raw: None,
        parsed_ranking: Vec::new(),
        error: Some("timeout".to_owned()),
    };

    assert!(aggregate_rankings(&[errored], &map).is_empty());
}
