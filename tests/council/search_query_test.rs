//! Search-query extraction and its fallbacks.

use crate::support::{council_settings, scripted_council, Behavior, ScriptedProvider};

#[tokio::test]
async fn extracted_terms_are_trimmed_and_unquoted() {
    let provider = ScriptedProvider::new(vec![(
        "sq",
        vec![Behavior::Reply("  \"rust async runtimes 2026\"  ".to_owned())],
    )]);
    let council = scripted_council(provider, council_settings(&["m1"]));

    let query = council
        .generate_search_query("What are the best async runtimes for Rust right now?")
        .await;
    assert_eq!(query, "rust async runtimes 2026");
}

#[tokio::test]
async fn too_short_extraction_falls_back_to_question() {
    let provider = ScriptedProvider::new(vec![("sq", vec![Behavior::Reply("hi".to_owned())])]);
    let council = scripted_council(provider, council_settings(&["m1"]));

    let query = council.generate_search_query("why is the sky blue").await;
    assert_eq!(query, "why is the sky blue");
}

#[tokio::test]
async fn failed_extraction_falls_back_to_question() {
    let provider =
        ScriptedProvider::new(vec![("sq", vec![Behavior::Fail("offline".to_owned())])]);
    let council = scripted_council(provider, council_settings(&["m1"]));

    let query = council.generate_search_query("why is the sky blue").await;
    assert_eq!(query, "why is the sky blue");
}

#[tokio::test]
async fn fallback_is_capped_at_one_hundred_chars() {
    let provider =
        ScriptedProvider::new(vec![("sq", vec![Behavior::Fail("offline".to_owned())])]);
    let council = scripted_council(provider, council_settings(&["m1"]));

    let long_question = "q".repeat(250);
    let query = council.generate_search_query(&long_question).await;
    assert_eq!(query.chars().count(), 100);
}

#[tokio::test]
async fn extraction_is_capped_at_one_hundred_chars() {
    let provider = ScriptedProvider::new(vec![(
        "sq",
        vec![Behavior::Reply("t".repeat(300))],
    )]);
    let council = scripted_council(provider, council_settings(&["m1"]));

    let query = council.generate_search_query("anything").await;
    assert_eq!(query.chars().count(), 100);
}
