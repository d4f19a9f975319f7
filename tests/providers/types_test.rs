//! Tests for the shared provider types and identifier handling.

use std::time::Duration;

use conclave::providers::{strip_tag_prefix, ProviderTag, QueryOptions, Role};

#[test]
fn provider_tag_parses_all_known_names() {
    for tag in ProviderTag::all() {
        assert_eq!(ProviderTag::parse(tag.as_str()), Some(tag));
    }
    assert_eq!(ProviderTag::parse("groq"), None);
    assert_eq!(ProviderTag::parse(""), None);
    assert_eq!(ProviderTag::parse("OpenAI"), None);
}

#[test]
fn provider_tag_display_matches_prefix_form() {
    assert_eq!(ProviderTag::Openai.to_string(), "openai");
    assert_eq!(ProviderTag::Deepseek.to_string(), "deepseek");
    assert_eq!(ProviderTag::Openrouter.to_string(), "openrouter");
}

#[test]
fn strip_tag_prefix_removes_own_prefix_only() {
    assert_eq!(
        strip_tag_prefix("openai:gpt-4o", ProviderTag::Openai),
        "gpt-4o"
    );
    assert_eq!(
        strip_tag_prefix("anthropic:claude-sonnet-4", ProviderTag::Openai),
        "anthropic:claude-sonnet-4"
    );
    assert_eq!(strip_tag_prefix("gpt-4o", ProviderTag::Openai), "gpt-4o");
    // Slash-style identifiers are not prefixes and pass through whole.
    assert_eq!(
        strip_tag_prefix("openai/gpt-4o", ProviderTag::Openai),
        "openai/gpt-4o"
    );
}

#[test]
fn query_options_default_to_contract_values() {
    let options = QueryOptions::default();
    assert_eq!(options.timeout, Duration::from_secs(120));
    assert!((options.temperature - 0.7).abs() < f64::EPSILON);
}

#[test]
fn role_wire_names() {
    assert_eq!(Role::System.as_str(), "system");
    assert_eq!(Role::User.as_str(), "user");
    assert_eq!(Role::Assistant.as_str(), "assistant");
}
