//! Routing tests for the provider registry.

use conclave::config::Settings;
use conclave::providers::registry::ProviderRegistry;
use conclave::providers::{Provider, ProviderTag};

fn registry_with_default(llm_provider: ProviderTag) -> ProviderRegistry {
    let settings = Settings {
        llm_provider,
        ..Settings::default()
    };
    ProviderRegistry::from_settings(&settings).expect("registry should build")
}

#[test]
fn prefixed_model_routes_to_its_provider() {
    let registry = registry_with_default(ProviderTag::Ollama);
    // The explicit prefix wins regardless of the configured default.
    assert_eq!(
        registry.resolve("openai:gpt-4o").tag(),
        ProviderTag::Openai
    );
    assert_eq!(
        registry.resolve("anthropic:claude-sonnet-4").tag(),
        ProviderTag::Anthropic
    );
    assert_eq!(
        registry.resolve("google:gemini-2.5-flash").tag(),
        ProviderTag::Google
    );
    assert_eq!(
        registry.resolve("deepseek:deepseek-chat").tag(),
        ProviderTag::Deepseek
    );
    assert_eq!(
        registry.resolve("ollama:llama3:8b").tag(),
        ProviderTag::Ollama
    );
}

#[test]
fn unprefixed_model_routes_to_configured_default() {
    let registry = registry_with_default(ProviderTag::Ollama);
    assert_eq!(registry.resolve("gpt-4o").tag(), ProviderTag::Ollama);
    assert_eq!(registry.fallback_tag(), ProviderTag::Ollama);

    let registry = registry_with_default(ProviderTag::Openrouter);
    assert_eq!(registry.resolve("gpt-4o").tag(), ProviderTag::Openrouter);
}

#[test]
fn non_routable_default_falls_back_to_openrouter() {
    // Only ollama and openrouter are valid defaults; anything else routes
    // unprefixed identifiers to openrouter as last resort.
    let registry = registry_with_default(ProviderTag::Openai);
    assert_eq!(registry.resolve("gpt-4o").tag(), ProviderTag::Openrouter);
    assert_eq!(registry.fallback_tag(), ProviderTag::Openrouter);
}

#[test]
fn unknown_prefix_uses_fallback() {
    let registry = registry_with_default(ProviderTag::Openrouter);
    assert_eq!(
        registry.resolve("x-ai:grok-3").tag(),
        ProviderTag::Openrouter
    );
}

#[test]
fn slash_style_identifiers_are_unprefixed() {
    // OpenRouter catalogue ids like openai/gpt-4o carry no colon tag.
    let registry = registry_with_default(ProviderTag::Openrouter);
    assert_eq!(
        registry.resolve("openai/gpt-4o").tag(),
        ProviderTag::Openrouter
    );
}

#[test]
fn get_exposes_every_adapter() {
    let registry = registry_with_default(ProviderTag::Openrouter);
    for tag in ProviderTag::all() {
        let adapter = registry.get(tag).expect("adapter should be registered");
        assert_eq!(adapter.tag(), tag);
    }
}
