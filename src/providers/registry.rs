//! Provider registry resolving model identifiers to adapters.
//!
//! Built once at start-up from resolved settings and immutable thereafter.
//! Every adapter shares one process-lifetime `reqwest::Client`, so all
//! council queries pool connections.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;

use super::anthropic::AnthropicProvider;
use super::google::GoogleProvider;
use super::ollama::OllamaProvider;
use super::openai_compat::OpenAiCompatProvider;
use super::{Provider, ProviderTag};

/// Immutable map of the seven backend adapters.
#[derive(Clone)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderTag, Arc<dyn Provider>>,
    fallback: Arc<dyn Provider>,
    fallback_tag: ProviderTag,
}

impl ProviderRegistry {
    /// Build the registry from resolved settings.
    ///
    /// The fallback for unprefixed model identifiers is the configured
    /// default provider when it is `ollama` or `openrouter`, and
    /// `openrouter` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error when the shared HTTP client cannot be constructed.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build shared HTTP client")?;

        let mut adapters: HashMap<ProviderTag, Arc<dyn Provider>> = HashMap::new();
        adapters.insert(
            ProviderTag::Openai,
            Arc::new(OpenAiCompatProvider::openai(
                client.clone(),
                settings.openai_api_key.clone(),
            )),
        );
        adapters.insert(
            ProviderTag::Anthropic,
            Arc::new(AnthropicProvider::new(
                client.clone(),
                settings.anthropic_api_key.clone(),
            )),
        );
        adapters.insert(
            ProviderTag::Google,
            Arc::new(GoogleProvider::new(
                client.clone(),
                settings.google_api_key.clone(),
            )),
        );
        adapters.insert(
            ProviderTag::Mistral,
            Arc::new(OpenAiCompatProvider::mistral(
                client.clone(),
                settings.mistral_api_key.clone(),
            )),
        );
        adapters.insert(
            ProviderTag::Deepseek,
            Arc::new(OpenAiCompatProvider::deepseek(
                client.clone(),
                settings.deepseek_api_key.clone(),
            )),
        );
        adapters.insert(
            ProviderTag::Openrouter,
            Arc::new(OpenAiCompatProvider::openrouter(
                client.clone(),
                settings.openrouter_api_key.clone(),
            )),
        );
        adapters.insert(
            ProviderTag::Ollama,
            Arc::new(OllamaProvider::new(client, settings.ollama_base_url.clone())),
        );

        let fallback_tag = match settings.llm_provider {
            ProviderTag::Ollama => ProviderTag::Ollama,
            _ => ProviderTag::Openrouter,
        };
        let fallback = adapters
            .get(&fallback_tag)
            .cloned()
            .context("fallback adapter missing from registry")?;

        Ok(Self {
            adapters,
            fallback,
            fallback_tag,
        })
    }

    /// Create a registry where every model routes to a single adapter.
    #[doc(hidden)]
    pub fn for_testing(provider: Arc<dyn Provider>) -> Self {
        let mut adapters: HashMap<ProviderTag, Arc<dyn Provider>> = HashMap::new();
        for tag in ProviderTag::all() {
            adapters.insert(tag, Arc::clone(&provider));
        }
        Self {
            adapters,
            fallback: provider,
            fallback_tag: ProviderTag::Openrouter,
        }
    }

    /// Resolve a model identifier to its adapter.
    ///
    /// A `provider:` prefix with a known tag selects that adapter; anything
    /// else (unprefixed identifiers, unknown prefixes) routes to the
    /// fallback.
    pub fn resolve(&self, model_id: &str) -> Arc<dyn Provider> {
        if let Some((prefix, _)) = model_id.split_once(':') {
            if let Some(tag) = ProviderTag::parse(prefix) {
                if let Some(adapter) = self.adapters.get(&tag) {
                    return Arc::clone(adapter);
                }
            }
        }
        Arc::clone(&self.fallback)
    }

    /// Look up an adapter by its provider tag.
    pub fn get(&self, tag: ProviderTag) -> Option<Arc<dyn Provider>> {
        self.adapters.get(&tag).cloned()
    }

    /// The tag unprefixed model identifiers route to.
    pub fn fallback_tag(&self) -> ProviderTag {
        self.fallback_tag
    }
}
