//! Resolved application settings.
//!
//! The settings file format itself is an external concern; this module
//! consumes an already-resolved TOML document and fills every omitted field
//! with a default, so an empty file (or no file at all) yields a working
//! configuration. API keys may come from the file or from environment
//! variables; the environment only fills keys the file left unset.

use std::path::Path;

use serde::Deserialize;

use crate::prompts;
use crate::providers::ProviderTag;
use crate::search::SearchProviderKind;

/// How much of the deliberation pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Stage 1 only: collect individual responses.
    ChatOnly,
    /// Stages 1–2 plus the aggregate; no chairman synthesis.
    ChatRanking,
    /// The complete three-stage protocol.
    Full,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Full
    }
}

/// Resolved settings consumed by the orchestrator, registry and searcher.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Council model identifiers queried in Stage 1 and ranking in Stage 2.
    pub council_models: Vec<String>,
    /// Chairman model that synthesises the Stage 3 answer.
    pub chairman_model: String,
    /// Model asked to extract web-search terms from the user query.
    pub search_query_model: String,
    /// Default provider for unprefixed model identifiers.
    pub llm_provider: ProviderTag,
    /// Active web-search provider.
    pub search_provider: SearchProviderKind,
    /// How many search results to request.
    pub search_max_results: usize,
    /// How many top search results get full-text enrichment (0 disables).
    pub full_content_results: usize,
    /// How much of the pipeline to run.
    pub execution_mode: ExecutionMode,

    /// Per-query timeout in seconds.
    pub query_timeout_secs: u64,
    /// Sampling temperature for Stage 1 council answers.
    pub council_temperature: f64,
    /// Sampling temperature for the Stage 3 chairman.
    pub chairman_temperature: f64,
    /// Sampling temperature for Stage 2 ranking (lower for consistency).
    pub stage2_temperature: f64,

    /// Ollama server base URL.
    pub ollama_base_url: String,

    /// OpenAI API key.
    pub openai_api_key: Option<String>,
    /// Anthropic API key.
    pub anthropic_api_key: Option<String>,
    /// Google API key.
    pub google_api_key: Option<String>,
    /// Mistral API key.
    pub mistral_api_key: Option<String>,
    /// DeepSeek API key.
    pub deepseek_api_key: Option<String>,
    /// OpenRouter API key.
    pub openrouter_api_key: Option<String>,
    /// Tavily search API key.
    pub tavily_api_key: Option<String>,
    /// Brave search API key.
    pub brave_api_key: Option<String>,

    /// Stage 1 prompt template (`{search_context_block}`, `{user_query}`).
    pub stage1_prompt: String,
    /// Stage 2 prompt template (`{user_query}`, `{search_context_block}`,
    /// `{responses_text}`).
    pub stage2_prompt: String,
    /// Stage 3 prompt template (`{user_query}`, `{search_context_block}`,
    /// `{stage1_text}`, `{stage2_text}`).
    pub stage3_prompt: String,
    /// Search-query extraction prompt template (`{user_query}`).
    pub search_query_prompt: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            council_models: vec![
                "openai/gpt-4o".to_owned(),
                "google/gemini-2.5-flash".to_owned(),
                "anthropic/claude-sonnet-4".to_owned(),
                "mistralai/mistral-large-2411".to_owned(),
            ],
            chairman_model: "openai/gpt-4o".to_owned(),
            search_query_model: "openai/gpt-4o-mini".to_owned(),
            llm_provider: ProviderTag::Openrouter,
            search_provider: SearchProviderKind::DuckDuckGo,
            search_max_results: 5,
            full_content_results: 3,
            execution_mode: ExecutionMode::Full,
            query_timeout_secs: 120,
            council_temperature: 0.7,
            chairman_temperature: 0.7,
            stage2_temperature: 0.3,
            ollama_base_url: "http://localhost:11434".to_owned(),
            openai_api_key: None,
            anthropic_api_key: None,
            google_api_key: None,
            mistral_api_key: None,
            deepseek_api_key: None,
            openrouter_api_key: None,
            tavily_api_key: None,
            brave_api_key: None,
            stage1_prompt: prompts::STAGE1_PROMPT_DEFAULT.to_owned(),
            stage2_prompt: prompts::STAGE2_PROMPT_DEFAULT.to_owned(),
            stage3_prompt: prompts::STAGE3_PROMPT_DEFAULT.to_owned(),
            search_query_prompt: prompts::SEARCH_QUERY_PROMPT_DEFAULT.to_owned(),
        }
    }
}

/// Environment variable names checked for each key field, in field order.
const KEY_ENV_VARS: [(&str, KeyField); 8] = [
    ("OPENAI_API_KEY", KeyField::Openai),
    ("ANTHROPIC_API_KEY", KeyField::Anthropic),
    ("GOOGLE_API_KEY", KeyField::Google),
    ("MISTRAL_API_KEY", KeyField::Mistral),
    ("DEEPSEEK_API_KEY", KeyField::Deepseek),
    ("OPENROUTER_API_KEY", KeyField::Openrouter),
    ("TAVILY_API_KEY", KeyField::Tavily),
    ("BRAVE_API_KEY", KeyField::Brave),
];

#[derive(Clone, Copy)]
enum KeyField {
    Openai,
    Anthropic,
    Google,
    Mistral,
    Deepseek,
    Openrouter,
    Tavily,
    Brave,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed. Unknown
    /// options in the file are ignored.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read settings at {}: {e}", path.display()))?;
        let settings: Self = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("failed to parse settings at {}: {e}", path.display()))?;
        Ok(settings)
    }

    /// Load settings from a TOML file, or defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error only when an existing file cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Fill unset API keys from process environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_key_overrides(|name| std::env::var(name).ok());
    }

    /// Fill unset API keys through an injected lookup (testable variant).
    pub fn apply_key_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (name, field) in KEY_ENV_VARS {
            let slot = match field {
                KeyField::Openai => &mut self.openai_api_key,
                KeyField::Anthropic => &mut self.anthropic_api_key,
                KeyField::Google => &mut self.google_api_key,
                KeyField::Mistral => &mut self.mistral_api_key,
                KeyField::Deepseek => &mut self.deepseek_api_key,
                KeyField::Openrouter => &mut self.openrouter_api_key,
                KeyField::Tavily => &mut self.tavily_api_key,
                KeyField::Brave => &mut self.brave_api_key,
            };
            if slot.as_deref().map(str::trim).filter(|k| !k.is_empty()).is_none() {
                if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                    *slot = Some(value);
                }
            }
        }
    }

    /// Per-query timeout as a [`std::time::Duration`].
    pub fn query_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.query_timeout_secs)
    }
}

// Keys stay out of debug output.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("council_models", &self.council_models)
            .field("chairman_model", &self.chairman_model)
            .field("search_query_model", &self.search_query_model)
            .field("llm_provider", &self.llm_provider)
            .field("search_provider", &self.search_provider)
            .field("execution_mode", &self.execution_mode)
            .field("api_keys", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
