//! LLM provider abstraction layer.
//!
//! Defines the [`Provider`] trait and the shared request/response types used
//! by all adapter implementations.
//!
//! Four adapters cover the seven supported backends:
//! - [`openai_compat::OpenAiCompatProvider`] — OpenAI, Mistral, DeepSeek and
//!   OpenRouter (identical chat-completions wire format)
//! - [`anthropic::AnthropicProvider`] — Anthropic `/v1/messages` API
//! - [`google::GoogleProvider`] — Gemini `generateContent` API
//! - [`ollama::OllamaProvider`] — Ollama `/api/chat` API
//!
//! The [`registry::ProviderRegistry`] resolves the correct adapter for each
//! model identifier (explicit `provider:` prefix → configured default →
//! openrouter).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai_compat;
pub mod registry;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message.
    System,
    /// Human user message.
    User,
    /// Assistant (LLM) message.
    Assistant,
}

impl Role {
    /// Wire name shared by every chat-style API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in a conversation with an LLM. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl Message {
    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// The seven supported backend providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    /// OpenAI chat completions.
    Openai,
    /// Anthropic messages API.
    Anthropic,
    /// Google Gemini.
    Google,
    /// Mistral chat completions.
    Mistral,
    /// DeepSeek chat completions.
    Deepseek,
    /// OpenRouter multi-model gateway.
    Openrouter,
    /// Local Ollama server.
    Ollama,
}

impl ProviderTag {
    /// The tag as it appears in prefixed model identifiers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Mistral => "mistral",
            Self::Deepseek => "deepseek",
            Self::Openrouter => "openrouter",
            Self::Ollama => "ollama",
        }
    }

    /// Parse a provider tag from its lowercase name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "openai" => Some(Self::Openai),
            "anthropic" => Some(Self::Anthropic),
            "google" => Some(Self::Google),
            "mistral" => Some(Self::Mistral),
            "deepseek" => Some(Self::Deepseek),
            "openrouter" => Some(Self::Openrouter),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// All known tags, in registry construction order.
    pub fn all() -> [Self; 7] {
        [
            Self::Openai,
            Self::Anthropic,
            Self::Google,
            Self::Mistral,
            Self::Deepseek,
            Self::Openrouter,
            Self::Ollama,
        ]
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip `tag:` from the front of a model identifier, if present.
///
/// Adapters call this so that both `openai:gpt-4o` and `gpt-4o` reach the
/// wire as `gpt-4o`.
pub fn strip_tag_prefix(model: &str, tag: ProviderTag) -> &str {
    model
        .strip_prefix(tag.as_str())
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(model)
}

/// Per-query options resolved by the caller from settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Request timeout. Timeouts are failures of the call, not of the stage.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            temperature: 0.7,
        }
    }
}

/// A model advertised by a provider's listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Provider-prefixed identifier usable in council configuration.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

/// Outcome of an API key validation probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValidation {
    /// Whether the key was accepted.
    pub success: bool,
    /// Human-readable explanation.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by model adapters.
///
/// Adapters never panic across the abstraction boundary; every failure mode
/// becomes one of these variants and is isolated to the affected model's
/// result record by the stage scheduler.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The API key for the selected provider is not configured.
    #[error("{provider} API key not configured")]
    MissingKey {
        /// Provider missing its key.
        provider: ProviderTag,
    },
    /// Upstream provider responded with a non-success status.
    #[error("{provider} API error: {status} - {body}")]
    Status {
        /// Responding provider.
        provider: ProviderTag,
        /// HTTP status code.
        status: u16,
        /// Raw response body, captured verbatim.
        body: String,
    },
    /// The request exceeded its timeout.
    #[error("{provider} request timed out")]
    Timeout {
        /// Provider that timed out.
        provider: ProviderTag,
    },
    /// Network-level transport failure.
    #[error("{provider} transport error: {source}")]
    Transport {
        /// Provider being contacted.
        provider: ProviderTag,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// Response did not match the expected schema.
    #[error("malformed {provider} response: {detail}")]
    Parse {
        /// Responding provider.
        provider: ProviderTag,
        /// What failed to parse.
        detail: String,
    },
}

impl QueryError {
    /// Classify a reqwest error as timeout or transport failure.
    pub fn from_reqwest(provider: ProviderTag, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { provider }
        } else {
            Self::Transport { provider, source }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP helper shared by all adapters
// ---------------------------------------------------------------------------

/// Check HTTP response status and return the body text.
///
/// # Errors
///
/// Returns [`QueryError::Status`] on non-2xx (body captured verbatim into
/// the error), or a transport/timeout error when the body cannot be read.
pub async fn check_http_response(
    provider: ProviderTag,
    response: reqwest::Response,
) -> Result<String, QueryError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| QueryError::from_reqwest(provider, e))?;
    if !status.is_success() {
        return Err(QueryError::Status {
            provider,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Uniform query contract over heterogeneous LLM HTTP APIs.
///
/// All adapters must be `Send + Sync`: one instance is shared across every
/// concurrently running stage task. Adapters hold a reference-counted clone
/// of the process-lifetime HTTP client, so cloning requests never re-opens
/// connections.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a chat query and return the assistant's reply text.
    ///
    /// The model identifier may carry this adapter's own `provider:` prefix,
    /// which is stripped before hitting the wire.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for a missing key, non-2xx status, timeout,
    /// transport failure, or malformed body. Never panics; exactly-once
    /// return.
    async fn query(
        &self,
        model: &str,
        messages: &[Message],
        options: &QueryOptions,
    ) -> Result<String, QueryError>;

    /// Fetch the models this provider currently advertises.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] on any API, network, or parse failure.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, QueryError>;

    /// Probe whether an API key is accepted by the provider.
    ///
    /// Infallible by design: rejection and transport failure both surface as
    /// an unsuccessful [`KeyValidation`].
    async fn validate_key(&self, api_key: &str) -> KeyValidation;

    /// The provider tag this adapter serves.
    fn tag(&self) -> ProviderTag;
}
