//! Shared scripted provider and council assembly helpers.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_stream::StreamExt;

use conclave::config::Settings;
use conclave::council::{Council, CouncilEvent};
use conclave::providers::registry::ProviderRegistry;
use conclave::providers::{
    KeyValidation, Message, ModelInfo, Provider, ProviderTag, QueryError, QueryOptions,
};
use conclave::search::Searcher;

/// One scripted reply for a model. Each query pops the next entry.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Reply immediately with the given text.
    Reply(String),
    /// Reply with the given text after a delay.
    ReplyAfter(Duration, String),
    /// Fail with the given message.
    Fail(String),
    /// Never complete; only cancellation or abort ends the task.
    Hang,
}

/// Provider whose replies are scripted per model, in call order.
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Behavior>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<(&str, Vec<Behavior>)>) -> Arc<Self> {
        let scripts = scripts
            .into_iter()
            .map(|(model, behaviors)| (model.to_owned(), behaviors.into_iter().collect()))
            .collect();
        Arc::new(Self {
            scripts: Mutex::new(scripts),
        })
    }

    fn next_behavior(&self, model: &str) -> Behavior {
        let mut scripts = self.scripts.lock().expect("scripts lock");
        scripts
            .get_mut(model)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Behavior::Fail(format!("no scripted reply for {model}")))
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    async fn query(
        &self,
        model: &str,
        _messages: &[Message],
        _options: &QueryOptions,
    ) -> Result<String, QueryError> {
        match self.next_behavior(model) {
            Behavior::Reply(text) => Ok(text),
            Behavior::ReplyAfter(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Behavior::Fail(message) => Err(QueryError::Parse {
                provider: ProviderTag::Openrouter,
                detail: message,
            }),
            Behavior::Hang => std::future::pending().await,
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, QueryError> {
        Ok(Vec::new())
    }

    async fn validate_key(&self, _api_key: &str) -> KeyValidation {
        KeyValidation {
            success: true,
            message: "scripted".to_owned(),
        }
    }

    fn tag(&self) -> ProviderTag {
        ProviderTag::Openrouter
    }
}

/// Settings for a three-model council with chairman `c1`.
pub fn council_settings(models: &[&str]) -> Settings {
    Settings {
        council_models: models.iter().map(|m| (*m).to_owned()).collect(),
        chairman_model: "c1".to_owned(),
        search_query_model: "sq".to_owned(),
        ..Settings::default()
    }
}

/// Assemble a council whose every model routes to the scripted provider.
pub fn scripted_council(provider: Arc<ScriptedProvider>, settings: Settings) -> Council {
    let registry = Arc::new(ProviderRegistry::for_testing(provider));
    let searcher = Arc::new(Searcher::new(reqwest::Client::new(), None, None));
    Council::new(registry, searcher, Arc::new(settings))
}

/// The canonical ranking text every well-behaved Stage 2 model returns.
pub fn canonical_ranking(order: &[&str]) -> String {
    let mut text = String::from("Evaluation omitted.\n\nFINAL RANKING:\n");
    for (i, label) in order.iter().enumerate() {
        text.push_str(&format!("{}. {label}\n", i.saturating_add(1)));
    }
    text
}

/// Drain a deliberation stream into a vector.
pub async fn collect_events(
    mut stream: tokio_stream::wrappers::ReceiverStream<CouncilEvent>,
) -> Vec<CouncilEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}
