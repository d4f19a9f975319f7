//! The council orchestrator.
//!
//! [`Council::deliberate`] composes the full protocol — optional search,
//! Stage 1 fan-out, Stage 2 peer ranking, aggregation, Stage 3 synthesis —
//! and streams [`CouncilEvent`]s to the caller as each join point is
//! reached. Cancellation from the supplied token terminates the run with a
//! single [`CouncilEvent::Cancelled`]; nothing is emitted after it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::{ExecutionMode, Settings};
use crate::prompts;
use crate::providers::registry::ProviderRegistry;
use crate::providers::{Message, Provider, QueryOptions};
use crate::ranking::{aggregate_rankings, assign_labels, label_for, parse_ranking, AggregateRanking};
use crate::search::{SearchOptions, Searcher};

mod stage;

use stage::{spawn_queries, FanOutItem};

/// Timeout for the search-query extraction call.
const SEARCH_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Cap applied to generated search queries and their fallback.
const SEARCH_QUERY_MAX_CHARS: usize = 100;

/// Labels are single uppercase letters, so at most this many Stage 1
/// responses can enter Stage 2.
const MAX_RANKED_RESPONSES: usize = 26;

/// Buffer for the orchestrator's outward event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Request-scoped records
// ---------------------------------------------------------------------------

/// One model's Stage 1 outcome. Exactly one of `response`/`error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage1Result {
    /// Council model identifier.
    pub model: String,
    /// Reply text on success.
    pub response: Option<String>,
    /// Failure description on error.
    pub error: Option<String>,
}

/// One model's Stage 2 outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage2Result {
    /// Council model identifier.
    pub model: String,
    /// Full ranking text on success.
    pub ranking_raw: Option<String>,
    /// Labels recovered from the text; empty on error or unparsable output.
    pub parsed_ranking: Vec<String>,
    /// Failure description on error.
    pub error: Option<String>,
}

/// The chairman's Stage 3 synthesis. Failure still yields a structured
/// record so the caller always sees an answer-shaped result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage3Result {
    /// Chairman model identifier.
    pub model: String,
    /// Synthesised answer, or an error description when `error` is set.
    pub response: String,
    /// Whether synthesis failed.
    pub error: bool,
    /// Failure description when `error` is set.
    pub error_message: Option<String>,
}

/// What the caller asked the council to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliberationRequest {
    /// The user's question.
    pub question: String,
    /// Whether to gather web-search context first.
    pub use_search: bool,
}

/// Progress events streamed to the caller.
///
/// Per stage the orchestrator emits exactly one start (meta) event, one
/// completion event per model, and one done event. `Cancelled` and `Done`
/// are terminal for the whole deliberation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CouncilEvent {
    /// Search-query extraction finished and the search is starting.
    SearchStarted {
        /// The extracted search query.
        query: String,
    },
    /// Search finished (possibly degraded to a system note).
    SearchCompleted {
        /// The context block that will be injected into Stage 1.
        context: String,
    },
    /// Stage 1 is fanning out.
    Stage1Started {
        /// Number of council models queried.
        total_models: usize,
    },
    /// A Stage 1 model finished.
    Stage1Completed {
        /// The model's result record.
        result: Stage1Result,
    },
    /// All Stage 1 models have reported.
    Stage1Done,
    /// Stage 2 is fanning out.
    Stage2Started {
        /// The anonymising label → model bijection for this request.
        label_to_model: BTreeMap<String, String>,
    },
    /// A Stage 2 model finished.
    Stage2Completed {
        /// The model's result record.
        result: Stage2Result,
    },
    /// All Stage 2 models have reported.
    Stage2Done,
    /// Consensus computed from the parsed rankings.
    RankingsAggregated {
        /// Models ordered best-first by mean rank.
        rankings: Vec<AggregateRanking>,
    },
    /// The chairman's synthesis (or its structured failure).
    FinalSynthesis {
        /// The Stage 3 record.
        result: Stage3Result,
    },
    /// The deliberation was cancelled; terminal.
    Cancelled,
    /// The deliberation finished; terminal.
    Done,
}

/// Why the event-driving loop stopped early.
enum Halt {
    /// The cancellation token fired.
    Cancelled,
    /// The event consumer dropped the stream.
    Closed,
}

// ---------------------------------------------------------------------------
// Council
// ---------------------------------------------------------------------------

/// The deliberation engine. Cheap to clone; all state is request-scoped.
#[derive(Clone)]
pub struct Council {
    registry: Arc<ProviderRegistry>,
    searcher: Arc<Searcher>,
    settings: Arc<Settings>,
}

impl Council {
    /// Assemble a council from its process-lifetime collaborators.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        searcher: Arc<Searcher>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            registry,
            searcher,
            settings,
        }
    }

    /// Run one deliberation, streaming progress events.
    ///
    /// The stream ends with [`CouncilEvent::Done`], or with
    /// [`CouncilEvent::Cancelled`] when `cancel` fires (detection latency is
    /// bounded by the scheduler's one-second poll). Dropping the stream
    /// aborts all outstanding work.
    pub fn deliberate(
        &self,
        request: DeliberationRequest,
        cancel: CancellationToken,
    ) -> ReceiverStream<CouncilEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let engine = self.clone();
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("deliberation", %request_id);

        tokio::spawn(
            async move {
                match engine.drive(&request, &cancel, &tx).await {
                    Ok(()) => info!("deliberation complete"),
                    Err(Halt::Cancelled) => {
                        info!("deliberation cancelled");
                        let _ = tx.send(CouncilEvent::Cancelled).await;
                    }
                    Err(Halt::Closed) => debug!("event consumer dropped, stopping"),
                }
            }
            .instrument(span),
        );

        ReceiverStream::new(rx)
    }

    async fn drive(
        &self,
        request: &DeliberationRequest,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<CouncilEvent>,
    ) -> Result<(), Halt> {
        let settings = &self.settings;

        // Optional search preface. Failures degrade to a system note inside
        // the searcher, so this phase only ends early on cancellation.
        let mut search_context = String::new();
        if request.use_search {
            let query = tokio::select! {
                () = cancel.cancelled() => return Err(Halt::Cancelled),
                query = self.generate_search_query(&request.question) => query,
            };
            emit(tx, CouncilEvent::SearchStarted { query: query.clone() }).await?;

            let options = SearchOptions {
                provider: settings.search_provider,
                max_results: settings.search_max_results,
                full_content_results: settings.full_content_results,
            };
            search_context = tokio::select! {
                () = cancel.cancelled() => return Err(Halt::Cancelled),
                context = Arc::clone(&self.searcher).perform_search(&query, options) => context,
            };
            emit(
                tx,
                CouncilEvent::SearchCompleted {
                    context: search_context.clone(),
                },
            )
            .await?;
        }

        // Stage 1: collect individual responses.
        let stage1_prompt = self.stage1_prompt(&request.question, &search_context);
        let stage1_messages = Arc::new(vec![Message::user(stage1_prompt)]);
        emit(
            tx,
            CouncilEvent::Stage1Started {
                total_models: settings.council_models.len(),
            },
        )
        .await?;

        let stage1_options = QueryOptions {
            timeout: settings.query_timeout(),
            temperature: settings.council_temperature,
        };
        let mut stage1_rx = spawn_queries(
            Arc::clone(&self.registry),
            settings.council_models.clone(),
            stage1_messages,
            stage1_options,
            cancel.clone(),
        );

        let mut stage1_results: Vec<Stage1Result> = Vec::new();
        while let Some(item) = stage1_rx.recv().await {
            match item {
                FanOutItem::Completed { model, outcome } => {
                    let result = match outcome {
                        Ok(content) => Stage1Result {
                            model,
                            response: Some(content),
                            error: None,
                        },
                        Err(e) => Stage1Result {
                            model,
                            response: None,
                            error: Some(e.to_string()),
                        },
                    };
                    stage1_results.push(result.clone());
                    emit(tx, CouncilEvent::Stage1Completed { result }).await?;
                }
                FanOutItem::Drained => break,
                FanOutItem::Cancelled => return Err(Halt::Cancelled),
            }
        }
        emit(tx, CouncilEvent::Stage1Done).await?;

        if settings.execution_mode == ExecutionMode::ChatOnly {
            emit(tx, CouncilEvent::Done).await?;
            return Ok(());
        }

        // Labels follow the original council order, not arrival order.
        let successful: Vec<&Stage1Result> = settings
            .council_models
            .iter()
            .filter_map(|model| {
                stage1_results
                    .iter()
                    .find(|r| &r.model == model && r.error.is_none())
            })
            .collect();
        if successful.len() > MAX_RANKED_RESPONSES {
            warn!(
                excluded = successful.len().saturating_sub(MAX_RANKED_RESPONSES),
                "more successful responses than labels, excluding surplus from ranking"
            );
        }
        let ranked: Vec<&Stage1Result> =
            successful.iter().take(MAX_RANKED_RESPONSES).copied().collect();
        let ranked_models: Vec<String> = ranked.iter().map(|r| r.model.clone()).collect();
        let label_to_model = assign_labels(&ranked_models);

        // Stage 2: peer rankings from the successful models only.
        emit(
            tx,
            CouncilEvent::Stage2Started {
                label_to_model: label_to_model.clone(),
            },
        )
        .await?;

        let responses_text: String = ranked
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                label_for(i).map(|label| {
                    format!("{label}:\n{}", r.response.as_deref().unwrap_or_default())
                })
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let ranking_prompt =
            self.stage2_prompt(&request.question, &responses_text, &search_context);
        let stage2_messages = Arc::new(vec![Message::user(ranking_prompt)]);

        let stage2_options = QueryOptions {
            timeout: settings.query_timeout(),
            temperature: settings.stage2_temperature,
        };
        let mut stage2_rx = spawn_queries(
            Arc::clone(&self.registry),
            ranked_models,
            stage2_messages,
            stage2_options,
            cancel.clone(),
        );

        let mut stage2_results: Vec<Stage2Result> = Vec::new();
        while let Some(item) = stage2_rx.recv().await {
            match item {
                FanOutItem::Completed { model, outcome } => {
                    let result = match outcome {
                        Ok(content) => {
                            let parsed_ranking = parse_ranking(&content);
                            Stage2Result {
                                model,
                                ranking_raw: Some(content),
                                parsed_ranking,
                                error: None,
                            }
                        }
                        Err(e) => Stage2Result {
                            model,
                            ranking_raw: None,
                            parsed_ranking: Vec::new(),
                            error: Some(e.to_string()),
                        },
                    };
                    stage2_results.push(result.clone());
                    emit(tx, CouncilEvent::Stage2Completed { result }).await?;
                }
                FanOutItem::Drained => break,
                FanOutItem::Cancelled => return Err(Halt::Cancelled),
            }
        }
        emit(tx, CouncilEvent::Stage2Done).await?;

        let rankings = aggregate_rankings(&stage2_results, &label_to_model);
        emit(tx, CouncilEvent::RankingsAggregated { rankings }).await?;

        if settings.execution_mode == ExecutionMode::ChatRanking {
            emit(tx, CouncilEvent::Done).await?;
            return Ok(());
        }

        // Stage 3: single chairman call.
        let result = tokio::select! {
            () = cancel.cancelled() => return Err(Halt::Cancelled),
            result = self.synthesize_final(&request.question, &ranked, &stage2_results, &search_context) => result,
        };
        emit(tx, CouncilEvent::FinalSynthesis { result }).await?;
        emit(tx, CouncilEvent::Done).await?;
        Ok(())
    }

    /// Ask the dedicated model for 3–6 word search terms.
    ///
    /// Empty, too-short or failed extractions fall back to the first 100
    /// characters of the raw question; surrounding quotes are stripped.
    pub async fn generate_search_query(&self, user_query: &str) -> String {
        let settings = &self.settings;
        let prompt = match prompts::render(
            &settings.search_query_prompt,
            &[("user_query", user_query)],
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "search query template failed, using fallback prompt");
                format!("Search terms for: {user_query}")
            }
        };

        let model = &settings.search_query_model;
        let adapter = self.registry.resolve(model);
        let options = QueryOptions {
            timeout: SEARCH_QUERY_TIMEOUT,
            ..QueryOptions::default()
        };

        match adapter
            .query(model, &[Message::user(prompt)], &options)
            .await
        {
            Ok(content) => {
                let cleaned = content.trim().trim_matches(&['"', '\''][..]);
                if cleaned.chars().count() < 5 {
                    truncate_chars(user_query, SEARCH_QUERY_MAX_CHARS)
                } else {
                    truncate_chars(cleaned, SEARCH_QUERY_MAX_CHARS)
                }
            }
            Err(e) => {
                warn!(error = %e, "search query generation failed, using raw question");
                truncate_chars(user_query, SEARCH_QUERY_MAX_CHARS)
            }
        }
    }

    fn stage1_prompt(&self, user_query: &str, search_context: &str) -> String {
        let block = if search_context.is_empty() {
            String::new()
        } else {
            match prompts::render(
                prompts::STAGE1_SEARCH_CONTEXT_TEMPLATE,
                &[("search_context", search_context)],
            ) {
                Ok(block) => block,
                Err(e) => {
                    warn!(error = %e, "search context template failed, using bare results");
                    format!("Search Results:\n{search_context}\n")
                }
            }
        };

        match prompts::render(
            &self.settings.stage1_prompt,
            &[("search_context_block", &block), ("user_query", user_query)],
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "stage 1 template failed, using fallback prompt");
                if block.is_empty() {
                    user_query.to_owned()
                } else {
                    format!("{block}\nQuestion: {user_query}")
                }
            }
        }
    }

    fn stage2_prompt(&self, user_query: &str, responses_text: &str, search_context: &str) -> String {
        let block = search_context_block(search_context);
        match prompts::render(
            &self.settings.stage2_prompt,
            &[
                ("user_query", user_query),
                ("responses_text", responses_text),
                ("search_context_block", &block),
            ],
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "stage 2 template failed, using fallback prompt");
                format!("Question: {user_query}\n\n{responses_text}\n\nRank these responses.")
            }
        }
    }

    async fn synthesize_final(
        &self,
        user_query: &str,
        stage1_successful: &[&Stage1Result],
        stage2_results: &[Stage2Result],
        search_context: &str,
    ) -> Stage3Result {
        let settings = &self.settings;

        let stage1_text: String = stage1_successful
            .iter()
            .map(|r| {
                format!(
                    "Model: {}\nResponse: {}",
                    r.model,
                    r.response.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let stage2_text: String = stage2_results
            .iter()
            .filter(|r| r.ranking_raw.is_some())
            .map(|r| {
                format!(
                    "Model: {}\nRanking: {}",
                    r.model,
                    r.ranking_raw.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let block = search_context_block(search_context);

        let chairman_prompt = match prompts::render(
            &settings.stage3_prompt,
            &[
                ("user_query", user_query),
                ("search_context_block", &block),
                ("stage1_text", &stage1_text),
                ("stage2_text", &stage2_text),
            ],
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "stage 3 template failed, using fallback prompt");
                format!("Question: {user_query}\n\nSynthesis required.")
            }
        };

        let chairman = settings.chairman_model.clone();
        let adapter = self.registry.resolve(&chairman);
        let options = QueryOptions {
            timeout: settings.query_timeout(),
            temperature: settings.chairman_temperature,
        };

        match adapter
            .query(&chairman, &[Message::user(chairman_prompt)], &options)
            .await
        {
            Ok(content) => Stage3Result {
                model: chairman,
                response: content,
                error: false,
                error_message: None,
            },
            Err(e) => Stage3Result {
                model: chairman,
                response: format!("Error synthesizing final answer: {e}"),
                error: true,
                error_message: Some(e.to_string()),
            },
        }
    }
}

async fn emit(tx: &mpsc::Sender<CouncilEvent>, event: CouncilEvent) -> Result<(), Halt> {
    tx.send(event).await.map_err(|_| Halt::Closed)
}

fn search_context_block(search_context: &str) -> String {
    if search_context.is_empty() {
        String::new()
    } else {
        format!("Context from Web Search:\n{search_context}\n")
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
