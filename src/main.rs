//! Conclave CLI — put a question to an LLM council from the terminal.
//!
//! `ask` runs a full deliberation and streams progress; `models` and
//! `check` exercise the provider listing and key-validation operations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use conclave::config::Settings;
use conclave::council::{Council, CouncilEvent, DeliberationRequest};
use conclave::logging;
use conclave::providers::registry::ProviderRegistry;
use conclave::providers::{Provider, ProviderTag};
use conclave::search::Searcher;

#[derive(Parser)]
#[command(name = "conclave", version, about = "Three-stage LLM council deliberation")]
struct Cli {
    /// Path to the settings TOML file (default: ./conclave.toml, then the
    /// user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write JSON logs with daily rotation into this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Put a question to the council.
    Ask {
        /// The question to deliberate on.
        question: String,

        /// Gather web-search context before Stage 1.
        #[arg(long)]
        search: bool,

        /// Print progress events as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// List the models a provider currently advertises.
    Models {
        /// Provider tag: openai, anthropic, google, mistral, deepseek,
        /// openrouter or ollama.
        provider: String,
    },
    /// Validate the configured API key for a provider.
    Check {
        /// Provider tag: openai, anthropic, google, mistral, deepseek,
        /// openrouter or ollama.
        provider: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let _logging_guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_with_file(dir)?),
        None => {
            logging::init_console();
            None
        }
    };

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut settings = Settings::load_or_default(&config_path)?;
    settings.apply_env_overrides();
    let settings = Arc::new(settings);

    let registry = Arc::new(ProviderRegistry::from_settings(&settings)?);

    match cli.command {
        Command::Ask {
            question,
            search,
            json,
        } => {
            let search_client = reqwest::Client::builder()
                .build()
                .context("failed to build search HTTP client")?;
            let searcher = Arc::new(Searcher::new(
                search_client,
                settings.tavily_api_key.clone(),
                settings.brave_api_key.clone(),
            ));
            let council = Council::new(registry, searcher, Arc::clone(&settings));

            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    watcher.cancel();
                }
            });

            let mut events = council.deliberate(
                DeliberationRequest {
                    question,
                    use_search: search,
                },
                cancel,
            );
            while let Some(event) = events.next().await {
                print_event(&event, json);
            }
        }
        Command::Models { provider } => {
            let adapter = adapter_for(&registry, &provider)?;
            let models = adapter
                .list_models()
                .await
                .with_context(|| format!("failed to list {provider} models"))?;
            for model in models {
                println!("{}\t{}", model.id, model.name);
            }
        }
        Command::Check { provider } => {
            let tag = parse_tag(&provider)?;
            let adapter = adapter_for(&registry, &provider)?;
            let key = key_for(&settings, tag).unwrap_or_default();
            let validation = adapter.validate_key(&key).await;
            println!("{}", validation.message);
            if !validation.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn parse_tag(provider: &str) -> anyhow::Result<ProviderTag> {
    ProviderTag::parse(provider)
        .ok_or_else(|| anyhow::anyhow!("unknown provider '{provider}'"))
}

fn adapter_for(
    registry: &ProviderRegistry,
    provider: &str,
) -> anyhow::Result<Arc<dyn Provider>> {
    let tag = parse_tag(provider)?;
    registry
        .get(tag)
        .ok_or_else(|| anyhow::anyhow!("no adapter registered for '{provider}'"))
}

fn key_for(settings: &Settings, tag: ProviderTag) -> Option<String> {
    match tag {
        ProviderTag::Openai => settings.openai_api_key.clone(),
        ProviderTag::Anthropic => settings.anthropic_api_key.clone(),
        ProviderTag::Google => settings.google_api_key.clone(),
        ProviderTag::Mistral => settings.mistral_api_key.clone(),
        ProviderTag::Deepseek => settings.deepseek_api_key.clone(),
        ProviderTag::Openrouter => settings.openrouter_api_key.clone(),
        ProviderTag::Ollama => None,
    }
}

fn default_config_path() -> PathBuf {
    let local = PathBuf::from("conclave.toml");
    if local.exists() {
        return local;
    }
    directories::ProjectDirs::from("", "", "conclave")
        .map(|dirs| dirs.config_dir().join("conclave.toml"))
        .unwrap_or(local)
}

fn print_event(event: &CouncilEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    match event {
        CouncilEvent::SearchStarted { query } => {
            println!("Searching the web for: {query}");
        }
        CouncilEvent::SearchCompleted { context } => {
            println!("Search context gathered ({} chars)", context.chars().count());
        }
        CouncilEvent::Stage1Started { total_models } => {
            println!("Stage 1: querying {total_models} council models");
        }
        CouncilEvent::Stage1Completed { result } => match &result.error {
            None => println!(
                "  [stage1] {}: ok ({} chars)",
                result.model,
                result.response.as_deref().unwrap_or_default().chars().count()
            ),
            Some(error) => println!("  [stage1] {}: failed: {error}", result.model),
        },
        CouncilEvent::Stage1Done => println!("Stage 1 complete"),
        CouncilEvent::Stage2Started { label_to_model } => {
            println!("Stage 2: {} models ranking peer responses", label_to_model.len());
            for (label, model) in label_to_model {
                println!("  {label} -> {model}");
            }
        }
        CouncilEvent::Stage2Completed { result } => match &result.error {
            None => println!(
                "  [stage2] {}: parsed {} labels",
                result.model,
                result.parsed_ranking.len()
            ),
            Some(error) => println!("  [stage2] {}: failed: {error}", result.model),
        },
        CouncilEvent::Stage2Done => println!("Stage 2 complete"),
        CouncilEvent::RankingsAggregated { rankings } => {
            println!("Aggregate rankings (best first):");
            for (i, entry) in rankings.iter().enumerate() {
                println!(
                    "  {}. {} (avg {:.2} over {} rankings)",
                    i.saturating_add(1),
                    entry.model,
                    entry.average_rank,
                    entry.rankings_count
                );
            }
        }
        CouncilEvent::FinalSynthesis { result } => {
            if result.error {
                println!("\nChairman synthesis failed: {}", result.response);
            } else {
                println!("\n=== Final answer ({}) ===\n{}", result.model, result.response);
            }
        }
        CouncilEvent::Cancelled => println!("Deliberation cancelled."),
        CouncilEvent::Done => {}
    }
}
