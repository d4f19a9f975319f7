//! Conclave — a three-stage LLM council deliberation engine.
//!
//! A question is fanned out to a council of models (Stage 1), the successful
//! members rank each other's anonymised answers (Stage 2), and a chairman
//! model synthesises the final reply from all responses and rankings
//! (Stage 3). An optional web-search pass gathers real-time context that is
//! injected into Stage 1.
//!
//! Module map:
//! - [`providers`] — uniform query contract over heterogeneous LLM APIs and
//!   the registry that routes model identifiers to adapters
//! - [`council`] — the stage scheduler and the deliberation orchestrator
//! - [`ranking`] — free-form ranking parser and consensus aggregator
//! - [`search`] — budgeted web-search context acquisition
//! - [`config`] / [`prompts`] / [`logging`] — settings, prompt templates,
//!   and tracing setup

pub mod config;
pub mod council;
pub mod logging;
pub mod prompts;
pub mod providers;
pub mod ranking;
pub mod search;
