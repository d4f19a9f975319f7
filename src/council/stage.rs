//! Fan-out scheduler shared by Stage 1 and Stage 2.
//!
//! Every target model gets an independent task in a [`JoinSet`]; completions
//! are forwarded into a bounded channel in completion order, so the consumer
//! sees results as they happen and the producer cannot run ahead of it. The
//! driver selects over {next completion, cancellation, 1-second tick} and
//! aborts every pending task the moment cancellation is observed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::providers::registry::ProviderRegistry;
use crate::providers::{Message, Provider, QueryError, QueryOptions};

/// Interval at which the scheduler re-checks the cancellation signal.
pub(crate) const CANCEL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A completion or terminal marker from a fanned-out stage.
#[derive(Debug)]
pub(crate) enum FanOutItem {
    /// One model's query finished; failures are isolated into the outcome.
    Completed {
        /// The model that finished.
        model: String,
        /// Its query outcome.
        outcome: Result<String, QueryError>,
    },
    /// Every task has completed and been emitted.
    Drained,
    /// Cancellation was observed; all pending tasks were aborted.
    Cancelled,
}

/// Fan a single prompt out to `models`, streaming completions.
///
/// The returned channel has capacity 1: the driver does not advance past a
/// completed result until the consumer takes it. After `Cancelled` or
/// `Drained` nothing further is emitted.
pub(crate) fn spawn_queries(
    registry: Arc<ProviderRegistry>,
    models: Vec<String>,
    messages: Arc<Vec<Message>>,
    options: QueryOptions,
    cancel: CancellationToken,
) -> mpsc::Receiver<FanOutItem> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut tasks: JoinSet<(String, Result<String, QueryError>)> = JoinSet::new();
        for model in models {
            let registry = Arc::clone(&registry);
            let messages = Arc::clone(&messages);
            tasks.spawn(async move {
                let adapter = registry.resolve(&model);
                let outcome = adapter.query(&model, &messages, &options).await;
                (model, outcome)
            });
        }

        let mut tick = tokio::time::interval(CANCEL_POLL_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    let _ = tx.send(FanOutItem::Cancelled).await;
                    return;
                }
                _ = tick.tick() => {
                    // Wakeup only; the cancelled() arm above does the check.
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((model, outcome))) => {
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => {
                                tasks.abort_all();
                                let _ = tx.send(FanOutItem::Cancelled).await;
                                return;
                            }
                            sent = tx.send(FanOutItem::Completed { model, outcome }) => {
                                if sent.is_err() {
                                    // Consumer dropped the stream.
                                    tasks.abort_all();
                                    return;
                                }
                            }
                        }
                    }
                    Some(Err(join_err)) => {
                        if join_err.is_panic() {
                            warn!(error = %join_err, "stage query task panicked");
                        }
                    }
                    None => {
                        let _ = tx.send(FanOutItem::Drained).await;
                        return;
                    }
                }
            }
        }
    });

    rx
}
