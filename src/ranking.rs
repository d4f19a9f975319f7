//! Ranking parser and consensus aggregator.
//!
//! Stage 2 models are told to end their evaluation with a `FINAL RANKING:`
//! block, but free-form output drifts. [`parse_ranking`] recovers an ordered
//! label list from whatever came back; [`aggregate_rankings`] turns the
//! per-model lists into a mean-rank consensus.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::council::Stage2Result;

/// Sentinel line the Stage 2 prompt mandates.
const RANKING_SENTINEL: &str = "FINAL RANKING:";

/// Letters available for anonymising labels, in assignment order.
const LABEL_LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// The anonymising label for a 0-based position, `Response A` onwards.
///
/// Returns `None` past position 25; the protocol only anonymises with a
/// single uppercase letter.
pub fn label_for(index: usize) -> Option<String> {
    LABEL_LETTERS
        .get(index)
        .map(|letter| format!("Response {}", char::from(*letter)))
}

/// Build the label → model bijection from successful Stage 1 models.
///
/// The input order is the original council order, so labels are assigned
/// deterministically regardless of Stage 1 arrival order. Models past the
/// 26-label alphabet are excluded (and logged by the caller).
pub fn assign_labels(successful_models: &[String]) -> BTreeMap<String, String> {
    successful_models
        .iter()
        .enumerate()
        .filter_map(|(index, model)| label_for(index).map(|label| (label, model.clone())))
        .collect()
}

/// Extract an ordered list of `Response X` labels from free-form text.
///
/// Looks after the first `FINAL RANKING:` occurrence when present, prefers
/// numbered entries (`1. Response A`), and falls back to bare label
/// occurrences in textual order. Duplicates are preserved; validating labels
/// against the known mapping is the aggregator's job.
pub fn parse_ranking(text: &str) -> Vec<String> {
    let region = match text.split_once(RANKING_SENTINEL) {
        Some((_, suffix)) => suffix,
        None => text,
    };

    let Ok(label_re) = Regex::new(r"Response [A-Z]") else {
        return Vec::new();
    };

    if let Ok(numbered_re) = Regex::new(r"\d+\.\s*Response [A-Z]") {
        let numbered: Vec<String> = numbered_re
            .find_iter(region)
            .filter_map(|m| label_re.find(m.as_str()).map(|l| l.as_str().to_owned()))
            .collect();
        if !numbered.is_empty() {
            return numbered;
        }
    }

    label_re
        .find_iter(region)
        .map(|m| m.as_str().to_owned())
        .collect()
}

/// A model's consensus standing across all peer rankings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRanking {
    /// Council model identifier.
    pub model: String,
    /// Mean 1-based position, rounded to two decimal places. Lower is
    /// better.
    pub average_rank: f64,
    /// How many ranking positions contributed to the mean.
    pub rankings_count: usize,
}

/// Compute mean rank per model from parsed Stage 2 rankings.
///
/// Positions are 1-based within each ranking. Labels outside the mapping
/// are ignored; models absent from every ranking are excluded. The output
/// is sorted by ascending mean rank with the model identifier as
/// tie-breaker.
pub fn aggregate_rankings(
    stage2_results: &[Stage2Result],
    label_to_model: &BTreeMap<String, String>,
) -> Vec<AggregateRanking> {
    let mut positions: HashMap<&str, Vec<u32>> = HashMap::new();

    for result in stage2_results {
        for (index, label) in result.parsed_ranking.iter().enumerate() {
            if let Some(model) = label_to_model.get(label) {
                if let Ok(position) = u32::try_from(index.saturating_add(1)) {
                    positions.entry(model.as_str()).or_default().push(position);
                }
            }
        }
    }

    let mut aggregate: Vec<AggregateRanking> = positions
        .into_iter()
        .filter(|(_, positions)| !positions.is_empty())
        .map(|(model, positions)| {
            let sum: f64 = positions.iter().map(|p| f64::from(*p)).sum();
            let count = f64::from(u32::try_from(positions.len()).unwrap_or(u32::MAX));
            let average = sum / count;
            AggregateRanking {
                model: model.to_owned(),
                average_rank: (average * 100.0).round() / 100.0,
                rankings_count: positions.len(),
            }
        })
        .collect();

    aggregate.sort_by(|a, b| {
        a.average_rank
            .total_cmp(&b.average_rank)
            .then_with(|| a.model.cmp(&b.model))
    });

    aggregate
}
