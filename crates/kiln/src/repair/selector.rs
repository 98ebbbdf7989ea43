//! Turns predictions and distributions into committed repairs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cells::{ErrorCells, Repair};
use crate::cost::UpdateCostFunction;
use crate::error::Result;
use crate::input::DataTable;
use crate::model::Distribution;

use super::executor::Distributions;

/// Parameters for probability-based selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Weight `w` of the cost in `p / (1 + w * cost)`.
    pub cost_weight: f64,
    /// Keep at most this many candidates per cell.
    pub top_k: Option<usize>,
    /// Drop candidates below this probability.
    pub min_probability: Option<f64>,
    /// Floor for the current value's probability in likelihood ratios.
    pub epsilon: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            cost_weight: 1.0,
            top_k: None,
            min_probability: None,
            epsilon: 1e-6,
        }
    }
}

/// Cost-weighted candidate distribution for one error cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPmf {
    pub row_id: String,
    pub attribute: String,
    pub current_value: Option<String>,
    /// Model probability of the current value (0 when it is not a class).
    pub current_prob: f64,
    /// Candidates sorted by weighted probability, descending.
    pub pmf: Distribution,
}

/// A best candidate with its maximal-likelihood score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRepair {
    pub row_id: String,
    pub attribute: String,
    pub current_value: Option<String>,
    pub candidate: String,
    pub score: f64,
}

/// Result of delta-constrained selection.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodSelection {
    /// One entry per error cell: the candidate if selected, else the current value.
    pub repairs: Vec<Repair>,
    /// Number of cells whose candidate was selected.
    pub selected: usize,
    /// Score of the last kept repair, if any was kept.
    pub threshold: Option<f64>,
}

/// Converts executor output into repairs.
pub struct RepairSelector<'a> {
    cost: &'a dyn UpdateCostFunction,
    config: &'a SelectionConfig,
}

impl<'a> RepairSelector<'a> {
    /// Create a selector.
    pub fn new(cost: &'a dyn UpdateCostFunction, config: &'a SelectionConfig) -> Self {
        Self { cost, config }
    }

    /// Best guess for every error cell: the value the executor wrote.
    pub fn best_guess(repaired: &DataTable, cells: &ErrorCells, row_id: &str) -> Result<Vec<Repair>> {
        let id_col = repaired.require_column(row_id)?;
        let positions: std::collections::HashMap<&str, usize> = repaired
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row[id_col].as_deref().map(|id| (id, i)))
            .collect();

        cells
            .iter()
            .map(|cell| {
                let col = repaired.require_column(&cell.attribute)?;
                let value = positions
                    .get(cell.row_id.as_str())
                    .and_then(|&r| repaired.get(r, col))
                    .map(str::to_string);
                Ok(Repair::for_cell(cell, value))
            })
            .collect()
    }

    fn cost_of(&self, attribute: &str, current: Option<&str>, candidate: &str) -> f64 {
        self.cost
            .compute_for(attribute, current, Some(candidate))
            .unwrap_or(0.0)
    }

    /// Cost-weighted, renormalised distribution for every error cell that has one.
    pub fn pmf(&self, cells: &ErrorCells, distributions: &Distributions) -> Vec<RepairPmf> {
        cells
            .iter()
            .filter_map(|cell| {
                let dist = distributions.get(&(cell.row_id.clone(), cell.attribute.clone()))?;
                let current = cell.current_value.as_deref();
                let current_prob = current
                    .and_then(|cur| dist.iter().find(|(c, _)| c == cur))
                    .map_or(0.0, |(_, p)| *p);

                let weighted: Distribution = dist
                    .iter()
                    .map(|(candidate, p)| {
                        let cost = self.cost_of(&cell.attribute, current, candidate);
                        (candidate.clone(), p / (1.0 + self.config.cost_weight * cost))
                    })
                    .collect();
                let mut pmf = normalize(weighted).unwrap_or_else(|| dist.clone());
                pmf.sort_by(|a, b| b.1.total_cmp(&a.1));
                if let Some(k) = self.config.top_k {
                    pmf.truncate(k);
                }
                if let Some(min) = self.config.min_probability {
                    pmf.retain(|(_, p)| *p >= min);
                }

                Some(RepairPmf {
                    row_id: cell.row_id.clone(),
                    attribute: cell.attribute.clone(),
                    current_value: cell.current_value.clone(),
                    current_prob,
                    pmf,
                })
            })
            .collect()
    }

    /// Score the most likely candidate of every cell with a distribution.
    ///
    /// `score = ln(p(candidate) / max(p(current), eps)) / (1 + cost)`.
    pub fn score(&self, cells: &ErrorCells, distributions: &Distributions) -> Vec<ScoredRepair> {
        cells
            .iter()
            .filter_map(|cell| {
                let dist = distributions.get(&(cell.row_id.clone(), cell.attribute.clone()))?;
                let (candidate, p_candidate) = most_likely(dist)?;
                let current = cell.current_value.as_deref();
                let p_current = current
                    .and_then(|cur| dist.iter().find(|(c, _)| c == cur))
                    .map_or(0.0, |(_, p)| *p);
                let cost = self.cost_of(&cell.attribute, current, candidate);
                let score = (p_candidate / p_current.max(self.config.epsilon)).ln() / (1.0 + cost);
                Some(ScoredRepair {
                    row_id: cell.row_id.clone(),
                    attribute: cell.attribute.clone(),
                    current_value: cell.current_value.clone(),
                    candidate: candidate.to_string(),
                    score,
                })
            })
            .collect()
    }

    /// Keep the `delta` highest-scoring repairs; the rest keep their current value.
    ///
    /// The kept fraction is `min(1, delta / cells)`. Every repair scoring at
    /// least as high as the last kept one is also kept, so ties can push the
    /// count above `delta`.
    pub fn maximal_likelihood(
        &self,
        cells: &ErrorCells,
        distributions: &Distributions,
        delta: usize,
    ) -> LikelihoodSelection {
        let scored = self.score(cells, distributions);
        let num_cells = cells.len();
        let percent = if num_cells == 0 {
            0.0
        } else {
            (delta as f64 / num_cells as f64).min(1.0)
        };
        let keep = ((percent * num_cells as f64).round() as usize).min(scored.len());

        let mut scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
        scores.sort_by(|a, b| b.total_cmp(a));
        let threshold = keep.checked_sub(1).map(|i| scores[i]);

        let by_cell: HashMap<(&str, &str), &ScoredRepair> = scored
            .iter()
            .map(|s| ((s.row_id.as_str(), s.attribute.as_str()), s))
            .collect();

        let mut selected = 0;
        let repairs = cells
            .iter()
            .map(|cell| {
                let chosen = threshold.and_then(|theta| {
                    by_cell
                        .get(&(cell.row_id.as_str(), cell.attribute.as_str()))
                        .copied()
                        .filter(|s| s.score >= theta)
                });
                match chosen {
                    Some(s) => {
                        selected += 1;
                        Repair::for_cell(cell, Some(s.candidate.clone()))
                    }
                    None => Repair::for_cell(cell, cell.current_value.clone()),
                }
            })
            .collect();

        info!(
            "[Repairing Phase] {} repair updates (delta={}) selected among {} candidates...",
            selected, delta, num_cells
        );
        LikelihoodSelection {
            repairs,
            selected,
            threshold,
        }
    }
}

/// The highest-probability candidate; the first one wins ties.
fn most_likely(dist: &Distribution) -> Option<(&str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (c, p) in dist {
        if best.is_none_or(|(_, b)| *p > b) {
            best = Some((c.as_str(), *p));
        }
    }
    best
}

fn normalize(dist: Distribution) -> Option<Distribution> {
    let total: f64 = dist.iter().map(|(_, p)| p).sum();
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }
    Some(dist.into_iter().map(|(c, p)| (c, p / total)).collect())
}
