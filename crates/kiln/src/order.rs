//! Inference order over target columns.
//!
//! The base order comes from one of three heuristics ([`InferenceOrder`]).
//! Once model strategies are known, [`resolve_dependencies`] moves every
//! functional-dependency column after its source so predictions written into
//! a row are available to later columns.

use std::fmt;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::AttrStats;
use crate::error::{KilnError, Result};

/// Heuristic used for the base order of target columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceOrder {
    /// Ascending by number of error cells.
    Error,
    /// Ascending by domain size over the training rows.
    Domain,
    /// Greedy descending by total correlation with the non-target columns.
    #[default]
    Entropy,
}

impl FromStr for InferenceOrder {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(InferenceOrder::Error),
            "domain" => Ok(InferenceOrder::Domain),
            "entropy" => Ok(InferenceOrder::Entropy),
            other => Err(KilnError::Config(format!(
                "Inference order must be `error`, `domain`, or `entropy`, but `{}` found",
                other
            ))),
        }
    }
}

impl fmt::Display for InferenceOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InferenceOrder::Error => "error",
            InferenceOrder::Domain => "domain",
            InferenceOrder::Entropy => "entropy",
        };
        f.write_str(name)
    }
}

/// Compute the base order of target columns.
///
/// `error_counts` lists every target with its number of error cells, in
/// first-seen order; `columns` lists every input column except the row id.
/// Ties always keep the first-seen column.
pub fn base_order(
    mode: InferenceOrder,
    error_counts: &IndexMap<String, usize>,
    columns: &[String],
    stats: &AttrStats,
) -> Vec<String> {
    let targets: Vec<&String> = error_counts.keys().collect();
    let order: Vec<String> = match mode {
        InferenceOrder::Error => {
            let mut sorted = targets.clone();
            sorted.sort_by_key(|t| error_counts[t.as_str()]);
            sorted.into_iter().cloned().collect()
        }
        InferenceOrder::Domain => {
            let mut sorted = targets.clone();
            sorted.sort_by_key(|t| stats.domain_size(t));
            sorted.into_iter().cloned().collect()
        }
        InferenceOrder::Entropy => correlation_order(&targets, columns, stats),
    };

    for (index, column) in order.iter().enumerate() {
        debug!(
            index,
            column = column.as_str(),
            errors = error_counts[column.as_str()],
            domain = stats.domain_size(column),
            "target column ordered ({})",
            mode
        );
    }
    order
}

/// Each round picks the remaining target with the highest total correlation to
/// the columns outside the remaining pool, then releases it as a feature.
fn correlation_order(targets: &[&String], columns: &[String], stats: &AttrStats) -> Vec<String> {
    let mut remaining: Vec<&String> = targets.to_vec();
    let mut order = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let features: Vec<&String> = columns.iter().filter(|c| !remaining.contains(c)).collect();
        let mut best: Option<(usize, f64)> = None;
        for (pos, target) in remaining.iter().enumerate() {
            let total: f64 = features
                .iter()
                .filter_map(|f| stats.correlation(target, f))
                .sum();
            if best.is_none_or(|(_, b)| total > b) {
                best = Some((pos, total));
            }
        }
        let Some((pos, total)) = best else { break };
        let picked = remaining.remove(pos);
        debug!(
            corr = total,
            target = picked.as_str(),
            features = features.len(),
            "picked next target by correlation"
        );
        order.push(picked.clone());
    }
    order
}

/// Reorder targets so every functional-dependency column follows its source.
///
/// Columns without a dependency keep their base order and come first. The
/// remaining columns are appended in passes; a pass that places nothing means
/// the dependencies form a cycle. At most one pass per column is needed.
pub fn resolve_dependencies(
    order: &[String],
    fd_sources: &IndexMap<String, String>,
) -> Result<Vec<String>> {
    let mut resolved: Vec<String> = order
        .iter()
        .filter(|c| !fd_sources.contains_key(c.as_str()))
        .cloned()
        .collect();
    let mut unresolved: IndexSet<&String> = order
        .iter()
        .filter(|c| fd_sources.contains_key(c.as_str()))
        .collect();

    let max_passes = unresolved.len();
    for _ in 0..max_passes {
        if unresolved.is_empty() {
            break;
        }
        let ready: Vec<&String> = unresolved
            .iter()
            .copied()
            .filter(|c| {
                fd_sources
                    .get(c.as_str())
                    .is_none_or(|src| !unresolved.iter().any(|u| *u == src))
            })
            .collect();
        if ready.is_empty() {
            break;
        }
        for column in ready {
            unresolved.shift_remove(&column);
            resolved.push(column.clone());
        }
    }

    if !unresolved.is_empty() {
        return Err(KilnError::DependencyCycle {
            unresolved: unresolved.into_iter().cloned().collect(),
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn counts(v: &[(&str, usize)]) -> IndexMap<String, usize> {
        v.iter().map(|(k, n)| (k.to_string(), *n)).collect()
    }

    fn stats() -> AttrStats {
        let mut stats = AttrStats::default();
        for (c, d) in [("a", 5), ("b", 2), ("c", 9), ("x", 3)] {
            stats.domain_sizes.insert(c.to_string(), d);
        }
        let pairs = |v: &[(&str, f64)]| v.iter().map(|(k, c)| (k.to_string(), *c)).collect();
        stats.pairwise.insert("a".into(), pairs(&[("b", 0.1), ("c", 0.0), ("x", 0.2)]));
        stats.pairwise.insert("b".into(), pairs(&[("a", 0.1), ("c", 0.9), ("x", 0.5)]));
        stats.pairwise.insert("c".into(), pairs(&[("a", 0.0), ("b", 0.9), ("x", 0.1)]));
        stats
    }

    #[test]
    fn test_parse_order() {
        assert_eq!("domain".parse::<InferenceOrder>().unwrap(), InferenceOrder::Domain);
        assert!(matches!(
            "random".parse::<InferenceOrder>(),
            Err(KilnError::Config(_))
        ));
        assert_eq!(InferenceOrder::default().to_string(), "entropy");
    }

    #[test]
    fn test_error_order_is_stable() {
        let errors = counts(&[("a", 3), ("b", 1), ("c", 3)]);
        let order = base_order(InferenceOrder::Error, &errors, &names(&["a", "b", "c", "x"]), &stats());
        assert_eq!(order, names(&["b", "a", "c"]));
    }

    #[test]
    fn test_domain_order() {
        let errors = counts(&[("a", 1), ("b", 1), ("c", 1)]);
        let order = base_order(InferenceOrder::Domain, &errors, &names(&["a", "b", "c", "x"]), &stats());
        assert_eq!(order, names(&["b", "a", "c"]));
    }

    #[test]
    fn test_entropy_order_greedy() {
        // Round 1 features = {x}: a=0.2, b=0.5, c=0.1 -> b
        // Round 2 features = {b, x}: a=0.3, c=1.0 -> c
        let errors = counts(&[("a", 1), ("b", 1), ("c", 1)]);
        let order = base_order(InferenceOrder::Entropy, &errors, &names(&["a", "b", "c", "x"]), &stats());
        assert_eq!(order, names(&["b", "c", "a"]));
    }

    #[test]
    fn test_entropy_ties_keep_first_seen() {
        let errors = counts(&[("p", 1), ("q", 1)]);
        let order = base_order(InferenceOrder::Entropy, &errors, &names(&["p", "q"]), &AttrStats::default());
        assert_eq!(order, names(&["p", "q"]));
    }

    #[test]
    fn test_resolve_dependencies() {
        let order = names(&["city", "state", "zip"]);
        let fds: IndexMap<String, String> = [
            ("city".to_string(), "zip".to_string()),
            ("state".to_string(), "city".to_string()),
        ]
        .into_iter()
        .collect();
        let resolved = resolve_dependencies(&order, &fds).unwrap();
        assert_eq!(resolved, names(&["zip", "city", "state"]));
    }

    #[test]
    fn test_non_target_source_resolves_immediately() {
        let fds: IndexMap<String, String> =
            [("city".to_string(), "zip".to_string())].into_iter().collect();
        let resolved = resolve_dependencies(&names(&["city", "age"]), &fds).unwrap();
        assert_eq!(resolved, names(&["age", "city"]));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let fds: IndexMap<String, String> = [
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "a".to_string()),
        ]
        .into_iter()
        .collect();
        match resolve_dependencies(&names(&["a", "b", "c"]), &fds) {
            Err(KilnError::DependencyCycle { unresolved }) => {
                assert_eq!(unresolved, names(&["a", "b"]))
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }
}
