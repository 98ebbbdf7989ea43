//! Property-based tests for the ordering and selection stages.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p kiln --test property_tests
//!
//! # Run with more cases (slower but more thorough)
//! PROPTEST_CASES=10000 cargo test -p kiln --test property_tests
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use proptest::prelude::*;

use kiln::cells::Cell;
use kiln::model::{ColumnModel, FunctionalDepModel, Prediction};
use kiln::order::{base_order, resolve_dependencies};
use kiln::repair::{Distributions, RepairSelector, SelectionConfig};
use kiln::{AttrStats, ErrorCells, InferenceOrder, Levenshtein};

// =============================================================================
// Test Strategies
// =============================================================================

/// Short categorical values.
fn value() -> impl Strategy<Value = String> {
    "[a-e]{1,4}"
}

/// Target columns with error counts, and an acyclic dependency map where a
/// column may only depend on a column listed before it.
fn targets_with_dependencies() -> impl Strategy<Value = (IndexMap<String, usize>, IndexMap<String, String>)> {
    (1usize..8)
        .prop_flat_map(|n| {
            (
                prop::collection::vec(1usize..20, n),
                prop::collection::vec(prop::option::of(0usize..8), n),
            )
        })
        .prop_map(|(counts, deps)| {
            let targets: IndexMap<String, usize> = counts
                .iter()
                .enumerate()
                .map(|(i, &c)| (format!("c{}", i), c))
                .collect();
            let fds = deps
                .iter()
                .enumerate()
                .filter_map(|(i, d)| {
                    d.filter(|&j| j < i)
                        .map(|j| (format!("c{}", i), format!("c{}", j)))
                })
                .collect();
            (targets, fds)
        })
}

/// One distribution per error cell, over a fixed candidate set.
fn cells_with_distributions() -> impl Strategy<Value = (ErrorCells, Distributions)> {
    prop::collection::vec((prop::option::of(value()), prop::collection::vec(0.0f64..1.0, 1..5)), 1..30)
        .prop_map(|rows| {
            let candidates = ["a", "bb", "ccc", "dddd", "e"];
            let mut cells = Vec::new();
            let mut dists = HashMap::new();
            for (i, (current, weights)) in rows.into_iter().enumerate() {
                let id = i.to_string();
                let total: f64 = weights.iter().sum::<f64>() + 1e-3;
                let dist = weights
                    .iter()
                    .enumerate()
                    .map(|(k, w)| (candidates[k].to_string(), (w + 1e-3 / weights.len() as f64) / total))
                    .collect();
                dists.insert((id.clone(), "attr".to_string()), dist);
                cells.push(Cell::new(id, "attr", current));
            }
            (ErrorCells::new(cells), dists)
        })
}

// =============================================================================
// Inference Order Properties
// =============================================================================

proptest! {
    /// The resolved order is a permutation of the targets.
    #[test]
    fn resolved_order_is_permutation((targets, fds) in targets_with_dependencies()) {
        let columns: Vec<String> = targets.keys().cloned().collect();
        let order = base_order(InferenceOrder::Error, &targets, &columns, &AttrStats::default());
        let resolved = resolve_dependencies(&order, &fds).unwrap();

        let mut a = resolved.clone();
        let mut b = columns.clone();
        a.sort();
        b.sort();
        prop_assert_eq!(a, b);
    }

    /// Every dependency source that is a target comes before its dependent.
    #[test]
    fn dependency_sources_come_first((targets, fds) in targets_with_dependencies()) {
        let columns: Vec<String> = targets.keys().cloned().collect();
        let order = base_order(InferenceOrder::Domain, &targets, &columns, &AttrStats::default());
        let resolved = resolve_dependencies(&order, &fds).unwrap();

        let position = |c: &str| resolved.iter().position(|x| x == c);
        for (target, source) in &fds {
            if let (Some(t), Some(s)) = (position(target), position(source)) {
                prop_assert!(s < t, "{} must precede {} in {:?}", source, target, resolved);
            }
        }
    }

    /// Error ordering sorts targets by ascending error count.
    #[test]
    fn error_order_is_ascending((targets, _) in targets_with_dependencies()) {
        let columns: Vec<String> = targets.keys().cloned().collect();
        let order = base_order(InferenceOrder::Error, &targets, &columns, &AttrStats::default());
        for pair in order.windows(2) {
            prop_assert!(targets[&pair[0]] <= targets[&pair[1]]);
        }
    }
}

// =============================================================================
// Column Model Properties
// =============================================================================

proptest! {
    /// A constant model ignores its features.
    #[test]
    fn constant_model_ignores_features(v in value(), features in prop::collection::vec(prop::option::of(value()), 0..5)) {
        let model = ColumnModel::constant(Some(v.clone()));
        let features: Vec<Option<&str>> = features.iter().map(|f| f.as_deref()).collect();
        prop_assert_eq!(model.predict(&features), Some(Prediction::Class(v)));
    }

    /// A dependency model puts all probability on the mapped value.
    #[test]
    fn functional_dependency_is_certain(pairs in prop::collection::vec((value(), value()), 1..30)) {
        let model = ColumnModel::FunctionalDep(FunctionalDepModel::fit(
            "src",
            pairs.iter().map(|(x, y)| (x.as_str(), y.as_str())),
        ));
        for (x, _) in &pairs {
            let dist = model.predict_proba(&[Some(x.as_str())]).unwrap();
            let max = dist.iter().map(|(_, p)| *p).fold(0.0, f64::max);
            prop_assert!((max - 1.0).abs() < 1e-12);
            let total: f64 = dist.iter().map(|(_, p)| p).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
        }
    }
}

// =============================================================================
// Selection Properties
// =============================================================================

proptest! {
    /// Cost-weighted distributions sum to one and are sorted descending.
    #[test]
    fn pmf_is_normalized((cells, dists) in cells_with_distributions()) {
        let cost = Levenshtein::new();
        let config = SelectionConfig::default();
        let selector = RepairSelector::new(&cost, &config);

        let pmfs = selector.pmf(&cells, &dists);
        prop_assert_eq!(pmfs.len(), cells.len());
        for pmf in pmfs {
            let total: f64 = pmf.pmf.iter().map(|(_, p)| p).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            for pair in pmf.pmf.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
            }
        }
    }

    /// The budget is met exactly unless scores tie at the threshold.
    #[test]
    fn likelihood_selection_respects_budget((cells, dists) in cells_with_distributions(), delta in 1usize..40) {
        let cost = Levenshtein::new();
        let config = SelectionConfig::default();
        let selector = RepairSelector::new(&cost, &config);

        let selection = selector.maximal_likelihood(&cells, &dists, delta);
        let expected = delta.min(cells.len());
        prop_assert_eq!(selection.repairs.len(), cells.len());
        prop_assert!(selection.selected >= expected);

        let scores = selector.score(&cells, &dists);
        let threshold = selection.threshold.unwrap();
        let at_or_above = scores.iter().filter(|s| s.score >= threshold).count();
        prop_assert_eq!(selection.selected, at_or_above);
        let strictly_above = scores.iter().filter(|s| s.score > threshold).count();
        prop_assert!(strictly_above < expected);
    }
}
