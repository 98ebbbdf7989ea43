//! Fuzz target for probability-based repair selection.
//!
//! Checks that cost-weighted distributions stay normalised and that the
//! likelihood budget is never undershot, for arbitrary distributions.

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use kiln::cells::Cell;
use kiln::repair::{RepairSelector, SelectionConfig};
use kiln::{ErrorCells, Levenshtein};

#[derive(Debug, Arbitrary)]
struct Input {
    cells: Vec<(Option<String>, Vec<(String, u16)>)>,
    delta: u8,
}

fuzz_target!(|input: Input| {
    if input.cells.len() > 200 || input.delta == 0 {
        return;
    }

    let mut cells = Vec::new();
    let mut dists = HashMap::new();
    for (i, (current, weights)) in input.cells.into_iter().enumerate() {
        let total: f64 = weights.iter().map(|(_, w)| f64::from(*w) + 1.0).sum();
        if weights.is_empty() {
            continue;
        }
        let dist = weights
            .into_iter()
            .map(|(c, w)| (c, (f64::from(w) + 1.0) / total))
            .collect();
        dists.insert((i.to_string(), "attr".to_string()), dist);
        cells.push(Cell::new(i.to_string(), "attr", current));
    }
    let cells = ErrorCells::new(cells);

    let cost = Levenshtein::new();
    let config = SelectionConfig::default();
    let selector = RepairSelector::new(&cost, &config);

    for pmf in selector.pmf(&cells, &dists) {
        let total: f64 = pmf.pmf.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-6, "pmf sums to {}", total);
    }

    let delta = usize::from(input.delta);
    let selection = selector.maximal_likelihood(&cells, &dists, delta);
    assert_eq!(selection.repairs.len(), cells.len());
    assert!(selection.selected >= delta.min(cells.len()));
});
