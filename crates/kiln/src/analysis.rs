//! Domain analysis: per-column domain sizes, pairwise attribute correlation,
//! and functional-dependency facts.
//!
//! Results of this module are treated as trusted input by the training
//! orchestrator. Callers holding externally computed statistics can build an
//! [`AttrStats`] directly and skip [`DomainAnalyzer`] entirely.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KilnError, Result};
use crate::input::DataTable;
use crate::schema::TableSchema;

/// Per-column statistics over the training rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttrStats {
    /// Number of distinct non-null values per column.
    pub domain_sizes: IndexMap<String, usize>,
    /// For each column, its correlation with every other column, in table order.
    pub pairwise: IndexMap<String, Vec<(String, f64)>>,
}

impl AttrStats {
    /// Domain size of a column (zero when unknown).
    pub fn domain_size(&self, column: &str) -> usize {
        self.domain_sizes.get(column).copied().unwrap_or(0)
    }

    /// Correlation between two columns, if known.
    pub fn correlation(&self, column: &str, other: &str) -> Option<f64> {
        self.pairwise
            .get(column)?
            .iter()
            .find(|(name, _)| name == other)
            .map(|(_, corr)| *corr)
    }

    /// Whether a correlation ranking exists for a column.
    pub fn has_correlations(&self, column: &str) -> bool {
        self.pairwise.get(column).is_some_and(|v| !v.is_empty())
    }
}

/// Functional dependency facts: target column → columns that determine it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionalDeps(IndexMap<String, Vec<String>>);

impl FunctionalDeps {
    /// No dependencies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` determines `target`.
    pub fn with(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.insert(source, target);
        self
    }

    /// Record that `source` determines `target`.
    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        let source = source.into();
        let sources = self.0.entry(target.into()).or_default();
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    /// Candidate sources for a target, in insertion order.
    pub fn sources(&self, target: &str) -> &[String] {
        self.0.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any dependency is recorded.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Load dependencies from a JSON object of `target -> [sources]`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| KilnError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Computes [`AttrStats`] from a table.
#[derive(Debug, Clone)]
pub struct DomainAnalyzer {
    /// Discrete columns with more distinct values than this get no correlations.
    discrete_threshold: usize,
    /// Equal-width bins used to discretise continuous columns.
    num_bins: usize,
}

impl DomainAnalyzer {
    /// Create an analyzer with the given discrete-domain ceiling.
    pub fn new(discrete_threshold: usize) -> Self {
        Self {
            discrete_threshold,
            num_bins: 10,
        }
    }

    /// Set the number of bins for continuous columns.
    pub fn with_bins(mut self, num_bins: usize) -> Self {
        self.num_bins = num_bins.max(1);
        self
    }

    /// Analyze every column of `table` except `row_id`.
    pub fn analyze(&self, table: &DataTable, schema: &TableSchema, row_id: &str) -> AttrStats {
        let columns: Vec<(usize, &str)> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, name)| name.as_str() != row_id)
            .map(|(idx, name)| (idx, name.as_str()))
            .collect();

        let mut domain_sizes = IndexMap::new();
        let mut codes: Vec<Option<Vec<Option<usize>>>> = Vec::with_capacity(columns.len());
        for &(idx, name) in &columns {
            let domain = table.distinct_values(idx).len();
            domain_sizes.insert(name.to_string(), domain);

            let encoded = if schema.is_continuous(name) {
                Some(self.bin_continuous(table, idx))
            } else if domain <= self.discrete_threshold {
                Some(encode_discrete(table, idx))
            } else {
                None
            };
            codes.push(encoded);
        }

        let mut pairwise: IndexMap<String, Vec<(String, f64)>> = IndexMap::new();
        for (i, &(_, name)) in columns.iter().enumerate() {
            let row: Vec<(String, f64)> = columns
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, &(_, other))| {
                    let corr = match (&codes[i], &codes[j]) {
                        (Some(a), Some(b)) => normalized_mutual_information(a, b),
                        _ => 0.0,
                    };
                    (other.to_string(), corr)
                })
                .collect();
            pairwise.insert(name.to_string(), row);
        }

        debug!(
            columns = columns.len(),
            rows = table.row_count(),
            "computed domain sizes and pairwise attribute stats"
        );

        AttrStats {
            domain_sizes,
            pairwise,
        }
    }

    fn bin_continuous(&self, table: &DataTable, col: usize) -> Vec<Option<usize>> {
        let values: Vec<Option<f64>> = table
            .column_values(col)
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect();
        let (min, max) = values
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let width = max - min;

        values
            .into_iter()
            .map(|v| {
                v.map(|v| {
                    if width <= 0.0 {
                        0
                    } else {
                        (((v - min) / width) * self.num_bins as f64)
                            .floor()
                            .clamp(0.0, (self.num_bins - 1) as f64) as usize
                    }
                })
            })
            .collect()
    }
}

fn encode_discrete(table: &DataTable, col: usize) -> Vec<Option<usize>> {
    let mut dictionary: HashMap<&str, usize> = HashMap::new();
    table
        .column_values(col)
        .map(|v| {
            v.map(|s| {
                let next = dictionary.len();
                *dictionary.entry(s).or_insert(next)
            })
        })
        .collect()
}

fn entropy(counts: impl Iterator<Item = usize>, total: f64) -> f64 {
    counts
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum()
}

/// Mutual information normalised by the geometric mean of the marginal entropies.
///
/// Only rows where both values are present contribute. Returns 0.0 when either
/// side is constant.
pub fn normalized_mutual_information(a: &[Option<usize>], b: &[Option<usize>]) -> f64 {
    let mut joint: HashMap<(usize, usize), usize> = HashMap::new();
    let mut left: HashMap<usize, usize> = HashMap::new();
    let mut right: HashMap<usize, usize> = HashMap::new();
    let mut total = 0usize;
    for (x, y) in a.iter().zip(b) {
        if let (Some(x), Some(y)) = (x, y) {
            *joint.entry((*x, *y)).or_insert(0) += 1;
            *left.entry(*x).or_insert(0) += 1;
            *right.entry(*y).or_insert(0) += 1;
            total += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }

    let n = total as f64;
    let ha = entropy(left.values().copied(), n);
    let hb = entropy(right.values().copied(), n);
    if ha <= 0.0 || hb <= 0.0 {
        return 0.0;
    }
    let hab = entropy(joint.values().copied(), n);
    let mi = (ha + hb - hab).max(0.0);
    (mi / (ha * hb).sqrt()).clamp(0.0, 1.0)
}
