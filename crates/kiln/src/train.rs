//! Model training orchestration.
//!
//! For every target column the trainer picks a strategy, then builds the
//! column model:
//!
//! 1. at most one distinct training value: a [`ConstantModel`](crate::model::ConstantModel);
//! 2. a functional-dependency source with a small domain: a lookup table;
//! 3. otherwise a gradient-boosted model over selected, encoded features.
//!
//! Statistical models are independent of each other once the feature lists
//! are fixed, so they can be fitted concurrently on a bounded rayon pool. Each
//! column samples with its own seeded generator, so serial and parallel runs
//! produce the same models.

use std::path::Path;
use std::time::Instant;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{AttrStats, FunctionalDeps};
use crate::error::{KilnError, Result};
use crate::input::DataTable;
use crate::model::rebalance::class_count_std;
use crate::model::{
    BoostingParams, ColumnModel, FeatureKind, FunctionalDepModel, GbdtClassifier, GbdtRegressor,
    Predictor, Rebalance, StatisticalModel, transform,
};
use crate::order::resolve_dependencies;
use crate::schema::TableSchema;

/// Training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Rows per column above which training data is sampled down.
    pub max_training_rows: usize,
    /// Feature ceiling; `None` keeps every available feature.
    pub max_training_column_num: Option<usize>,
    /// Discrete features with fewer distinct values are sum-coded.
    pub small_domain_threshold: usize,
    /// Functional-dependency sources must have a smaller domain than this.
    pub max_fd_domain_size: usize,
    /// Class rebalancing for discrete targets.
    pub rebalance: Rebalance,
    /// Fit statistical models concurrently.
    pub parallel: bool,
    /// Seed for training-row sampling.
    pub seed: u64,
    /// Gradient boosting hyper-parameters.
    pub boosting: BoostingParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_training_rows: 100_000,
            max_training_column_num: None,
            small_domain_threshold: 12,
            max_fd_domain_size: 80,
            rebalance: Rebalance::Balanced,
            parallel: false,
            seed: 42,
            boosting: BoostingParams::default(),
        }
    }
}

/// How a target column is modeled.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// No training: the single known value, or nothing.
    Constant(Option<String>),
    /// Lookup from the named source column.
    FunctionalDep(String),
    /// Trained learner.
    Statistical,
}

/// Per-column record of how its model was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDiagnostics {
    /// Target column.
    pub column: String,
    /// Model kind that was produced.
    pub strategy: String,
    /// Training accuracy (classifiers) or R² (regressors).
    pub score: Option<f64>,
    /// Wall-clock fitting time in seconds.
    pub elapsed_secs: f64,
    /// Rows the model was fitted on.
    pub rows: usize,
    /// Standard deviation of class counts (classifiers only).
    pub class_count_std: Option<f64>,
    /// Features the model reads.
    pub features: Vec<String>,
    /// Whether fitting failed and a constant fallback was substituted.
    pub fallback: bool,
}

/// Trained models for every target column, in inference order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainedModels {
    /// Final inference order.
    pub order: Vec<String>,
    /// Model per target column.
    pub models: IndexMap<String, ColumnModel>,
    /// Training diagnostics, in inference order.
    pub diagnostics: Vec<TrainingDiagnostics>,
}

impl TrainedModels {
    /// Model for a column.
    pub fn get(&self, column: &str) -> Option<&ColumnModel> {
        self.models.get(column)
    }

    /// Iterate `(column, model)` in inference order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnModel)> {
        self.order
            .iter()
            .filter_map(|c| self.models.get(c).map(|m| (c.as_str(), m)))
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no models were trained.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Save as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).map_err(|e| KilnError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load from JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| KilnError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

struct StatisticalJob {
    column: String,
    position: usize,
    features: Vec<String>,
}

struct FitSummary {
    rows: usize,
    score: Option<f64>,
    class_count_std: Option<f64>,
}

/// Trains column models over the clean training rows.
pub struct ModelTrainer<'a> {
    table: &'a DataTable,
    schema: &'a TableSchema,
    stats: &'a AttrStats,
    fds: Option<&'a FunctionalDeps>,
    row_id: &'a str,
    config: &'a TrainingConfig,
}

impl<'a> ModelTrainer<'a> {
    /// Create a trainer over `table` (the training rows).
    pub fn new(
        table: &'a DataTable,
        schema: &'a TableSchema,
        stats: &'a AttrStats,
        row_id: &'a str,
        config: &'a TrainingConfig,
    ) -> Self {
        Self {
            table,
            schema,
            stats,
            fds: None,
            row_id,
            config,
        }
    }

    /// Use functional dependencies for rule-based models.
    pub fn with_functional_deps(mut self, fds: &'a FunctionalDeps) -> Self {
        self.fds = Some(fds);
        self
    }

    /// Pick the modeling strategy for one target column.
    pub fn choose_strategy(&self, column: &str) -> Result<Strategy> {
        let col = self.table.require_column(column)?;
        let distinct = self.table.distinct_values(col);
        if distinct.len() <= 1 {
            return Ok(Strategy::Constant(distinct.first().map(|v| v.to_string())));
        }

        let source = self.fds.and_then(|fds| {
            fds.sources(column).iter().find(|source| {
                source.as_str() != column
                    && source.as_str() != self.row_id
                    && self.table.column_index(source).is_some()
                    && self.stats.domain_size(source) < self.config.max_fd_domain_size
            })
        });
        Ok(match source {
            Some(source) => Strategy::FunctionalDep(source.clone()),
            None => Strategy::Statistical,
        })
    }

    /// Features available to a statistical model for `column`: every
    /// non-target column, plus targets placed earlier in `order`.
    pub fn available_features(&self, column: &str, order: &[String]) -> Vec<String> {
        let position = order.iter().position(|c| c == column).unwrap_or(order.len());
        let earlier = &order[..position];
        self.table
            .headers
            .iter()
            .filter(|h| h.as_str() != self.row_id && h.as_str() != column)
            .filter(|h| !order.contains(*h) || earlier.contains(*h))
            .cloned()
            .collect()
    }

    /// Keep the most correlated features when there are more than the ceiling.
    ///
    /// At least two features are always kept; ties keep table order.
    pub fn select_features(&self, column: &str, features: Vec<String>) -> Vec<String> {
        let Some(ceiling) = self.config.max_training_column_num else {
            return features;
        };
        if features.len() <= ceiling || !self.stats.has_correlations(column) {
            return features;
        }

        let keep = ceiling.max(2);
        let mut ranked: Vec<(usize, f64)> = features
            .iter()
            .enumerate()
            .map(|(i, f)| (i, self.stats.correlation(column, f).unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let selected: Vec<String> = ranked
            .into_iter()
            .take(keep)
            .map(|(i, _)| features[i].clone())
            .collect();
        debug!(
            "Select {} relevant features ({}) from available ones ({})",
            selected.len(),
            selected.join(","),
            features.join(",")
        );
        selected
    }

    /// Train a model for every target, starting from the base order.
    pub fn train(&self, base_order: &[String]) -> Result<TrainedModels> {
        let start = Instant::now();

        let mut strategies: IndexMap<String, Strategy> = IndexMap::new();
        for column in base_order {
            strategies.insert(column.clone(), self.choose_strategy(column)?);
        }
        let fd_sources: IndexMap<String, String> = strategies
            .iter()
            .filter_map(|(c, s)| match s {
                Strategy::FunctionalDep(src) => Some((c.clone(), src.clone())),
                _ => None,
            })
            .collect();
        let order = resolve_dependencies(base_order, &fd_sources)?;

        info!(
            "[Repair Model Training Phase] Building {} models to repair the error cells...",
            order.len()
        );

        let mut jobs = Vec::new();
        let mut models: IndexMap<String, ColumnModel> = IndexMap::new();
        let mut diagnostics: IndexMap<String, TrainingDiagnostics> = IndexMap::new();
        for (position, column) in order.iter().enumerate() {
            match &strategies[column.as_str()] {
                Strategy::Constant(value) => {
                    if value.is_none() {
                        warn!(column = column.as_str(), "no known values in training rows");
                    }
                    let model = ColumnModel::constant(value.clone());
                    diagnostics.insert(column.clone(), self.cheap_diagnostics(column, &model));
                    models.insert(column.clone(), model);
                }
                Strategy::FunctionalDep(source) => {
                    let model = ColumnModel::FunctionalDep(self.fit_functional_dep(column, source)?);
                    debug!(
                        column = column.as_str(),
                        source = source.as_str(),
                        "functional dependency model"
                    );
                    diagnostics.insert(column.clone(), self.cheap_diagnostics(column, &model));
                    models.insert(column.clone(), model);
                }
                Strategy::Statistical => {
                    let features = self.available_features(column, &order);
                    let features = self.select_features(column, features);
                    jobs.push(StatisticalJob {
                        column: column.clone(),
                        position,
                        features,
                    });
                }
            }
        }

        let fitted: Vec<(ColumnModel, TrainingDiagnostics)> = if self.config.parallel && jobs.len() > 1 {
            let units = jobs.len().min(rayon::current_num_threads()).max(1);
            debug!(units, columns = jobs.len(), "training statistical models in parallel");
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(units)
                .build()
                .map_err(|e| KilnError::Config(format!("cannot build training pool: {}", e)))?;
            pool.install(|| jobs.par_iter().map(|job| self.train_statistical(job)).collect())
        } else {
            jobs.iter().map(|job| self.train_statistical(job)).collect()
        };
        for (job, (model, diag)) in jobs.iter().zip(fitted) {
            models.insert(job.column.clone(), model);
            diagnostics.insert(job.column.clone(), diag);
        }

        // Restore inference order in the merged maps
        let models: IndexMap<String, ColumnModel> = order
            .iter()
            .filter_map(|c| models.shift_remove(c).map(|m| (c.clone(), m)))
            .collect();
        let diagnostics: Vec<TrainingDiagnostics> = order
            .iter()
            .filter_map(|c| diagnostics.shift_remove(c))
            .collect();

        info!(
            elapsed = start.elapsed().as_secs_f64(),
            "[Repair Model Training Phase] {} models built",
            models.len()
        );
        Ok(TrainedModels {
            order,
            models,
            diagnostics,
        })
    }

    fn cheap_diagnostics(&self, column: &str, model: &ColumnModel) -> TrainingDiagnostics {
        let rows = self
            .table
            .column_index(column)
            .map_or(0, |c| self.table.column_values(c).flatten().count());
        TrainingDiagnostics {
            column: column.to_string(),
            strategy: model.kind().to_string(),
            score: None,
            elapsed_secs: 0.0,
            rows,
            class_count_std: None,
            features: model.features().into_iter().map(str::to_string).collect(),
            fallback: false,
        }
    }

    fn fit_functional_dep(&self, column: &str, source: &str) -> Result<FunctionalDepModel> {
        let y = self.table.require_column(column)?;
        let x = self.table.require_column(source)?;
        let pairs = self
            .table
            .rows
            .iter()
            .filter_map(|row| Some((row[x].as_deref()?, row[y].as_deref()?)));
        Ok(FunctionalDepModel::fit(source, pairs))
    }

    fn train_statistical(&self, job: &StatisticalJob) -> (ColumnModel, TrainingDiagnostics) {
        let start = Instant::now();
        let continuous = self.schema.is_continuous(&job.column);
        let seed = self.config.seed.wrapping_add(job.position as u64);

        let (model, summary, fallback) = match self.fit_statistical(&job.column, &job.features, continuous, seed) {
            Ok((model, summary)) => (ColumnModel::Statistical(model), summary, false),
            Err(e) => {
                let value = self.most_frequent_value(&job.column);
                warn!(
                    column = job.column.as_str(),
                    error = %e,
                    fallback = value.as_deref().unwrap_or("<null>"),
                    "model fit failed, substituting a constant model"
                );
                let summary = FitSummary {
                    rows: 0,
                    score: None,
                    class_count_std: None,
                };
                (ColumnModel::constant(value), summary, true)
            }
        };

        let elapsed = start.elapsed().as_secs_f64();
        debug!(
            "{}[{}]: #features={}, y({})<=X({}) in {:.3}s",
            if continuous { "Regressor" } else { "Classifier" },
            job.position,
            job.features.len(),
            job.column,
            job.features.join(","),
            elapsed
        );

        let diagnostics = TrainingDiagnostics {
            column: job.column.clone(),
            strategy: model.kind().to_string(),
            score: summary.score,
            elapsed_secs: elapsed,
            rows: summary.rows,
            class_count_std: summary.class_count_std,
            features: job.features.clone(),
            fallback,
        };
        (model, diagnostics)
    }

    fn fit_statistical(
        &self,
        column: &str,
        features: &[String],
        continuous: bool,
        seed: u64,
    ) -> Result<(StatisticalModel, FitSummary)> {
        let y_col = self.table.require_column(column)?;
        let feature_cols = features
            .iter()
            .map(|f| self.table.require_column(f))
            .collect::<Result<Vec<_>>>()?;

        let mut rows: Vec<&Vec<Option<String>>> = self
            .table
            .rows
            .iter()
            .filter(|row| row[y_col].is_some())
            .collect();
        if rows.len() > self.config.max_training_rows {
            let total = rows.len();
            rows = sample_rows(rows, self.config.max_training_rows, seed);
            debug!(column, rows = rows.len(), total, "sampled training rows");
        }
        if rows.is_empty() {
            return Err(KilnError::ModelFit(format!("no training rows for '{}'", column)));
        }

        let raw: Vec<Vec<Option<&str>>> = rows
            .iter()
            .map(|row| feature_cols.iter().map(|&c| row[c].as_deref()).collect())
            .collect();
        let kinds: Vec<FeatureKind> = features
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if self.schema.is_continuous(f) {
                    FeatureKind::Continuous
                } else {
                    let domain_size = match self.stats.domain_size(f) {
                        0 => distinct_count(raw.iter().map(|r| r[i])),
                        d => d,
                    };
                    FeatureKind::Discrete { domain_size }
                }
            })
            .collect();
        let transforms = transform::fit_transforms(&kinds, &raw, self.config.small_domain_threshold);
        let encoded: Vec<Vec<f64>> = raw.iter().map(|r| transform::encode(&transforms, r)).collect();
        let targets: Vec<&str> = rows.iter().filter_map(|row| row[y_col].as_deref()).collect();
        let params = &self.config.boosting;

        let (predictor, summary) = if continuous {
            let (x, y): (Vec<Vec<f64>>, Vec<f64>) = encoded
                .into_iter()
                .zip(&targets)
                .filter_map(|(x, t)| t.trim().parse::<f64>().ok().map(|v| (x, v)))
                .unzip();
            let model = GbdtRegressor::fit(&x, &y, &vec![1.0; y.len()], params)?;
            let score = r_squared(&y, x.iter().map(|row| model.predict(row)));
            let summary = FitSummary {
                rows: y.len(),
                score,
                class_count_std: None,
            };
            (Predictor::Regressor { model }, summary)
        } else {
            let mut classes: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
            classes.sort();
            classes.dedup();
            let labels: Vec<usize> = targets
                .iter()
                .map(|t| classes.binary_search_by(|c| c.as_str().cmp(t)).unwrap_or(0))
                .collect();
            let weights = self.config.rebalance.sample_weights(&labels, classes.len());
            let model = GbdtClassifier::fit(&encoded, &labels, classes.len(), &weights, params)?;
            let correct = encoded
                .iter()
                .zip(&labels)
                .filter(|(x, label)| model.predict(x) == **label)
                .count();
            let summary = FitSummary {
                rows: labels.len(),
                score: Some(correct as f64 / labels.len() as f64),
                class_count_std: Some(class_count_std(&labels, classes.len())),
            };
            (Predictor::Classifier { classes, model }, summary)
        };

        Ok((
            StatisticalModel {
                predictor,
                features: features.to_vec(),
                transforms,
            },
            summary,
        ))
    }

    /// Most frequent known value of a column, first seen on ties.
    fn most_frequent_value(&self, column: &str) -> Option<String> {
        let col = self.table.column_index(column)?;
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for value in self.table.column_values(col).flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }
        let mut best: Option<(&str, usize)> = None;
        for (value, n) in counts {
            if best.is_none_or(|(_, b)| n > b) {
                best = Some((value, n));
            }
        }
        best.map(|(v, _)| v.to_string())
    }
}

fn distinct_count<'v>(values: impl Iterator<Item = Option<&'v str>>) -> usize {
    let mut seen = std::collections::HashSet::new();
    values.flatten().filter(|v| seen.insert(*v)).count()
}

fn r_squared(y: &[f64], predictions: impl Iterator<Item = f64>) -> Option<f64> {
    if y.is_empty() {
        return None;
    }
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let total: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let residual: f64 = y.iter().zip(predictions).map(|(v, p)| (v - p).powi(2)).sum();
    if total <= 0.0 {
        return None;
    }
    let score = 1.0 - residual / total;
    score.is_finite().then_some(score)
}

/// Exactly `ceiling` rows drawn without replacement, kept in table order.
fn sample_rows<T>(rows: Vec<T>, ceiling: usize, seed: u64) -> Vec<T> {
    if rows.len() <= ceiling {
        return rows;
    }
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    for i in 0..ceiling {
        let j = rng.usize(i..indices.len());
        indices.swap(i, j);
    }
    indices.truncate(ceiling);
    indices.sort_unstable();

    let mut keep = vec![false; rows.len()];
    for i in indices {
        keep[i] = true;
    }
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, k)| k.then_some(row))
        .collect()
}
