//! Main repair model and public API.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::{AttrStats, DomainAnalyzer, FunctionalDeps};
use crate::cells::{ErrorCells, Repair, apply_repairs};
use crate::context::{RunContext, Snapshot};
use crate::cost::{Levenshtein, UpdateCostFunction};
use crate::error::{KilnError, Result};
use crate::input::DataTable;
use crate::order::{InferenceOrder, base_order};
use crate::repair::{
    LikelihoodSelection, RepairExecutor, RepairPmf, RepairSelector, RuleConfig, RuleRepairer,
    SelectionConfig,
};
use crate::schema::TableSchema;
use crate::train::{ModelTrainer, TrainedModels, TrainingConfig};

/// What a run produces. Exactly one mode per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMode {
    /// Cells whose best-guess repair differs from the current value.
    #[default]
    Candidates,
    /// Cost-weighted candidate distribution per error cell.
    Pmf,
    /// Best-guess repairs limited to the `repair_delta` most likely ones.
    MaximalLikelihood,
    /// The whole input table with repairs written in.
    Data,
    /// Value counts of each target column over the clean rows.
    Histogram,
}

impl fmt::Display for RepairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairMode::Candidates => "candidates",
            RepairMode::Pmf => "pmf",
            RepairMode::MaximalLikelihood => "maximal_likelihood",
            RepairMode::Data => "data",
            RepairMode::Histogram => "histogram",
        };
        f.write_str(name)
    }
}

/// Configuration for a repair run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Column uniquely identifying rows. Required.
    pub row_id: Option<String>,
    /// Numeric columns to treat as discrete.
    pub discrete_columns: Vec<String>,
    /// Discrete columns with larger domains get no correlation statistics.
    pub discrete_threshold: usize,
    /// Training rows must exceed this fraction of input rows.
    pub min_training_row_ratio: f64,
    /// Fraction of clean rows sampled for training.
    pub training_data_sample_ratio: f64,
    /// `error`, `domain` or `entropy`.
    pub inference_order: String,
    /// Output mode.
    pub output: RepairMode,
    /// Repair budget for maximal-likelihood selection. In `data` mode, a
    /// budget applies the same selection before writing repairs.
    pub repair_delta: Option<usize>,
    /// Model training parameters.
    pub training: TrainingConfig,
    /// Probability-based selection parameters.
    pub selection: SelectionConfig,
    /// Rule-based repairs applied before training.
    pub rules: RuleConfig,
    /// Number of dirty-row partitions (defaults to the rayon thread count).
    pub num_partitions: Option<usize>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            row_id: None,
            discrete_columns: Vec::new(),
            discrete_threshold: 80,
            min_training_row_ratio: 0.10,
            training_data_sample_ratio: 1.0,
            inference_order: InferenceOrder::default().to_string(),
            output: RepairMode::default(),
            repair_delta: None,
            training: TrainingConfig::default(),
            selection: SelectionConfig::default(),
            rules: RuleConfig::default(),
            num_partitions: None,
        }
    }
}

impl RepairConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| KilnError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Whether the run needs per-cell distributions.
    fn needs_distributions(&self) -> bool {
        match self.output {
            RepairMode::Pmf | RepairMode::MaximalLikelihood => true,
            RepairMode::Data => self.repair_delta.is_some(),
            RepairMode::Candidates | RepairMode::Histogram => false,
        }
    }
}

/// Value counts of one target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetHistogram {
    pub attribute: String,
    /// `(value, count)`, most frequent first.
    pub histogram: Vec<(String, usize)>,
}

/// Output of [`RepairModel::run`], matching the configured [`RepairMode`].
#[derive(Debug, Clone)]
pub enum RepairOutput {
    Candidates(Vec<Repair>),
    Pmf(Vec<RepairPmf>),
    MaximalLikelihood(LikelihoodSelection),
    Data(DataTable),
    Histogram(Vec<TargetHistogram>),
}

/// Error cells and tables after the rule phase and the clean/dirty split.
struct Prepared {
    /// Cells left for the models.
    cells: ErrorCells,
    /// Cells resolved by rules.
    rule_repairs: Vec<Repair>,
    schema: TableSchema,
    /// Input with rule repairs applied and remaining error cells blanked.
    working: DataTable,
    clean: DataTable,
    dirty: DataTable,
}

/// Probabilistic repair model for dirty cells in a table.
pub struct RepairModel {
    config: RepairConfig,
    cost: Box<dyn UpdateCostFunction>,
    stats: Option<AttrStats>,
    fds: FunctionalDeps,
}

impl RepairModel {
    /// Create a repair model with default configuration.
    pub fn new() -> Self {
        Self::with_config(RepairConfig::default())
    }

    /// Create a repair model with custom configuration.
    pub fn with_config(config: RepairConfig) -> Self {
        Self {
            config,
            cost: Box::new(Levenshtein::new()),
            stats: None,
            fds: FunctionalDeps::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Set the row identifier column.
    pub fn with_row_id(mut self, row_id: impl Into<String>) -> Self {
        self.config.row_id = Some(row_id.into());
        self
    }

    /// Set the inference order heuristic by name.
    pub fn with_inference_order(mut self, order: impl Into<String>) -> Self {
        self.config.inference_order = order.into();
        self
    }

    /// Set the output mode.
    pub fn with_output(mut self, output: RepairMode) -> Self {
        self.config.output = output;
        self
    }

    /// Set the repair budget.
    pub fn with_repair_delta(mut self, delta: usize) -> Self {
        self.config.repair_delta = Some(delta);
        self
    }

    /// Set the feature ceiling for statistical models.
    pub fn with_max_training_column_num(mut self, n: usize) -> Self {
        self.config.training.max_training_column_num = Some(n);
        self
    }

    /// Treat numeric columns as discrete.
    pub fn with_discrete_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.discrete_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Train statistical models concurrently.
    pub fn with_parallel_training(mut self, parallel: bool) -> Self {
        self.config.training.parallel = parallel;
        self
    }

    /// Use a custom update cost function (default: Levenshtein).
    pub fn with_cost(mut self, cost: impl UpdateCostFunction + 'static) -> Self {
        self.cost = Box::new(cost);
        self
    }

    /// Supply functional dependencies between columns.
    pub fn with_functional_deps(mut self, fds: FunctionalDeps) -> Self {
        self.fds = fds;
        self
    }

    /// Supply precomputed attribute statistics instead of analysing training rows.
    pub fn with_attr_stats(mut self, stats: AttrStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Check the configuration before any work starts.
    pub fn validate(&self) -> Result<()> {
        let config = &self.config;
        if config.row_id.as_deref().is_none_or(str::is_empty) {
            return Err(KilnError::Config(
                "`row_id` should be set before repairing".to_string(),
            ));
        }
        config.inference_order.parse::<InferenceOrder>()?;

        if config.discrete_threshold < 2 {
            return Err(KilnError::Config(format!(
                "`discrete_threshold` must be at least 2, got {}",
                config.discrete_threshold
            )));
        }
        if !(0.0..1.0).contains(&config.min_training_row_ratio) {
            return Err(KilnError::Config(format!(
                "`min_training_row_ratio` must be in [0, 1), got {}",
                config.min_training_row_ratio
            )));
        }
        if !(config.training_data_sample_ratio > 0.0 && config.training_data_sample_ratio <= 1.0) {
            return Err(KilnError::Config(format!(
                "`training_data_sample_ratio` must be in (0, 1], got {}",
                config.training_data_sample_ratio
            )));
        }
        if config.training.max_training_rows == 0 {
            return Err(KilnError::Config(
                "`max_training_rows` must be positive".to_string(),
            ));
        }

        if config.output == RepairMode::MaximalLikelihood && config.repair_delta.is_none() {
            return Err(KilnError::Config(
                "`repair_delta` should be set before maximal likelihood repairing".to_string(),
            ));
        }
        if config.repair_delta == Some(0) {
            return Err(KilnError::Config("`repair_delta` must be positive".to_string()));
        }
        if config.rules.is_enabled() && config.needs_distributions() {
            return Err(KilnError::Config(format!(
                "Rule-based repairs cannot be combined with `{}` output",
                config.output
            )));
        }
        Ok(())
    }

    /// Repair the error cells of `input`.
    pub fn run(&self, input: &DataTable, error_cells: &ErrorCells) -> Result<RepairOutput> {
        self.validate()?;
        let start = Instant::now();

        // Every exit path below releases the run's resources
        let mut ctx = RunContext::new();
        let result = self.run_in(&mut ctx, input, error_cells);
        ctx.release();

        info!(
            elapsed = start.elapsed().as_secs_f64(),
            "Elapsed time (name: total processing time)"
        );
        result
    }

    /// Train models without repairing anything.
    pub fn train(&self, input: &DataTable, error_cells: &ErrorCells) -> Result<TrainedModels> {
        self.validate()?;
        let mut ctx = RunContext::new();
        let result = self.prepare(&mut ctx, input, error_cells).and_then(|prepared| {
            if prepared.cells.is_empty() {
                return Err(KilnError::EmptyData(
                    "no error cells left to train models for".to_string(),
                ));
            }
            self.train_models(&mut ctx, &prepared, input.row_count())
        });
        ctx.release();
        result
    }

    /// Repair with previously trained models.
    pub fn run_with_models(
        &self,
        models: &TrainedModels,
        input: &DataTable,
        error_cells: &ErrorCells,
    ) -> Result<RepairOutput> {
        self.validate()?;
        let mut ctx = RunContext::new();
        let result = self.prepare(&mut ctx, input, error_cells).and_then(|prepared| {
            if prepared.cells.is_empty() {
                return Ok(self.finish_without_models(prepared));
            }
            if self.config.output == RepairMode::Histogram {
                return Ok(RepairOutput::Histogram(self.histogram(&prepared)));
            }
            if let Some(missing) = prepared.cells.attributes().into_iter().find(|a| models.get(a).is_none()) {
                return Err(KilnError::Config(format!(
                    "No trained model for target column '{}'",
                    missing
                )));
            }
            self.repair_phase(&mut ctx, models.clone(), prepared)
        });
        ctx.release();
        result
    }

    /// Write `(row id, attribute, repaired)` updates into a copy of `input`.
    pub fn apply_updates(input: &DataTable, row_id: &str, updates: &[Repair]) -> Result<DataTable> {
        let mut repaired = input.clone();
        let applied = apply_repairs(&mut repaired, row_id, updates)?;
        info!("{} repair updates applied to {} rows", applied, input.row_count());
        Ok(repaired)
    }

    fn row_id(&self) -> Result<&str> {
        self.config
            .row_id
            .as_deref()
            .ok_or_else(|| KilnError::Config("`row_id` should be set before repairing".to_string()))
    }

    fn run_in(&self, ctx: &mut RunContext, input: &DataTable, error_cells: &ErrorCells) -> Result<RepairOutput> {
        let prepared = self.prepare(ctx, input, error_cells)?;
        if prepared.cells.is_empty() {
            return Ok(self.finish_without_models(prepared));
        }
        if self.config.output == RepairMode::Histogram {
            return Ok(RepairOutput::Histogram(self.histogram(&prepared)));
        }

        let models = self.train_models(ctx, &prepared, input.row_count())?;
        self.repair_phase(ctx, models, prepared)
    }

    fn prepare(&self, ctx: &mut RunContext, input: &DataTable, error_cells: &ErrorCells) -> Result<Prepared> {
        let start = Instant::now();
        let row_id = self.row_id()?;
        let id_col = input.require_column(row_id)?;

        // Check the error cells against the input and record their current values
        let mut cells = error_cells.clone();
        cells.bind(input, row_id)?;
        info!(
            "[Error Detection Phase] {} error cells provided in {} rows ({} cols x {} rows)",
            cells.len(),
            cells.row_ids().len(),
            input.column_count(),
            input.row_count()
        );

        let schema = TableSchema::infer(input, row_id, &self.config.discrete_columns);
        if self.config.needs_distributions() {
            let continuous: Vec<String> = cells
                .attributes()
                .into_iter()
                .filter(|a| schema.is_continuous(a))
                .collect();
            if !continuous.is_empty() {
                return Err(KilnError::Config(format!(
                    "Cannot compute `{}` output when continuous target columns found: {}",
                    self.config.output,
                    continuous.join(",")
                )));
            }
        }

        // Resolve what the rules can before any modeling
        let mut working = input.clone();
        let rule_repairs = if self.config.rules.is_enabled() {
            let error_rows = cells.row_ids();
            let (_, clean_for_rules) = input.split_by_ids(id_col, &error_rows);
            let repairs = RuleRepairer::new(&self.config.rules, self.cost.as_ref())?
                .repair(&cells, &clean_for_rules)?;
            apply_repairs(&mut working, row_id, &repairs)?;
            cells = cells.without(&repairs);
            repairs
        } else {
            Vec::new()
        };

        // Blank the remaining error cells, then split clean and dirty rows
        let positions: HashMap<&str, usize> = input
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row[id_col].as_deref().map(|id| (id, i)))
            .collect();
        for cell in cells.iter() {
            if let Some(&row) = positions.get(cell.row_id.as_str()) {
                let col = working.require_column(&cell.attribute)?;
                working.set(row, col, None);
            }
        }
        let (dirty, clean) = working.split_by_ids(id_col, &cells.row_ids());
        ctx.register("repair_base", working.clone());
        ctx.register("clean", clean.clone());
        ctx.register("dirty", dirty.clone());

        debug!(
            elapsed = start.elapsed().as_secs_f64(),
            clean = clean.row_count(),
            dirty = dirty.row_count(),
            "split clean and dirty rows"
        );
        Ok(Prepared {
            cells,
            rule_repairs,
            schema,
            working,
            clean,
            dirty,
        })
    }

    fn train_models(&self, ctx: &mut RunContext, prepared: &Prepared, num_input_rows: usize) -> Result<TrainedModels> {
        let start = Instant::now();
        let row_id = self.row_id()?;
        let config = &self.config;

        // Sample training rows from the clean rows
        let mut rng = fastrand::Rng::with_seed(config.training.seed);
        let train = prepared.clean.sample(config.training_data_sample_ratio, &mut rng);
        info!(
            "[Repair Model Training Phase] Sampling {} training data (ratio={}) from {} clean rows...",
            train.row_count(),
            config.training_data_sample_ratio,
            prepared.clean.row_count()
        );

        let required = (num_input_rows as f64 * config.min_training_row_ratio) as usize;
        if train.row_count() <= required {
            return Err(KilnError::InsufficientTrainingRows {
                found: train.row_count(),
                required,
            });
        }

        let targets = prepared.cells.attribute_counts();
        let columns: Vec<String> = train
            .headers
            .iter()
            .filter(|h| h.as_str() != row_id)
            .cloned()
            .collect();
        if columns.len() <= targets.len() {
            return Err(KilnError::NoFeatures);
        }

        let stats = match &self.stats {
            Some(stats) => stats.clone(),
            None => {
                info!("[Repair Model Training Phase] Collecting training data stats before building models...");
                DomainAnalyzer::new(config.discrete_threshold).analyze(&train, &prepared.schema, row_id)
            }
        };

        let mode: InferenceOrder = config.inference_order.parse()?;
        let order = base_order(mode, &targets, &columns, &stats);
        let models = ModelTrainer::new(&train, &prepared.schema, &stats, row_id, &config.training)
            .with_functional_deps(&self.fds)
            .train(&order)?;
        ctx.register("train", train);

        info!(
            elapsed = start.elapsed().as_secs_f64(),
            "Elapsed time (name: repair model training)"
        );
        Ok(models)
    }

    fn repair_phase(&self, ctx: &mut RunContext, models: TrainedModels, prepared: Prepared) -> Result<RepairOutput> {
        let start = Instant::now();
        let row_id = self.row_id()?;
        let Prepared {
            cells,
            rule_repairs,
            schema,
            working,
            clean: _,
            dirty,
        } = prepared;

        let snapshot = ctx.broadcast(Snapshot {
            models,
            schema,
            config: self.config.clone(),
        });
        info!(
            "[Repairing Phase] Computing {} repair updates in {} rows...",
            cells.len(),
            dirty.row_count()
        );

        let mut executor = RepairExecutor::new(&snapshot.models, &snapshot.schema, row_id)
            .with_distributions(snapshot.config.needs_distributions());
        if let Some(n) = snapshot.config.num_partitions {
            executor = executor.with_partitions(n);
        }
        let executed = executor.execute(&dirty)?;
        ctx.register("repaired", executed.repaired.clone());

        let selector = RepairSelector::new(self.cost.as_ref(), &snapshot.config.selection);
        let output = match (snapshot.config.output, snapshot.config.repair_delta) {
            (RepairMode::Pmf, _) => RepairOutput::Pmf(selector.pmf(&cells, &executed.distributions)),
            (RepairMode::MaximalLikelihood, Some(delta)) => {
                RepairOutput::MaximalLikelihood(selector.maximal_likelihood(&cells, &executed.distributions, delta))
            }
            (RepairMode::Data, Some(delta)) => {
                let selection = selector.maximal_likelihood(&cells, &executed.distributions, delta);
                let mut repaired = dirty.clone();
                apply_repairs(&mut repaired, row_id, &selection.repairs)?;
                RepairOutput::Data(merge_rows(&working, &repaired, row_id)?)
            }
            (RepairMode::Data, None) => RepairOutput::Data(merge_rows(&working, &executed.repaired, row_id)?),
            (RepairMode::Candidates, _) | (RepairMode::MaximalLikelihood, None) | (RepairMode::Histogram, _) => {
                let mut repairs = rule_repairs;
                repairs.extend(RepairSelector::best_guess(&executed.repaired, &cells, row_id)?);
                repairs.retain(Repair::is_change);
                RepairOutput::Candidates(repairs)
            }
        };

        info!(
            elapsed = start.elapsed().as_secs_f64(),
            "Elapsed time (name: repairing)"
        );
        Ok(output)
    }

    fn finish_without_models(&self, prepared: Prepared) -> RepairOutput {
        info!("No error cells left for the models");
        match self.config.output {
            RepairMode::Candidates => {
                let mut repairs = prepared.rule_repairs;
                repairs.retain(Repair::is_change);
                RepairOutput::Candidates(repairs)
            }
            RepairMode::Pmf => RepairOutput::Pmf(Vec::new()),
            RepairMode::MaximalLikelihood => RepairOutput::MaximalLikelihood(LikelihoodSelection {
                repairs: Vec::new(),
                selected: 0,
                threshold: None,
            }),
            RepairMode::Data => RepairOutput::Data(prepared.working),
            RepairMode::Histogram => RepairOutput::Histogram(Vec::new()),
        }
    }

    fn histogram(&self, prepared: &Prepared) -> Vec<TargetHistogram> {
        prepared
            .cells
            .attributes()
            .into_iter()
            .filter_map(|attribute| {
                let col = prepared.clean.column_index(&attribute)?;
                let mut counts: IndexMap<&str, usize> = IndexMap::new();
                for value in prepared.clean.column_values(col).flatten() {
                    *counts.entry(value).or_insert(0) += 1;
                }
                if counts.len() > self.config.discrete_threshold {
                    debug!(attribute = attribute.as_str(), domain = counts.len(), "histogram skipped for large domain");
                    return None;
                }
                let mut histogram: Vec<(String, usize)> =
                    counts.into_iter().map(|(v, n)| (v.to_string(), n)).collect();
                histogram.sort_by(|a, b| b.1.cmp(&a.1));
                Some(TargetHistogram { attribute, histogram })
            })
            .collect()
    }
}

impl Default for RepairModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the rows of `base` that appear in `repaired`, keeping input order.
fn merge_rows(base: &DataTable, repaired: &DataTable, row_id: &str) -> Result<DataTable> {
    let id_col = base.require_column(row_id)?;
    let mut by_id: HashMap<&str, &Vec<Option<String>>> = HashMap::new();
    for row in &repaired.rows {
        if let Some(id) = row[id_col].as_deref() {
            by_id.insert(id, row);
        }
    }

    let mut merged = base.empty_like();
    let mut seen: HashSet<&str> = HashSet::new();
    for row in &base.rows {
        let replacement = row[id_col]
            .as_deref()
            .filter(|id| seen.insert(*id))
            .and_then(|id| by_id.get(id));
        merged.rows.push(match replacement {
            Some(r) => (*r).clone(),
            None => row.clone(),
        });
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::Cell;

    fn input() -> DataTable {
        let mut rows = Vec::new();
        for i in 0..20 {
            let (zip, city) = if i % 2 == 0 { ("z1", "NYC") } else { ("z2", "LA") };
            rows.push(vec![i.to_string(), zip.to_string(), city.to_string(), "X".to_string()]);
        }
        DataTable::from_strings(
            ["tid", "zip", "city", "y"].iter().map(|s| s.to_string()).collect(),
            rows,
            b',',
        )
    }

    #[test]
    fn test_validate_requires_row_id() {
        assert!(matches!(RepairModel::new().validate(), Err(KilnError::Config(_))));
        assert!(RepairModel::new().with_row_id("tid").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let base = || RepairModel::new().with_row_id("tid");
        assert!(base().with_inference_order("random").validate().is_err());
        assert!(base().with_output(RepairMode::MaximalLikelihood).validate().is_err());
        assert!(base().with_output(RepairMode::MaximalLikelihood).with_repair_delta(0).validate().is_err());
        assert!(base().with_output(RepairMode::MaximalLikelihood).with_repair_delta(3).validate().is_ok());

        let mut config = RepairConfig {
            row_id: Some("tid".into()),
            output: RepairMode::Pmf,
            ..Default::default()
        };
        config.rules.nearest_value = true;
        assert!(RepairModel::with_config(config).validate().is_err());
    }

    #[test]
    fn test_constant_target_best_guess() {
        let cells = ErrorCells::new(vec![Cell::new("3", "y", None)]);
        let model = RepairModel::new().with_row_id("tid");
        match model.run(&input(), &cells).unwrap() {
            // Current value "X" equals the prediction, so nothing changes
            RepairOutput::Candidates(repairs) => assert!(repairs.is_empty()),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_data_mode_preserves_rows() {
        let cells = ErrorCells::new(vec![Cell::new("4", "city", None)]);
        let fds = FunctionalDeps::new().with("zip", "city");
        let model = RepairModel::new()
            .with_row_id("tid")
            .with_output(RepairMode::Data)
            .with_functional_deps(fds);
        let RepairOutput::Data(table) = model.run(&input(), &cells).unwrap() else {
            panic!("expected data output");
        };
        assert_eq!(table.row_count(), 20);
        assert_eq!(table.get(4, 0), Some("4"));
        assert_eq!(table.get(4, 2), Some("NYC"));
    }

    #[test]
    fn test_histogram_mode() {
        let cells = ErrorCells::new(vec![Cell::new("0", "city", None)]);
        let model = RepairModel::new().with_row_id("tid").with_output(RepairMode::Histogram);
        let RepairOutput::Histogram(hist) = model.run(&input(), &cells).unwrap() else {
            panic!("expected histogram output");
        };
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].histogram, vec![("LA".to_string(), 10), ("NYC".to_string(), 9)]);
    }

    #[test]
    fn test_insufficient_training_rows() {
        let cells = ErrorCells::new((0..19).map(|i| Cell::new(i.to_string(), "city", None)));
        let model = RepairModel::new().with_row_id("tid");
        assert!(matches!(
            model.run(&input(), &cells),
            Err(KilnError::InsufficientTrainingRows { found: 1, required: 2 })
        ));
    }

    #[test]
    fn test_apply_updates() {
        let updates = vec![Repair {
            row_id: "1".into(),
            attribute: "y".into(),
            current_value: Some("X".into()),
            repaired: Some("Z".into()),
        }];
        let repaired = RepairModel::apply_updates(&input(), "tid", &updates).unwrap();
        assert_eq!(repaired.get(1, 3), Some("Z"));
        assert_eq!(input().get(1, 3), Some("X"));
    }

    #[test]
    fn test_merge_rows_keeps_order() {
        let base = input();
        let repaired = base
            .filter(|row| row[0].as_deref() == Some("5"))
            .project(&["tid", "zip", "city", "y"])
            .unwrap();
        let merged = merge_rows(&base, &repaired, "tid").unwrap();
        assert_eq!(merged, base);
    }
}
