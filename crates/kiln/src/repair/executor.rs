//! Applies trained column models to dirty rows.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{KilnError, Result};
use crate::input::DataTable;
use crate::model::{Distribution, Prediction};
use crate::schema::TableSchema;
use crate::train::TrainedModels;

/// Distributions keyed by `(row id, attribute)`.
pub type Distributions = HashMap<(String, String), Distribution>;

/// Output of one execution over the dirty rows.
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// Dirty rows with every predictable absent target cell filled.
    pub repaired: DataTable,
    /// Per-cell distributions, when requested.
    pub distributions: Distributions,
}

struct PartitionOutput {
    rows: Vec<Vec<Option<String>>>,
    distributions: Distributions,
}

/// Fills absent target cells, one row at a time, in inference order.
///
/// Rows are split into contiguous partitions processed independently. Within a
/// row, a value predicted for an earlier column is visible as a feature to
/// later columns. Present cells are never overwritten.
pub struct RepairExecutor<'a> {
    models: &'a TrainedModels,
    schema: &'a TableSchema,
    row_id: &'a str,
    with_distributions: bool,
    num_partitions: usize,
}

impl<'a> RepairExecutor<'a> {
    /// Create an executor.
    pub fn new(models: &'a TrainedModels, schema: &'a TableSchema, row_id: &'a str) -> Self {
        Self {
            models,
            schema,
            row_id,
            with_distributions: false,
            num_partitions: rayon::current_num_threads(),
        }
    }

    /// Record class distributions for every predicted discrete cell.
    pub fn with_distributions(mut self, enabled: bool) -> Self {
        self.with_distributions = enabled;
        self
    }

    /// Set the number of row partitions.
    pub fn with_partitions(mut self, num_partitions: usize) -> Self {
        self.num_partitions = num_partitions.max(1);
        self
    }

    /// Run every model over the dirty rows.
    pub fn execute(&self, dirty: &DataTable) -> Result<ExecutionOutput> {
        let chunk_size = dirty.row_count().div_ceil(self.num_partitions).max(1);
        debug!(
            rows = dirty.row_count(),
            partitions = dirty.row_count().div_ceil(chunk_size),
            "repairing dirty rows"
        );

        let outputs = dirty
            .rows
            .par_chunks(chunk_size)
            .enumerate()
            .map(|(partition, rows)| {
                self.repair_partition(&dirty.headers, rows)
                    .map_err(|e| KilnError::Partition {
                        partition,
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut repaired = dirty.empty_like();
        let mut distributions = Distributions::new();
        for output in outputs {
            repaired.rows.extend(output.rows);
            distributions.extend(output.distributions);
        }
        Ok(ExecutionOutput {
            repaired,
            distributions,
        })
    }

    fn repair_partition(
        &self,
        headers: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<PartitionOutput> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| KilnError::MissingColumn(name.to_string()))
        };
        let id_col = position(self.row_id)?;

        // Resolve (target, model, feature positions, integral) once per partition
        let mut plan = Vec::with_capacity(self.models.len());
        for (column, model) in self.models.iter() {
            let target = position(column)?;
            let features = model
                .features()
                .into_iter()
                .map(position)
                .collect::<Result<Vec<_>>>()?;
            let integral = self
                .schema
                .get_column(column)
                .is_some_and(|c| c.is_integral());
            plan.push((column, target, model, features, integral));
        }

        let mut output = PartitionOutput {
            rows: Vec::with_capacity(rows.len()),
            distributions: Distributions::new(),
        };
        for row in rows {
            let mut row = row.clone();
            for (column, target, model, features, integral) in &plan {
                if row[*target].is_some() {
                    continue;
                }
                let values: Vec<Option<&str>> = features.iter().map(|&f| row[f].as_deref()).collect();

                let prediction = if self.with_distributions && !model.is_regressor() {
                    let (prediction, dist) = model.predict_with_proba(&values);
                    if let (Some(id), Some(dist)) = (row[id_col].as_ref(), dist) {
                        output
                            .distributions
                            .insert((id.clone(), column.to_string()), dist);
                    }
                    prediction
                } else {
                    model.predict(&values)
                };

                let predicted = match prediction {
                    Some(Prediction::Class(value)) => Some(value),
                    Some(Prediction::Value(v)) if *integral => Some(format!("{}", v.round() as i64)),
                    Some(Prediction::Value(v)) => Some(v.to_string()),
                    None => None,
                };
                row[*target] = predicted;
            }
            output.rows.push(row);
        }
        Ok(output)
    }
}
