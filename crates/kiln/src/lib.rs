//! Kiln: probabilistic repair of dirty cells in tabular datasets.
//!
//! Given a table and a set of cells known to be erroneous, Kiln trains one
//! model per target column on the clean rows and uses those models to propose
//! replacement values for the error cells.
//!
//! # Core Principles
//!
//! - **Dependency-aware**: Target columns are predicted in an order that puts
//!   functional-dependency sources first
//! - **Non-destructive**: The input table is never modified
//! - **Probabilistic**: Candidates can be ranked by likelihood and update cost
//!
//! # Example
//!
//! ```no_run
//! use kiln::{ErrorCells, Parser, RepairModel, RepairOutput};
//!
//! let (input, _) = Parser::new().parse_file("adult.csv").unwrap();
//! let cells = ErrorCells::load("adult_errors.csv", "tid").unwrap();
//!
//! let model = RepairModel::new().with_row_id("tid");
//! if let RepairOutput::Candidates(repairs) = model.run(&input, &cells).unwrap() {
//!     println!("Repairs: {}", repairs.len());
//! }
//! ```

pub mod analysis;
pub mod cells;
pub mod context;
pub mod cost;
pub mod error;
pub mod input;
pub mod model;
pub mod order;
pub mod repair;
pub mod schema;
pub mod train;

mod kiln;

pub use crate::kiln::{RepairConfig, RepairMode, RepairModel, RepairOutput, TargetHistogram};
pub use analysis::{AttrStats, DomainAnalyzer, FunctionalDeps};
pub use cells::{Cell, ErrorCells, Repair};
pub use cost::{Levenshtein, UpdateCostFunction, UserDefinedCost};
pub use error::{KilnError, Result};
pub use input::{DataTable, Parser, SourceMetadata};
pub use model::ColumnModel;
pub use order::InferenceOrder;
pub use repair::{LikelihoodSelection, RepairPmf, RuleConfig, SelectionConfig};
pub use schema::{ColumnSchema, ColumnType, TableSchema};
pub use train::{TrainedModels, TrainingConfig};
