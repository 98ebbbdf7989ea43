//! Error types for the kiln library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for kiln operations.
#[derive(Debug, Error)]
pub enum KilnError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid delimiter detected or specified.
    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),

    /// Empty file or no data to process.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Invalid or inconsistent configuration, raised before any work starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A column referenced by the configuration or the error cells is missing.
    #[error("Column '{0}' not found in input table")]
    MissingColumn(String),

    /// Functional dependencies between target columns form a cycle.
    #[error("Cannot resolve inference order: dependency cycle among [{}]", unresolved.join(", "))]
    DependencyCycle { unresolved: Vec<String> },

    /// Not enough clean rows to train repair models.
    #[error(
        "Number of training rows must be greater than {required}, but {found} rows found"
    )]
    InsufficientTrainingRows { found: usize, required: usize },

    /// No column is left to use as a feature.
    #[error("At least one feature is needed to repair error cells, but no features found")]
    NoFeatures,

    /// The model library failed to fit a column model.
    #[error("Model fit failed: {0}")]
    ModelFit(String),

    /// A repair partition failed; the whole run is aborted.
    #[error("Repair partition {partition} failed: {message}")]
    Partition { partition: usize, message: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regex compilation error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias for kiln operations.
pub type Result<T> = std::result::Result<T, KilnError>;
