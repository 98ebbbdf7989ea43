//! Per-column schema facts consumed by the repair pipeline.

use serde::{Deserialize, Serialize};

use super::types::ColumnType;

/// Schema for a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Zero-based position in the table.
    pub position: usize,
    /// Inferred data type.
    pub inferred_type: ColumnType,
    /// Whether the column is modeled as a continuous (regression) target.
    pub continuous: bool,
    /// Number of null/missing values.
    pub null_count: usize,
    /// Number of distinct non-null values.
    pub domain_size: usize,
}

impl ColumnSchema {
    /// Create a new column schema with basic information.
    pub fn new(name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            position,
            inferred_type: ColumnType::Unknown,
            continuous: false,
            null_count: 0,
            domain_size: 0,
        }
    }

    /// Whether predictions for this column are rounded to whole numbers.
    pub fn is_integral(&self) -> bool {
        self.continuous && self.inferred_type == ColumnType::Integer
    }
}
