//! Core type definitions for schema representation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Compiled once on first use.
static BOOLEAN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(true|false|yes|no)$").unwrap());

/// Inferred data type for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Whole numbers (no decimal point).
    Integer,
    /// Floating-point numbers.
    Float,
    /// Boolean words (true/false, yes/no).
    Boolean,
    /// Text/string values.
    String,
    /// No non-null values to infer from.
    #[default]
    Unknown,
}

impl ColumnType {
    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Detect the type of a single non-null value.
    pub fn of_value(value: &str) -> Self {
        let trimmed = value.trim();
        if BOOLEAN_PATTERN.is_match(trimmed) {
            return ColumnType::Boolean;
        }
        if trimmed.parse::<i64>().is_ok() {
            return ColumnType::Integer;
        }
        if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
            return ColumnType::Float;
        }
        ColumnType::String
    }

    /// Infer a column type from its non-null values.
    ///
    /// A column is numeric only when every value parses; integers mixed with
    /// floats promote to float.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut inferred = ColumnType::Unknown;
        for value in values {
            inferred = match (inferred, ColumnType::of_value(value)) {
                (ColumnType::Unknown, t) => t,
                (a, b) if a == b => a,
                (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                    ColumnType::Float
                }
                _ => return ColumnType::String,
            };
        }
        inferred
    }
}
