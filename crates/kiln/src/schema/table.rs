//! Table-level schema definition and inference.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::column::ColumnSchema;
use super::types::ColumnType;
use crate::input::DataTable;

/// Schema for an entire table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schemas for each column.
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Create a table schema with the given columns.
    pub fn with_columns(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    /// Infer column types from a table.
    ///
    /// Numeric columns are continuous unless named in `discrete_columns`; the
    /// row identifier is never continuous.
    pub fn infer(table: &DataTable, row_id: &str, discrete_columns: &[String]) -> Self {
        let columns = table
            .headers
            .iter()
            .enumerate()
            .map(|(position, name)| {
                let mut column = ColumnSchema::new(name, position);
                let mut distinct = HashSet::new();
                let mut non_null = Vec::new();
                for value in table.column_values(position) {
                    match value {
                        Some(v) => {
                            distinct.insert(v);
                            non_null.push(v);
                        }
                        None => column.null_count += 1,
                    }
                }
                column.domain_size = distinct.len();
                column.inferred_type = ColumnType::infer(non_null);
                column.continuous = column.inferred_type.is_numeric()
                    && name != row_id
                    && !discrete_columns.iter().any(|d| d == name);
                column
            })
            .collect();

        Self { columns }
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the named column is continuous.
    pub fn is_continuous(&self, name: &str) -> bool {
        self.get_column(name).is_some_and(|c| c.continuous)
    }

    /// Names of every continuous column.
    pub fn continuous_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.continuous)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Get all column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_schema() {
        let table = DataTable::from_strings(
            vec!["tid".into(), "age".into(), "city".into(), "zip".into()],
            vec![
                vec!["1".into(), "30".into(), "NYC".into(), "10001".into()],
                vec!["2".into(), "".into(), "LA".into(), "90001".into()],
                vec!["3".into(), "41".into(), "NYC".into(), "10001".into()],
            ],
            b',',
        );
        let schema = TableSchema::infer(&table, "tid", &["zip".to_string()]);

        let age = schema.get_column("age").unwrap();
        assert_eq!(age.inferred_type, ColumnType::Integer);
        assert!(age.continuous);
        assert!(age.is_integral());
        assert_eq!(age.null_count, 1);

        assert!(!schema.is_continuous("tid"));
        assert!(!schema.is_continuous("city"));
        assert!(!schema.is_continuous("zip"));
        assert_eq!(schema.get_column("city").unwrap().domain_size, 2);
        assert_eq!(schema.continuous_columns(), vec!["age"]);
    }
}
