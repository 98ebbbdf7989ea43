//! Data source abstraction and metadata.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KilnError, Result};

/// Metadata about the source data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// SHA-256 hash of the file contents.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected format (csv, tsv, etc.).
    pub format: String,
    /// Number of data rows (excluding header).
    pub row_count: usize,
    /// Number of columns.
    pub column_count: usize,
    /// When the file was loaded.
    pub loaded_at: DateTime<Utc>,
}

impl SourceMetadata {
    /// Create metadata for a file that has been loaded.
    pub fn new(
        path: PathBuf,
        hash: String,
        size_bytes: u64,
        format: String,
        row_count: usize,
        column_count: usize,
    ) -> Self {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file,
            path,
            hash,
            size_bytes,
            format,
            row_count,
            column_count,
            loaded_at: Utc::now(),
        }
    }
}

/// Row-major tabular data with nullable cells.
///
/// Missing values (empty strings, `NA`, `null`, ...) are stored as `None` so the
/// repair pipeline can tell absent cells apart from real values.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    /// Column headers.
    pub headers: Vec<String>,
    /// Row data (row-major order).
    pub rows: Vec<Vec<Option<String>>>,
    /// The delimiter used when the table was read.
    pub delimiter: u8,
}

impl DataTable {
    /// Create a new data table.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>, delimiter: u8) -> Self {
        Self {
            headers,
            rows,
            delimiter,
        }
    }

    /// Build a table from raw string cells, mapping null tokens to `None`.
    pub fn from_strings(headers: Vec<String>, rows: Vec<Vec<String>>, delimiter: u8) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|v| if Self::is_null_value(&v) { None } else { Some(v) })
                    .collect()
            })
            .collect();
        Self::new(headers, rows, delimiter)
    }

    /// Create an empty table sharing this table's headers.
    pub fn empty_like(&self) -> Self {
        Self::new(self.headers.clone(), Vec::new(), self.delimiter)
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Get the number of rows (excluding header).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Position of a column by name, failing when it does not exist.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| KilnError::MissingColumn(name.to_string()))
    }

    /// Get all values for a column by index.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<&str>> {
        self.rows
            .iter()
            .map(move |row| row.get(index).and_then(|v| v.as_deref()))
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).and_then(|v| v.as_deref())
    }

    /// Overwrite a cell. Out-of-range positions are ignored.
    pub fn set(&mut self, row: usize, col: usize, value: Option<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value;
        }
    }

    /// Keep the rows matching a predicate.
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Option<String>]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect();
        Self::new(self.headers.clone(), rows, self.delimiter)
    }

    /// Keep only the named columns, in the given order.
    pub fn project(&self, columns: &[&str]) -> Result<Self> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows,
            self.delimiter,
        ))
    }

    /// Append the rows of another table with identical headers.
    pub fn union(mut self, other: Self) -> Result<Self> {
        if self.headers != other.headers {
            return Err(KilnError::Config(format!(
                "Cannot union tables with different columns: [{}] vs [{}]",
                self.headers.join(","),
                other.headers.join(",")
            )));
        }
        self.rows.extend(other.rows);
        Ok(self)
    }

    /// Split rows into (matching, non-matching) on a set of row identifiers.
    pub fn split_by_ids(&self, id_col: usize, ids: &HashSet<String>) -> (Self, Self) {
        let (inside, outside): (Vec<_>, Vec<_>) = self.rows.iter().cloned().partition(|row| {
            row[id_col]
                .as_ref()
                .is_some_and(|id| ids.contains(id))
        });
        (
            Self::new(self.headers.clone(), inside, self.delimiter),
            Self::new(self.headers.clone(), outside, self.delimiter),
        )
    }

    /// Uniform Bernoulli sample of rows. A ratio of 1.0 or more keeps every row.
    pub fn sample(&self, ratio: f64, rng: &mut fastrand::Rng) -> Self {
        if ratio >= 1.0 {
            return self.clone();
        }
        self.filter(|_| rng.f64() < ratio)
    }

    /// Distinct non-null values of a column, in first-seen order.
    pub fn distinct_values(&self, col: usize) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.column_values(col)
            .flatten()
            .filter(|v| seen.insert(*v))
            .collect()
    }

    /// Write the table as delimited text.
    pub fn write_delimited(&self, path: impl AsRef<Path>, delimiter: u8) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
        }
        writer.flush().map_err(|e| KilnError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Check if a value represents a missing/null value.
    pub fn is_null_value(value: &str) -> bool {
        let trimmed = value.trim();
        trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("na")
            || trimmed.eq_ignore_ascii_case("n/a")
            || trimmed.eq_ignore_ascii_case("null")
            || trimmed.eq_ignore_ascii_case("none")
            || trimmed.eq_ignore_ascii_case("nan")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataTable {
        DataTable::from_strings(
            vec!["tid".into(), "a".into(), "b".into()],
            vec![
                vec!["1".into(), "x".into(), "NA".into()],
                vec!["2".into(), "y".into(), "3".into()],
                vec!["3".into(), "x".into(), "".into()],
            ],
            b',',
        )
    }

    #[test]
    fn test_null_tokens_become_none() {
        let t = table();
        assert_eq!(t.get(0, 2), None);
        assert_eq!(t.get(1, 2), Some("3"));
        assert_eq!(t.get(2, 2), None);
    }

    #[test]
    fn test_project_and_union() {
        let t = table();
        let p = t.project(&["b", "tid"]).unwrap();
        assert_eq!(p.headers, vec!["b", "tid"]);
        assert_eq!(p.get(1, 1), Some("2"));

        let doubled = t.clone().union(t.clone()).unwrap();
        assert_eq!(doubled.row_count(), 6);
        assert!(t.clone().union(p).is_err());
    }

    #[test]
    fn test_split_by_ids() {
        let t = table();
        let ids: HashSet<String> = ["2".to_string()].into_iter().collect();
        let (dirty, clean) = t.split_by_ids(0, &ids);
        assert_eq!(dirty.row_count(), 1);
        assert_eq!(clean.row_count(), 2);
    }

    #[test]
    fn test_distinct_values_first_seen_order() {
        let t = table();
        assert_eq!(t.distinct_values(1), vec!["x", "y"]);
        assert!(t.distinct_values(2).len() == 1);
    }

    #[test]
    fn test_missing_column() {
        let t = table();
        assert!(matches!(t.require_column("zzz"), Err(KilnError::MissingColumn(_))));
    }
}
