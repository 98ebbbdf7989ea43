//! Cells, error-cell sets, and committed repairs.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{KilnError, Result};
use crate::input::{DataTable, Parser};

/// Column name holding the attribute of an error cell.
pub const ATTRIBUTE_COLUMN: &str = "attribute";

/// Column name holding the repaired value of an update.
pub const REPAIRED_COLUMN: &str = "repaired";

/// Column name holding the value before repair.
pub const CURRENT_VALUE_COLUMN: &str = "current_value";

/// One field in one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Row identifier.
    pub row_id: String,
    /// Attribute (column) name.
    pub attribute: String,
    /// Value before repair.
    pub current_value: Option<String>,
}

impl Cell {
    /// Create a cell.
    pub fn new(
        row_id: impl Into<String>,
        attribute: impl Into<String>,
        current_value: Option<String>,
    ) -> Self {
        Self {
            row_id: row_id.into(),
            attribute: attribute.into(),
            current_value,
        }
    }

    /// Identity of the cell independent of its value.
    pub fn key(&self) -> (&str, &str) {
        (&self.row_id, &self.attribute)
    }
}

/// The set of cells flagged dirty, in insertion order without duplicates.
#[derive(Debug, Clone, Default)]
pub struct ErrorCells {
    cells: IndexMap<(String, String), Cell>,
}

impl ErrorCells {
    /// Build a set from cells; later duplicates of a (row, attribute) pair are dropped.
    pub fn new(cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut set = Self::default();
        for cell in cells {
            set.cells
                .entry((cell.row_id.clone(), cell.attribute.clone()))
                .or_insert(cell);
        }
        set
    }

    /// Read `(row_id, attribute)` pairs from a table with those two columns.
    pub fn from_table(table: &DataTable, row_id: &str) -> Result<Self> {
        let id_col = table.require_column(row_id)?;
        let attr_col = table.require_column(ATTRIBUTE_COLUMN).map_err(|_| {
            KilnError::Config(format!(
                "Error cells must have `{}` and `{}` in columns",
                row_id, ATTRIBUTE_COLUMN
            ))
        })?;

        let cells = table.rows.iter().filter_map(|row| {
            let id = row[id_col].clone()?;
            let attribute = row[attr_col].clone()?;
            Some(Cell::new(id, attribute, None))
        });
        Ok(Self::new(cells))
    }

    /// Load error cells from a delimited file.
    pub fn load(path: impl AsRef<Path>, row_id: &str) -> Result<Self> {
        let (table, _) = Parser::new().parse_file(path)?;
        Self::from_table(&table, row_id)
    }

    /// Check every attribute against the input columns and fill in current values.
    ///
    /// Cells whose row id does not occur in the input are dropped with a warning.
    pub fn bind(&mut self, input: &DataTable, row_id: &str) -> Result<()> {
        let id_col = input.require_column(row_id)?;
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (idx, row) in input.rows.iter().enumerate() {
            if let Some(id) = row[id_col].as_deref() {
                positions.insert(id, idx);
            }
        }

        let mut columns: HashMap<String, usize> = HashMap::new();
        for cell in self.cells.values() {
            if cell.attribute == row_id {
                return Err(KilnError::Config(format!(
                    "Row identifier `{}` cannot be an error cell attribute",
                    row_id
                )));
            }
            let col = input.require_column(&cell.attribute)?;
            columns.insert(cell.attribute.clone(), col);
        }

        let before = self.cells.len();
        self.cells.retain(|_, cell| match positions.get(cell.row_id.as_str()) {
            Some(&r) => {
                cell.current_value = input.get(r, columns[&cell.attribute]).map(str::to_string);
                true
            }
            None => false,
        });
        let dropped = before - self.cells.len();
        if dropped > 0 {
            warn!(dropped, "error cells refer to row ids missing from the input, ignoring them");
        }
        Ok(())
    }

    /// Number of error cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over the cells in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Look up a cell.
    pub fn get(&self, row_id: &str, attribute: &str) -> Option<&Cell> {
        self.cells.get(&(row_id.to_string(), attribute.to_string()))
    }

    /// Whether the set contains the cell.
    pub fn contains(&self, row_id: &str, attribute: &str) -> bool {
        self.get(row_id, attribute).is_some()
    }

    /// Identifiers of rows holding at least one error cell.
    pub fn row_ids(&self) -> HashSet<String> {
        self.cells.values().map(|c| c.row_id.clone()).collect()
    }

    /// Target attributes in first-seen order.
    pub fn attributes(&self) -> IndexSet<String> {
        self.cells.values().map(|c| c.attribute.clone()).collect()
    }

    /// Number of error cells per attribute, in first-seen order.
    pub fn attribute_counts(&self) -> IndexMap<String, usize> {
        let mut counts = IndexMap::new();
        for cell in self.cells.values() {
            *counts.entry(cell.attribute.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Drop the cells already resolved by a repair.
    pub fn without(&self, resolved: &[Repair]) -> Self {
        let resolved: HashSet<(&str, &str)> = resolved.iter().map(|r| r.key()).collect();
        Self::new(
            self.cells
                .values()
                .filter(|c| !resolved.contains(&c.key()))
                .cloned(),
        )
    }
}

/// A committed (or candidate) change for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repair {
    /// Row identifier.
    pub row_id: String,
    /// Attribute (column) name.
    pub attribute: String,
    /// Value before repair.
    pub current_value: Option<String>,
    /// Value after repair.
    pub repaired: Option<String>,
}

impl Repair {
    /// Create a repair for a cell.
    pub fn for_cell(cell: &Cell, repaired: Option<String>) -> Self {
        Self {
            row_id: cell.row_id.clone(),
            attribute: cell.attribute.clone(),
            current_value: cell.current_value.clone(),
            repaired,
        }
    }

    /// Identity of the repaired cell.
    pub fn key(&self) -> (&str, &str) {
        (&self.row_id, &self.attribute)
    }

    /// Whether the repair changes the cell.
    pub fn is_change(&self) -> bool {
        self.current_value != self.repaired
    }
}

/// Write repaired values into a table, returning how many cells changed.
///
/// Repairs naming unknown rows are skipped; unknown attributes are an error.
pub fn apply_repairs(table: &mut DataTable, row_id: &str, repairs: &[Repair]) -> Result<usize> {
    let id_col = table.require_column(row_id)?;
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        if let Some(id) = &row[id_col] {
            positions.insert(id.clone(), idx);
        }
    }

    let mut applied = 0;
    for repair in repairs {
        let col = table.require_column(&repair.attribute)?;
        if let Some(&row) = positions.get(&repair.row_id) {
            if table.get(row, col) != repair.repaired.as_deref() {
                table.set(row, col, repair.repaired.clone());
                applied += 1;
            }
        }
    }
    Ok(applied)
}

/// Read `(row id, attribute, repaired)` updates from a table.
///
/// A `current_value` column is optional.
pub fn updates_from_table(table: &DataTable, row_id: &str) -> Result<Vec<Repair>> {
    let id_col = table.require_column(row_id)?;
    let (attr_col, repaired_col) = match (
        table.column_index(ATTRIBUTE_COLUMN),
        table.column_index(REPAIRED_COLUMN),
    ) {
        (Some(a), Some(r)) => (a, r),
        _ => {
            return Err(KilnError::Config(format!(
                "Repair updates must have `{}`, `{}` and `{}` in columns",
                row_id, ATTRIBUTE_COLUMN, REPAIRED_COLUMN
            )));
        }
    };
    let current_col = table.column_index(CURRENT_VALUE_COLUMN);

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            Some(Repair {
                row_id: row[id_col].clone()?,
                attribute: row[attr_col].clone()?,
                current_value: current_col.and_then(|c| row[c].clone()),
                repaired: row[repaired_col].clone(),
            })
        })
        .collect())
}

/// Load repair updates from a delimited file.
pub fn load_updates(path: impl AsRef<Path>, row_id: &str) -> Result<Vec<Repair>> {
    let (table, _) = Parser::new().parse_file(path)?;
    updates_from_table(&table, row_id)
}
