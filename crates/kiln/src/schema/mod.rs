//! Column typing for repair targets and features.

mod column;
mod table;
mod types;

pub use column::ColumnSchema;
pub use table::TableSchema;
pub use types::ColumnType;
