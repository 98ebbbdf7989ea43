//! Table loading and the in-memory row substrate used by the pipeline.

mod parser;
mod source;

pub use parser::{Parser, ParserConfig};
pub use source::{DataTable, SourceMetadata};
