//! CLI command implementations.

pub mod apply;
pub mod repair;
pub mod train;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use kiln::{DataTable, ErrorCells, FunctionalDeps, Parser, RepairConfig, RepairModel};
use serde_json::{Map, Value};

use crate::cli::{ModelArgs, OutputFormat};

/// Input table, error cells and configured model for a command.
pub struct Loaded {
    pub input: DataTable,
    pub cells: ErrorCells,
    pub model: RepairModel,
}

/// Read the files named by `args` and build the repair model.
pub fn load_model(args: &ModelArgs) -> Result<Loaded, Box<dyn std::error::Error>> {
    for path in [&args.file, &args.errors] {
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()).into());
        }
    }

    let mut config = match &args.config {
        Some(path) => RepairConfig::load(path)?,
        None => RepairConfig::default(),
    };
    if let Some(row_id) = &args.row_id {
        config.row_id = Some(row_id.clone());
    }
    if let Some(order) = &args.inference_order {
        config.inference_order = order.clone();
    }
    if let Some(n) = args.max_training_column_num {
        config.training.max_training_column_num = Some(n);
    }
    if !args.discrete.is_empty() {
        config.discrete_columns = args.discrete.clone();
    }
    if args.parallel {
        config.training.parallel = true;
    }
    let row_id = config
        .row_id
        .clone()
        .ok_or("A row identifier is required (--row-id or `row_id` in the config)")?;

    let mut fds = match &args.fd_file {
        Some(path) => FunctionalDeps::load(path)?,
        None => FunctionalDeps::new(),
    };
    for fd in &args.fds {
        let (source, target) = fd
            .split_once(':')
            .ok_or_else(|| format!("Invalid dependency '{}': expected SOURCE:TARGET", fd))?;
        fds.insert(source.trim(), target.trim());
    }

    let (input, _) = Parser::new().parse_file(&args.file)?;
    let cells = ErrorCells::load(&args.errors, &row_id)?;
    let model = RepairModel::with_config(config).with_functional_deps(fds);
    Ok(Loaded { input, cells, model })
}

/// Write a table in the requested format to `output`, or stdout.
pub fn write_table(
    table: &DataTable,
    output: Option<&Path>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match (format.delimiter(), output) {
        (Some(delimiter), Some(path)) => table.write_delimited(path, delimiter)?,
        (Some(delimiter), None) => {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .from_writer(io::stdout());
            writer.write_record(&table.headers)?;
            for row in &table.rows {
                writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
            }
            writer.flush()?;
        }
        (None, _) => {
            let records: Vec<Value> = table
                .rows
                .iter()
                .map(|row| {
                    let record: Map<String, Value> = table
                        .headers
                        .iter()
                        .zip(row)
                        .map(|(h, v)| (h.clone(), v.clone().map_or(Value::Null, Value::String)))
                        .collect();
                    Value::Object(record)
                })
                .collect();
            write_json(&Value::Array(records), output)?;
        }
    }
    Ok(())
}

/// Pretty-print JSON to `output`, or stdout.
pub fn write_json(value: &Value, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            writeln!(file, "{}", json)?;
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// `<dir>/<stem><suffix>` next to `file`.
pub fn sibling_path(file: &Path, suffix: &str) -> PathBuf {
    let stem = file.file_stem().unwrap_or_default().to_string_lossy();
    file.with_file_name(format!("{}{}", stem, suffix))
}
