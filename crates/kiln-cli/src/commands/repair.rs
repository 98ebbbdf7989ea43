//! Repair command - train models and repair the error cells of a data file.

use std::path::PathBuf;

use colored::Colorize;
use kiln::{DataTable, RepairMode, RepairOutput, TrainedModels};
use serde_json::{Value, json};

use super::{load_model, write_json, write_table};
use crate::cli::{ModelArgs, OutputFormat};

pub fn run(
    args: ModelArgs,
    mode: RepairMode,
    repair_delta: Option<usize>,
    models: Option<PathBuf>,
    output: Option<PathBuf>,
    format: OutputFormat,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_model(&args)?;
    let mut model = loaded.model.with_output(mode);
    if let Some(delta) = repair_delta {
        model = model.with_repair_delta(delta);
    }
    model.validate()?;

    eprintln!(
        "{} {} error cells in {}",
        "Repairing".cyan().bold(),
        loaded.cells.len().to_string().white().bold(),
        args.file.display().to_string().white()
    );

    let result = match &models {
        Some(path) => {
            let trained = TrainedModels::load(path)?;
            if verbose {
                eprintln!("  Using {} saved models from {}", trained.len(), path.display());
            }
            model.run_with_models(&trained, &loaded.input, &loaded.cells)?
        }
        None => model.run(&loaded.input, &loaded.cells)?,
    };

    let output = output.as_deref();
    let row_id = model.config().row_id.clone().unwrap_or_default();
    match result {
        RepairOutput::Candidates(repairs) => {
            eprintln!("{} {} repair candidates", "Found".green().bold(), repairs.len());
            let table = repairs_table(&row_id, repairs.iter().map(|r| {
                (&r.row_id, &r.attribute, r.current_value.as_deref(), r.repaired.as_deref())
            }));
            write_table(&table, output, &format)?;
        }
        RepairOutput::MaximalLikelihood(selection) => {
            eprintln!(
                "{} {} of {} repairs (threshold {})",
                "Selected".green().bold(),
                selection.selected,
                selection.repairs.len(),
                selection.threshold.map_or("-".to_string(), |t| format!("{:.4}", t))
            );
            let table = repairs_table(&row_id, selection.repairs.iter().map(|r| {
                (&r.row_id, &r.attribute, r.current_value.as_deref(), r.repaired.as_deref())
            }));
            write_table(&table, output, &format)?;
        }
        RepairOutput::Pmf(pmfs) => {
            eprintln!("{} distributions for {} cells", "Computed".green().bold(), pmfs.len());
            let records: Vec<Value> = pmfs
                .iter()
                .map(|p| {
                    json!({
                        row_id.as_str(): p.row_id,
                        "attribute": p.attribute,
                        "current_value": p.current_value,
                        "current_prob": p.current_prob,
                        "pmf": p.pmf.iter().map(|(c, pr)| json!({"c": c, "p": pr})).collect::<Vec<_>>(),
                    })
                })
                .collect();
            write_json(&Value::Array(records), output)?;
        }
        RepairOutput::Data(table) => {
            eprintln!("{} {} rows", "Repaired".green().bold(), table.row_count());
            write_table(&table, output, &format)?;
        }
        RepairOutput::Histogram(histograms) => {
            write_json(&serde_json::to_value(&histograms)?, output)?;
        }
    }

    if let Some(path) = output {
        eprintln!("{} {}", "Wrote".green().bold(), path.display().to_string().cyan());
    }
    Ok(())
}

/// Updates as a `(row id, attribute, current_value, repaired)` table.
fn repairs_table<'a>(
    row_id: &str,
    repairs: impl Iterator<Item = (&'a String, &'a String, Option<&'a str>, Option<&'a str>)>,
) -> DataTable {
    let headers = vec![
        row_id.to_string(),
        "attribute".to_string(),
        "current_value".to_string(),
        "repaired".to_string(),
    ];
    let rows = repairs
        .map(|(id, attr, current, repaired)| {
            vec![
                Some(id.clone()),
                Some(attr.clone()),
                current.map(str::to_string),
                repaired.map(str::to_string),
            ]
        })
        .collect();
    DataTable::new(headers, rows, b',')
}
