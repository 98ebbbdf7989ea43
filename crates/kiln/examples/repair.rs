//! Example: Repair error cells of a tabular data file with Kiln.
//!
//! Usage:
//!   cargo run --example repair -- <input_path> <error_cells_path> <row_id>
//!
//! The error cell file lists `<row_id>,attribute` pairs.

use std::env;
use std::path::Path;

use kiln::{ErrorCells, Parser, RepairMode, RepairModel, RepairOutput};

fn main() -> kiln::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 4 {
        eprintln!("Usage: cargo run --example repair -- <input_path> <error_cells_path> <row_id>");
        std::process::exit(1);
    }

    let input_path = Path::new(&args[1]);
    let cells_path = Path::new(&args[2]);
    let row_id = &args[3];
    for path in [input_path, cells_path] {
        if !path.exists() {
            eprintln!("Error: File not found: {}", path.display());
            std::process::exit(1);
        }
    }

    let separator = "=".repeat(80);
    println!("{}", separator);
    println!("Kiln Repair: {}", input_path.display());
    println!("{}", separator);
    println!();

    let (input, source) = Parser::new().parse_file(input_path)?;
    let cells = ErrorCells::load(cells_path, row_id)?;

    println!("## Source Metadata");
    println!("  Format: {}", source.format);
    println!("  Rows: {}", source.row_count);
    println!("  Columns: {}", source.column_count);
    println!("  Error cells: {}", cells.len());
    println!();

    let model = RepairModel::new().with_row_id(row_id.as_str());

    // Train once, then reuse the models for both outputs
    let models = model.train(&input, &cells)?;
    println!("## Models ({} target columns)", models.len());
    for d in &models.diagnostics {
        println!(
            "  {:20} {:22} rows={:<6} score={}",
            d.column,
            d.strategy,
            d.rows,
            d.score.map_or("-".to_string(), |s| format!("{:.3}", s))
        );
    }
    println!();

    if let RepairOutput::Candidates(repairs) = model.run_with_models(&models, &input, &cells)? {
        println!("## Repairs ({})", repairs.len());
        for r in repairs.iter().take(20) {
            println!(
                "  {}[{}]: {} -> {}",
                r.attribute,
                r.row_id,
                r.current_value.as_deref().unwrap_or("<null>"),
                r.repaired.as_deref().unwrap_or("<null>")
            );
        }
        if repairs.len() > 20 {
            println!("  ... and {} more", repairs.len() - 20);
        }
    }
    println!();

    let data = model.with_output(RepairMode::Data);
    if let RepairOutput::Data(table) = data.run_with_models(&models, &input, &cells)? {
        println!("## Repaired table: {} rows", table.row_count());
    }

    Ok(())
}
