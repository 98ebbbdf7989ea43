//! Apply command - write repair updates into a data file.

use std::path::PathBuf;

use colored::Colorize;
use kiln::cells::load_updates;
use kiln::{Parser, RepairModel};

use super::{sibling_path, write_table};
use crate::cli::OutputFormat;

pub fn run(
    file: PathBuf,
    updates: PathBuf,
    row_id: String,
    output: Option<PathBuf>,
    format: OutputFormat,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    for path in [&file, &updates] {
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()).into());
        }
    }

    let (input, _) = Parser::new().parse_file(&file)?;
    let updates = load_updates(&updates, &row_id)?;

    if updates.is_empty() {
        println!("{} No updates to apply.", "Warning:".yellow().bold());
        return Ok(());
    }

    println!(
        "{} {} updates",
        "Applying".cyan().bold(),
        updates.len().to_string().white().bold()
    );
    if verbose {
        for u in updates.iter().take(10) {
            println!(
                "  {}[{}] -> {}",
                u.attribute,
                u.row_id,
                u.repaired.as_deref().unwrap_or("<null>")
            );
        }
    }

    let repaired = RepairModel::apply_updates(&input, &row_id, &updates)?;

    let output_path = output.unwrap_or_else(|| sibling_path(&file, &format!("_repaired.{}", format)));
    write_table(&repaired, Some(&output_path), &format)?;

    println!(
        "{} {}",
        "Saved repaired data to".green().bold(),
        output_path.display().to_string().cyan()
    );
    Ok(())
}
