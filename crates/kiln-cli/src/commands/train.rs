//! Train command - train repair models and save them as JSON.

use std::path::PathBuf;

use chrono::Local;
use colored::Colorize;

use super::{load_model, sibling_path};
use crate::cli::ModelArgs;

pub fn run(
    args: ModelArgs,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_model(&args)?;

    println!(
        "{} models for {} error cells in {}",
        "Training".cyan().bold(),
        loaded.cells.len().to_string().white().bold(),
        args.file.display().to_string().white()
    );

    let models = loaded.model.train(&loaded.input, &loaded.cells)?;

    println!();
    println!("{}", "Models:".yellow().bold());
    for d in &models.diagnostics {
        let score = d.score.map_or("-".to_string(), |s| format!("{:.3}", s));
        let strategy = if d.fallback {
            format!("{} (fallback)", d.strategy).red().to_string()
        } else {
            d.strategy.clone()
        };
        println!(
            "  {:20} {:28} rows={:<7} score={:<7} {:.2}s",
            d.column, strategy, d.rows, score, d.elapsed_secs
        );
        if verbose && !d.features.is_empty() {
            println!("  {:20} features: {}", "", d.features.join(", ").dimmed());
        }
    }
    println!();
    println!("Inference order: {}", models.order.join(" -> ").white());

    let output_path = output.unwrap_or_else(|| sibling_path(&args.file, ".models.json"));
    models.save(&output_path)?;

    println!(
        "{} {} at {}",
        "Saved".green().bold(),
        output_path.display().to_string().cyan(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}
