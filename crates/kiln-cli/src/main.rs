//! Kiln CLI - probabilistic repair of dirty cells in tabular data.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let default_level = if cli.verbose { "kiln=debug" } else { "kiln=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Repair {
            model,
            mode,
            repair_delta,
            models,
            output,
            format,
        } => commands::repair::run(model, mode.0, repair_delta, models, output, format, cli.verbose),

        Commands::Train { model, output } => commands::train::run(model, output, cli.verbose),

        Commands::Apply {
            file,
            updates,
            row_id,
            output,
            format,
        } => commands::apply::run(file, updates, row_id, output, format, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
