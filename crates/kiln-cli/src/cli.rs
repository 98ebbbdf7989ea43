//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kiln::RepairMode;

/// Kiln: probabilistic repair of dirty cells in tabular data
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options shared by the commands that train models.
#[derive(clap::Args, Clone, Debug)]
pub struct ModelArgs {
    /// Path to the data file (CSV/TSV)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Path to the error cells file (`<row id>,attribute`)
    #[arg(short, long)]
    pub errors: PathBuf,

    /// Column uniquely identifying rows
    #[arg(long)]
    pub row_id: Option<String>,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Inference order heuristic (error, domain, entropy)
    #[arg(long)]
    pub inference_order: Option<String>,

    /// Functional dependency as `source:target` (repeatable)
    #[arg(long = "fd", value_name = "SOURCE:TARGET")]
    pub fds: Vec<String>,

    /// JSON file of `target -> [sources]` functional dependencies
    #[arg(long)]
    pub fd_file: Option<PathBuf>,

    /// Maximum number of features per statistical model
    #[arg(long)]
    pub max_training_column_num: Option<usize>,

    /// Numeric columns to treat as discrete (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub discrete: Vec<String>,

    /// Train statistical models concurrently
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train models and repair the error cells of a data file
    Repair {
        #[command(flatten)]
        model: ModelArgs,

        /// What to produce
        #[arg(short = 'm', long, default_value = "candidates")]
        mode: OutputMode,

        /// Repair budget for maximal-likelihood selection
        #[arg(short = 'd', long)]
        repair_delta: Option<usize>,

        /// Reuse models saved by `kiln train` instead of training
        #[arg(long)]
        models: Option<PathBuf>,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Train models for the error cells and save them as JSON
    Train {
        #[command(flatten)]
        model: ModelArgs,

        /// Output path for the models (default: <file>.models.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write repair updates into a data file
    Apply {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Path to the updates file (`<row id>,attribute,repaired`)
        #[arg(short, long)]
        updates: PathBuf,

        /// Column uniquely identifying rows
        #[arg(long)]
        row_id: String,

        /// Output path for repaired data (default: <file>_repaired.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "tsv")]
        format: OutputFormat,
    },
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Tsv,
    Csv,
    Json,
}

impl OutputFormat {
    /// Field delimiter for tabular formats.
    pub fn delimiter(&self) -> Option<u8> {
        match self {
            OutputFormat::Tsv => Some(b'\t'),
            OutputFormat::Csv => Some(b','),
            OutputFormat::Json => None,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tsv" => Ok(OutputFormat::Tsv),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use tsv, csv, or json.", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Tsv => write!(f, "tsv"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Output mode of the repair command
#[derive(Clone, Debug, Default)]
pub struct OutputMode(pub RepairMode);

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s.to_lowercase().replace('-', "_").as_str() {
            "candidates" | "repairs" => RepairMode::Candidates,
            "pmf" => RepairMode::Pmf,
            "maximal_likelihood" | "ml" => RepairMode::MaximalLikelihood,
            "data" => RepairMode::Data,
            "histogram" => RepairMode::Histogram,
            _ => {
                return Err(format!(
                    "Unknown mode: {}. Use candidates, pmf, maximal-likelihood, data, or histogram.",
                    s
                ));
            }
        };
        Ok(OutputMode(mode))
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
