use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "PartsGenie CLI - Design ribosome binding sites and codon-optimised coding sequences that hit a target translation initiation rate.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Design a construct for a request by simulated annealing.
    Design(DesignArgs),
    /// Validate a request and summarise its constraints without designing.
    Check(CheckArgs),
}

/// Folding backend used to score designs.
#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Built-in nearest-neighbour model; no external programs needed.
    NearestNeighbor,
    /// ViennaRNA command-line programs.
    Vienna,
}

/// Arguments for the `design` subcommand.
#[derive(Args, Debug)]
pub struct DesignArgs {
    // --- Core Arguments ---
    /// Path to the design request (TOML, or JSON by extension).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub request: PathBuf,

    /// Path for the JSON result records. Printed to stdout when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Append every progress event as one JSON line to this file.
    #[arg(long, value_name = "PATH")]
    pub events: Option<PathBuf>,

    // --- Annealing Overrides ---
    /// Override the iteration budget.
    #[arg(short = 'n', long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Override the starting temperature.
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub initial_temperature: Option<f64>,

    /// Override the per-iteration cooling rate.
    #[arg(long, value_name = "FLOAT")]
    pub cooling_rate: Option<f64>,

    /// Stop as soon as the design energy reaches this value.
    #[arg(long, value_name = "FLOAT")]
    pub energy_threshold: Option<f64>,

    /// Seed the random number generator for a reproducible run.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Oracle and Data Overrides ---
    /// Override the folding backend.
    #[arg(short, long, value_enum, value_name = "BACKEND")]
    pub backend: Option<BackendKind>,

    /// Directory holding the ViennaRNA executables.
    #[arg(long, value_name = "PATH")]
    pub vienna_bin_dir: Option<PathBuf>,

    /// Override the RBS model parameter file (TOML).
    #[arg(long, value_name = "PATH")]
    pub rbs_params: Option<PathBuf>,

    /// Override the codon usage table (CSV).
    #[arg(long, value_name = "PATH")]
    pub codon_usage: Option<PathBuf>,

    /// Protein catalog (TOML) used to resolve proteins given by identifier only.
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S annealing.max-iterations=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the design request (TOML, or JSON by extension).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub request: PathBuf,

    /// Path to a configuration file in TOML format; only its `[data]` table is read.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the RBS model parameter file (TOML).
    #[arg(long, value_name = "PATH")]
    pub rbs_params: Option<PathBuf>,

    /// Protein catalog (TOML) used to resolve proteins given by identifier only.
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,
}
