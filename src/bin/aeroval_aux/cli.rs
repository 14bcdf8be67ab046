//! Command line interface definitions
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Debug, Parser)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub(crate) command: Commands,

    #[command(flatten)]
    pub(crate) verbosity: Verbosity<InfoLevel>,

    /// Also write log messages to this file.
    #[clap(long, global = true)]
    pub(crate) log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Commands {
    /// Load and validate an evaluation configuration file.
    CheckConfig(CheckConfigCli),
    /// List the available auxiliary variable calculators.
    ListFuncs,
    /// Compute an auxiliary variable from JSON cube files.
    Apply(ApplyCli),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct CheckConfigCli {
    /// Path to the TOML configuration file
    pub(crate) config_file: PathBuf,

    /// Do not let AEROVAL_* environment variables override keys in the file.
    #[clap(long)]
    pub(crate) no_env: bool,

    /// Print the full parsed configuration instead of a summary.
    #[clap(long)]
    pub(crate) full: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum DataKind {
    Obs,
    Model,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct ApplyCli {
    /// Name of the calculator, see the list-funcs subcommand.
    pub(crate) func: String,

    /// JSON files holding the input cubes, in the calculator's argument order.
    /// Give "-" for an absent optional input.
    #[clap(required = true)]
    pub(crate) inputs: Vec<String>,

    /// Write the result here instead of stdout.
    #[clap(short, long)]
    pub(crate) output: Option<PathBuf>,

    /// Configuration whose outlier ranges and zeros_to_nan setting
    /// should be applied to the inputs first.
    #[clap(long, requires = "kind")]
    pub(crate) config: Option<PathBuf>,

    /// Whether the inputs are observations or model data; decides which
    /// outlier removal switch in the configuration applies.
    #[clap(long, value_enum, requires = "config")]
    pub(crate) kind: Option<DataKind>,
}
