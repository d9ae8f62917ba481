//! Command-line parsing for the `svfit` binary.
//!
//! Argument parsing and command dispatch stay separate from the fit code;
//! `app` turns parsed arguments into a [`FitConfig`](crate::domain::FitConfig).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "svfit", version, about = "Di-tau kinematic reconstruction")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every candidate of an event file and print the solutions.
    Fit(FitArgs),
    /// Print the fit parameter layout with its default start values and bounds.
    ///
    /// With `--event`, the defaults are computed for the first candidate of the
    /// file; otherwise a reference candidate is used.
    ShowParameters(ShowParametersArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Event JSON with the candidates to fit.
    #[arg(long, value_name = "JSON")]
    pub event: PathBuf,

    /// Engine configuration JSON (likelihood terms, overrides, settings).
    #[arg(long, value_name = "JSON")]
    pub config: PathBuf,

    /// Resampling draws per solution (overrides the config file).
    #[arg(long)]
    pub samplings: Option<usize>,

    /// RNG seed (overrides the config file and `SVFIT_SEED`).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fit polarization hypotheses in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Minimizer iteration cap (overrides the config file).
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Write the solutions to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct ShowParametersArgs {
    /// Event JSON whose first candidate sets the defaults.
    #[arg(long, value_name = "JSON")]
    pub event: Option<PathBuf>,

    /// Configuration JSON whose parameter overrides are applied.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,
}
