//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs the log subscriber
//! - merges CLI flags, `.env` and the config file into one `FitConfig`
//! - runs the fit pipeline
//! - prints reports and writes optional exports

use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, ShowParametersArgs};
use crate::domain::FitConfig;
use crate::error::AppError;

pub mod pipeline;

/// Environment variable consulted for the RNG seed when `--seed` is absent.
pub const SEED_ENV: &str = "SVFIT_SEED";

/// Entry point for the `svfit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_from(std::env::args());

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::ShowParameters(args) => handle_show_parameters(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let file_config = crate::io::read_config_json(&args.config)?;
    let env_seed = seed_from_env()?;
    let config = fit_config_from_args(&args, file_config, env_seed);

    let event = crate::io::read_event_json(&args.event)?;
    let run = pipeline::run_fit(&config, &event)?;

    println!("{}", crate::report::format_run_summary(run.event, &run.solutions, &config));

    if let Some(path) = &args.export {
        crate::io::write_solutions_json(path, run.event, &run.solutions)?;
        tracing::info!(path = %path.display(), "solutions exported");
    }

    Ok(())
}

fn handle_show_parameters(args: ShowParametersArgs) -> Result<(), AppError> {
    let config = match &args.config {
        Some(path) => Some(crate::io::read_config_json(path)?),
        None => None,
    };
    let event = args.event.as_deref().map(crate::io::read_event_json).transpose()?;

    let table = pipeline::parameter_layout(config.as_ref(), event.as_ref())?;
    println!("{}", crate::report::format_parameter_table(&table));
    Ok(())
}

/// Merge CLI flags over the config file; the seed falls back to `env_seed`.
pub fn fit_config_from_args(args: &FitArgs, mut config: FitConfig, env_seed: Option<u64>) -> FitConfig {
    if let Some(n) = args.samplings {
        config.num_samplings = n;
    }
    if let Some(seed) = args.seed.or(env_seed) {
        config.seed = seed;
    }
    if let Some(n) = args.max_iterations {
        config.max_iterations = n;
    }
    if args.parallel {
        config.parallel = true;
    }
    config
}

fn seed_from_env() -> Result<Option<u64>, AppError> {
    match std::env::var(SEED_ENV) {
        Ok(raw) => parse_seed(&raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_seed(raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::config(format!("{SEED_ENV} must be an unsigned integer, got '{raw}'.")))
}
