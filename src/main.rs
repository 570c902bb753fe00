//! Binary entry point for the `shellfoundry_traffic` CLI.

use std::env;
use std::io::{self, Write};
use std::process;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use shellfoundry_traffic::{
    ProcessCommandRunner, Shellfoundry, ToolchainConfig, TrafficError, WorkingContext, commands,
    session_from_config,
};

mod cli;

use cli::{Cli, Command};

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "SHELLFOUNDRY_TRAFFIC_LOG";

const DEFAULT_LOG_DIRECTIVE: &str = "warn";

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot resolve working directory: {0}")]
    WorkingDirectory(String),
    #[error(transparent)]
    Traffic(#[from] TrafficError),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match dispatch(&cli) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn dispatch(cli: &Cli) -> Result<(), CliError> {
    let ctx = WorkingContext::new(resolve_base_dir(cli.directory.as_deref())?);
    match cli.command {
        Command::Pack => commands::pack(&ctx, &cli.yaml, &toolchain(cli, &ctx)?)?,
        Command::Generate => commands::generate(&ctx, &cli.yaml, &toolchain(cli, &ctx)?)?,
        Command::Install => commands::install(&ctx, &cli.yaml, &toolchain(cli, &ctx)?)?,
        Command::Script => {
            commands::script(&ctx, &cli.yaml, || session_from_config(ctx.base_dir()))?;
        }
    }
    Ok(())
}

fn resolve_base_dir(directory: Option<&Utf8Path>) -> Result<Utf8PathBuf, CliError> {
    if let Some(dir) = directory {
        return Ok(dir.to_path_buf());
    }
    let cwd = env::current_dir().map_err(|err| CliError::WorkingDirectory(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|path| CliError::WorkingDirectory(format!("{} is not UTF-8", path.display())))
}

fn toolchain(
    cli: &Cli,
    ctx: &WorkingContext,
) -> Result<Shellfoundry<ProcessCommandRunner>, CliError> {
    let program = cli.shellfoundry_bin.clone().map_or_else(configured_bin, Ok)?;
    Ok(Shellfoundry::with_process_runner(program, ctx.base_dir()))
}

fn configured_bin() -> Result<String, CliError> {
    let config = ToolchainConfig::load_without_cli_args().map_err(TrafficError::from)?;
    config.validate().map_err(TrafficError::from)?;
    Ok(config.shellfoundry_bin)
}

fn log_directive(verbose: u8, from_env: Option<String>) -> String {
    match verbose {
        0 => from_env
            .filter(|directive| !directive.trim().is_empty())
            .unwrap_or_else(|| String::from(DEFAULT_LOG_DIRECTIVE)),
        1 => String::from("info"),
        _ => String::from("debug"),
    }
}

fn init_logging(verbose: u8) {
    let directive = log_directive(verbose, env::var(LOG_ENV).ok());
    let filter =
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init()
        .ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
