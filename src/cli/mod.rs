//! Command-line interface definitions for the `shellfoundry_traffic` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, Subcommand};

/// Top-level CLI for the `shellfoundry_traffic` binary.
#[derive(Debug, Parser)]
#[command(
    name = "shellfoundry_traffic",
    version,
    about = "shellfoundry wrapper for traffic shells and scripts",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Definition document name, without the `.yaml` suffix (for example
    /// `shell-definition`).
    #[arg(short = 'y', long = "yaml", value_name = "YAML", required = true)]
    pub(crate) yaml: String,
    /// Directory holding the shell or script project. Defaults to the
    /// current directory.
    #[arg(short = 'C', long = "directory", value_name = "DIR")]
    pub(crate) directory: Option<Utf8PathBuf>,
    /// Path to the `shellfoundry` executable. Overrides
    /// `SHELLFOUNDRY_TRAFFIC_SHELLFOUNDRY_BIN` and `shellfoundry_traffic.toml`.
    #[arg(long, value_name = "PATH")]
    pub(crate) shellfoundry_bin: Option<String>,
    /// Increase log verbosity (`-v` info, `-vv` debug).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub(crate) verbose: u8,
    /// Operation to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `shellfoundry_traffic`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Subcommand)]
pub(crate) enum Command {
    /// Set shell-definition.yaml file and main class, then pack.
    #[command(about = "set shell-definition.yaml file and main class, then pack")]
    Pack,
    /// Set shell-definition.yaml file then generate.
    #[command(about = "set shell-definition.yaml file then generate")]
    Generate,
    /// Set shell-definition.yaml and main class, then install.
    #[command(about = "set shell-definition.yaml and main class, then install")]
    Install,
    /// Zip the script sources, then update the script on the server.
    #[command(about = "zip the script sources, then update the script on the server")]
    Script,
}
