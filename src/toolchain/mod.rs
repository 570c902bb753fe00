//! Delegation to the external `shellfoundry` packaging toolchain.
//!
//! The toolchain is driven by spawning its CLI in the working context's base
//! directory. Process execution goes through [`CommandRunner`] so tests can
//! script outcomes without spawning anything.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::TrafficError;

/// Default name of the packaging toolchain executable.
pub const DEFAULT_SHELLFOUNDRY_BIN: &str = "shellfoundry";

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Errors surfaced while running toolchain commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ToolchainError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a toolchain command completes with a non-zero exit code.
    #[error("{program} {operation} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed.
        program: String,
        /// Toolchain operation (`pack`, `generate`, or `install`).
        operation: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}

impl From<ToolchainError> for TrafficError {
    fn from(value: ToolchainError) -> Self {
        let operation = match &value {
            ToolchainError::Spawn { program, .. } => program.clone(),
            ToolchainError::CommandFailure { operation, .. } => operation.clone(),
        };
        Self::RemoteOperation {
            operation,
            message: value.to_string(),
        }
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with `args` inside `cwd`, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`ToolchainError::Spawn`] if the command cannot be started.
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: &Utf8Path,
    ) -> Result<CommandOutput, ToolchainError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: &Utf8Path,
    ) -> Result<CommandOutput, ToolchainError> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|err| ToolchainError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// The three packaging operations delegated to the external toolchain.
pub trait Toolchain {
    /// Packs the shell into `dist/`.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::RemoteOperation`] when the operation fails.
    fn pack(&self) -> Result<(), TrafficError>;

    /// Generates the shell's data model under `src/`.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::RemoteOperation`] when the operation fails.
    fn generate(&self) -> Result<(), TrafficError>;

    /// Installs the packed shell on the orchestration server.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::RemoteOperation`] when the operation fails.
    fn install(&self) -> Result<(), TrafficError>;
}

/// [`Toolchain`] backed by the `shellfoundry` CLI.
#[derive(Clone, Debug)]
pub struct Shellfoundry<R: CommandRunner> {
    program: String,
    base_dir: Utf8PathBuf,
    runner: R,
}

impl Shellfoundry<ProcessCommandRunner> {
    /// Creates a toolchain wired to the real process runner.
    #[must_use]
    pub fn with_process_runner(program: impl Into<String>, base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self::new(program, base_dir, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> Shellfoundry<R> {
    /// Creates a toolchain running `program` inside `base_dir`.
    #[must_use]
    pub fn new(program: impl Into<String>, base_dir: impl Into<Utf8PathBuf>, runner: R) -> Self {
        Self {
            program: program.into(),
            base_dir: base_dir.into(),
            runner,
        }
    }

    /// Returns the underlying runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    fn run_operation(&self, operation: &str) -> Result<(), ToolchainError> {
        info!(program = %self.program, operation, cwd = %self.base_dir, "delegating to toolchain");
        let args = [OsString::from(operation)];
        let output = self.runner.run(&self.program, &args, &self.base_dir)?;
        debug!(operation, code = ?output.code, "toolchain finished");
        relay_output(io::stdout().lock(), &output.stdout);
        if output.is_success() {
            return Ok(());
        }

        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(ToolchainError::CommandFailure {
            program: self.program.clone(),
            operation: operation.to_owned(),
            status: output.code,
            status_text,
            stderr: output.stderr.trim().to_owned(),
        })
    }
}

// Toolchain progress goes to the terminal whatever the log level.
fn relay_output(mut target: impl Write, stdout: &str) {
    if stdout.is_empty() {
        return;
    }
    target.write_all(stdout.as_bytes()).ok();
    if !stdout.ends_with('\n') {
        writeln!(target).ok();
    }
}

impl<R: CommandRunner> Toolchain for Shellfoundry<R> {
    fn pack(&self) -> Result<(), TrafficError> {
        Ok(self.run_operation("pack")?)
    }

    fn generate(&self) -> Result<(), TrafficError> {
        Ok(self.run_operation("generate")?)
    }

    fn install(&self) -> Result<(), TrafficError> {
        Ok(self.run_operation("install")?)
    }
}
