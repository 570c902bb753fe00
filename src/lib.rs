//! Core library for the `shellfoundry_traffic` tool.
//!
//! The crate wraps the `shellfoundry` packaging toolchain for traffic
//! generator shells and scripts: it patches the package manifest and driver
//! descriptor from a definition document, archives script sources, and
//! uploads scripts to the orchestration server. A test harness for driver
//! tests (reservations, driver contexts, health-check helpers) sits on the
//! same server session abstraction.

pub mod archiver;
pub mod commands;
pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod files;
pub mod harness;
pub mod patcher;
pub mod session;
pub mod test_support;
pub mod toolchain;

pub use archiver::{ArchiveSummary, build_archive, get_main, should_include};
pub use config::{
    CloudShellConfig, ConfigError, DeploymentDescriptor, ShellfoundryInstall, ToolchainConfig,
};
pub use context::WorkingContext;
pub use definition::{DefinitionDocument, DefinitionKind, MainClass};
pub use error::{ErrorKind, TrafficError};
pub use harness::{TeardownPolicy, TestHarness, session_from_config, session_from_deployment};
pub use patcher::{set_driver_main_class, set_entry_definitions};
pub use session::{CloudShellApi, CloudShellSession, SessionError};
pub use toolchain::{
    CommandOutput, CommandRunner, ProcessCommandRunner, Shellfoundry, Toolchain, ToolchainError,
};
