//! Configuration loading via `ortho-config`.
//!
//! Two layered structs cover the tool's own settings: [`ToolchainConfig`]
//! locates the packaging executable and [`CloudShellConfig`] holds the
//! server connection. The server connection can also come from the
//! packaging toolchain's own configuration ([`ShellfoundryInstall`]) or from
//! a shell's `deployment.xml` ([`DeploymentDescriptor`]).

use camino::Utf8Path;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::TrafficError;
use crate::session::API_PORT;
use crate::toolchain::DEFAULT_SHELLFOUNDRY_BIN;

mod deployment;
mod shellfoundry;

pub use deployment::{DEPLOYMENT_XML, DeploymentDescriptor, find_shell_root};
pub use shellfoundry::{GLOBAL_CONFIG_PATH, LOCAL_CONFIG_FILE, ShellfoundryInstall};

/// Name of the tool's own configuration file.
pub const CONFIG_FILE_NAME: &str = "shellfoundry_traffic.toml";

/// Default reservation length used by the test harness.
pub const DEFAULT_RESERVATION_MINUTES: u32 = 60;

/// Packaging toolchain settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SHELLFOUNDRY_TRAFFIC",
    discovery(
        app_name = "shellfoundry_traffic",
        env_var = "SHELLFOUNDRY_TRAFFIC_CONFIG_PATH",
        config_file_name = "shellfoundry_traffic.toml",
        dotfile_name = ".shellfoundry_traffic.toml",
        project_file_name = "shellfoundry_traffic.toml"
    )
)]
pub struct ToolchainConfig {
    /// Path to the `shellfoundry` executable.
    #[ortho_config(default = DEFAULT_SHELLFOUNDRY_BIN.to_owned())]
    pub shellfoundry_bin: String,
}

/// Orchestration server connection settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CLOUDSHELL",
    discovery(
        app_name = "shellfoundry_traffic",
        env_var = "SHELLFOUNDRY_TRAFFIC_CONFIG_PATH",
        config_file_name = "shellfoundry_traffic.toml",
        dotfile_name = ".shellfoundry_traffic.toml",
        project_file_name = "shellfoundry_traffic.toml"
    )
)]
pub struct CloudShellConfig {
    /// Server host name or address.
    #[ortho_config(default = "localhost".to_owned())]
    pub host: String,
    /// Port of the XML API.
    #[ortho_config(default = API_PORT)]
    pub api_port: u16,
    /// User to log on as.
    #[ortho_config(default = "admin".to_owned())]
    pub username: String,
    /// Password for `username`.
    #[ortho_config(default = "admin".to_owned())]
    pub password: String,
    /// Domain to log on to.
    #[ortho_config(default = "Global".to_owned())]
    pub domain: String,
    /// Length of reservations created by the test harness.
    #[ortho_config(default = DEFAULT_RESERVATION_MINUTES)]
    pub reservation_duration_minutes: u32,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [{}] in {CONFIG_FILE_NAME}",
            metadata.description, metadata.env_var, metadata.toml_key, metadata.section
        )));
    }
    Ok(())
}

impl ToolchainConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("shellfoundry_traffic")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the executable is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.shellfoundry_bin,
            &FieldMetadata::new(
                "shellfoundry executable",
                "SHELLFOUNDRY_TRAFFIC_SHELLFOUNDRY_BIN",
                "shellfoundry_bin",
                "shellfoundry_traffic",
            ),
        )
    }
}

impl CloudShellConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("shellfoundry_traffic")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Resolves the connection used by the `script` flow.
    ///
    /// The layered configuration supplies every field; when the packaging
    /// toolchain has a configuration file for `base_dir`, its `install:`
    /// section replaces host and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Configuration`] when a source cannot be parsed
    /// or the merged result fails validation.
    pub fn resolve(base_dir: &Utf8Path) -> Result<Self, TrafficError> {
        let mut resolved = Self::load_without_cli_args()?;
        if let Some(path) = ShellfoundryInstall::locate(base_dir)? {
            debug!(config = %path, "using shellfoundry install settings");
            resolved = ShellfoundryInstall::load(&path)?.apply_to(resolved);
        }
        resolved.validate()?;
        Ok(resolved)
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.host,
            &FieldMetadata::new("server host", "CLOUDSHELL_HOST", "host", "cloudshell"),
        )?;
        require_field(
            &self.username,
            &FieldMetadata::new("user name", "CLOUDSHELL_USERNAME", "username", "cloudshell"),
        )?;
        require_field(
            &self.domain,
            &FieldMetadata::new("domain", "CLOUDSHELL_DOMAIN", "domain", "cloudshell"),
        )?;
        if self.api_port == 0 {
            return Err(ConfigError::MissingField(format!(
                "missing API port: set CLOUDSHELL_API_PORT or add api_port to [cloudshell] in {CONFIG_FILE_NAME}"
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<ConfigError> for TrafficError {
    fn from(value: ConfigError) -> Self {
        Self::configuration(value.to_string())
    }
}

#[cfg(test)]
mod tests;
