//! Connection settings from a shell's `deployment.xml`.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use super::{CloudShellConfig, DEFAULT_RESERVATION_MINUTES};
use crate::error::TrafficError;
use crate::files;
use crate::session::API_PORT;

/// Deployment descriptor file name.
pub const DEPLOYMENT_XML: &str = "deployment.xml";

#[derive(Debug, Default, Deserialize)]
struct RawDeployment {
    #[serde(rename = "serverRootAddress")]
    server_root_address: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    domain: Option<String>,
}

/// Server credentials recorded in `deployment.xml`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeploymentDescriptor {
    /// Server host (`serverRootAddress`).
    pub host: String,
    /// XML API port.
    pub port: u16,
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Domain.
    pub domain: String,
}

/// Returns the shell root for `start`: the first of `start`, its parent, or
/// its grandparent that holds `deployment.xml`. When none does, the last
/// candidate is returned so later reads report the expected location.
///
/// # Errors
///
/// Returns [`TrafficError::Io`] when a candidate cannot be probed.
pub fn find_shell_root(start: &Utf8Path) -> Result<Utf8PathBuf, TrafficError> {
    let mut candidate = start;
    for _ in 0..2 {
        if files::file_exists(&candidate.join(DEPLOYMENT_XML))? {
            return Ok(candidate.to_path_buf());
        }
        let Some(parent) = candidate.parent() else {
            break;
        };
        candidate = parent;
    }
    Ok(candidate.to_path_buf())
}

fn required(value: Option<String>, element: &str) -> Result<String, TrafficError> {
    value
        .map(|item| item.trim().to_owned())
        .filter(|item| !item.is_empty())
        .ok_or_else(|| TrafficError::configuration(format!("{DEPLOYMENT_XML} is missing <{element}>")))
}

impl DeploymentDescriptor {
    /// Reads `deployment.xml` from `shell_root`.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::NotFound`] when the file is absent and
    /// [`TrafficError::Configuration`] when it is malformed or lacks a
    /// required element.
    pub fn load(shell_root: &Utf8Path) -> Result<Self, TrafficError> {
        let path = shell_root.join(DEPLOYMENT_XML);
        let contents = files::read_to_string(&path)?;
        Self::from_xml(&contents)
    }

    /// Parses descriptor XML.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Configuration`] when the document is malformed
    /// or lacks host, user name or domain.
    pub fn from_xml(contents: &str) -> Result<Self, TrafficError> {
        let raw: RawDeployment = quick_xml::de::from_str(contents)
            .map_err(|err| TrafficError::configuration(format!("{DEPLOYMENT_XML}: {err}")))?;
        Ok(Self {
            host: required(raw.server_root_address, "serverRootAddress")?,
            port: raw.port.unwrap_or(API_PORT),
            username: required(raw.username, "username")?,
            password: raw.password.unwrap_or_default(),
            domain: required(raw.domain, "domain")?,
        })
    }

    /// Converts the descriptor into a session configuration.
    #[must_use]
    pub fn into_config(self) -> CloudShellConfig {
        CloudShellConfig {
            host: self.host,
            api_port: self.port,
            username: self.username,
            password: self.password,
            domain: self.domain,
            reservation_duration_minutes: DEFAULT_RESERVATION_MINUTES,
        }
    }
}
