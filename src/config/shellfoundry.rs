//! Reader for the packaging toolchain's `install:` settings.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use super::CloudShellConfig;
use crate::error::TrafficError;
use crate::files;

/// Per-shell toolchain configuration file, relative to the shell root.
pub const LOCAL_CONFIG_FILE: &str = "cloudshell_config.yml";

/// Global toolchain configuration file, relative to the home directory.
pub const GLOBAL_CONFIG_PATH: &str = ".shellfoundry/global_config.yml";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 9000;
const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin";
const DEFAULT_DOMAIN: &str = "Global";

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    install: Option<RawInstall>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInstall {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    domain: Option<String>,
}

/// Server settings from the toolchain's `install:` section, with the
/// toolchain's own defaults filling any gaps.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShellfoundryInstall {
    /// Server host.
    pub host: String,
    /// Packaging (Quali API) port; not the XML API port.
    pub port: u16,
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Domain.
    pub domain: String,
}

impl Default for ShellfoundryInstall {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_owned(),
            password: DEFAULT_PASSWORD.to_owned(),
            domain: DEFAULT_DOMAIN.to_owned(),
        }
    }
}

fn non_blank(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|item| !item.trim().is_empty())
        .unwrap_or_else(|| fallback.to_owned())
}

impl ShellfoundryInstall {
    /// Finds the configuration file that applies to `base_dir`: the shell's
    /// local file first, then the user's global file.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Io`] when a candidate cannot be probed.
    pub fn locate(base_dir: &Utf8Path) -> Result<Option<Utf8PathBuf>, TrafficError> {
        let local = base_dir.join(LOCAL_CONFIG_FILE);
        if files::file_exists(&local)? {
            return Ok(Some(local));
        }
        let Some(home) = files::home_dir() else {
            return Ok(None);
        };
        let global = home.join(GLOBAL_CONFIG_PATH);
        if files::file_exists(&global)? {
            return Ok(Some(global));
        }
        Ok(None)
    }

    /// Reads and parses the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::NotFound`] when the file is missing and
    /// [`TrafficError::Configuration`] when it cannot be parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, TrafficError> {
        let contents = files::read_to_string(path)?;
        Self::from_yaml(&contents)
            .map_err(|err| TrafficError::configuration(format!("{path}: {err}")))
    }

    /// Parses toolchain configuration YAML. A document without an `install:`
    /// section yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns the YAML parser's message when the document is malformed.
    pub fn from_yaml(contents: &str) -> Result<Self, String> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: Option<RawFile> = serde_yaml::from_str(contents).map_err(|err| err.to_string())?;
        let install = raw.and_then(|file| file.install).unwrap_or_default();
        Ok(Self {
            host: non_blank(install.host, DEFAULT_HOST),
            port: install.port.unwrap_or(DEFAULT_PORT),
            username: non_blank(install.username, DEFAULT_USERNAME),
            password: install.password.unwrap_or_else(|| DEFAULT_PASSWORD.to_owned()),
            domain: non_blank(install.domain, DEFAULT_DOMAIN),
        })
    }

    /// Overlays host and credentials onto `config`, keeping its API port and
    /// reservation settings.
    #[must_use]
    pub fn apply_to(self, config: CloudShellConfig) -> CloudShellConfig {
        CloudShellConfig {
            host: self.host,
            username: self.username,
            password: self.password,
            domain: self.domain,
            ..config
        }
    }
}
