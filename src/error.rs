//! Error taxonomy shared by the patcher, archiver, and delegation steps.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Coarse classification of a [`TrafficError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A required field is missing or malformed.
    Configuration,
    /// A referenced file or directory does not exist.
    NotFound,
    /// Local I/O failed for a reason other than a missing path.
    Io,
    /// A delegated toolchain or remote call failed.
    RemoteOperation,
}

/// Errors raised while patching metadata, archiving sources, or delegating to
/// the packaging toolchain and the orchestration server.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TrafficError {
    /// Raised when the definition document or a metadata file is missing a
    /// required field or cannot be parsed.
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable description of the problem.
        message: String,
    },
    /// Raised when a file or directory the operation depends on is absent.
    #[error("not found: {path}")]
    NotFound {
        /// Path that was expected to exist.
        path: Utf8PathBuf,
    },
    /// Raised when reading or writing a local file fails.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a delegated operation fails.
    #[error("{operation} failed: {message}")]
    RemoteOperation {
        /// Name of the delegated operation (for example `pack`).
        operation: String,
        /// Failure description reported by the collaborator.
        message: String,
    },
}

impl TrafficError {
    /// Builds a [`TrafficError::Configuration`] from any message.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Maps an I/O error against `path`, folding `NotFound` into
    /// [`TrafficError::NotFound`].
    #[must_use]
    pub fn from_io(path: &Utf8Path, err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            return Self::NotFound {
                path: path.to_path_buf(),
            };
        }
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Returns the error's classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } => ErrorKind::Io,
            Self::RemoteOperation { .. } => ErrorKind::RemoteOperation,
        }
    }
}
