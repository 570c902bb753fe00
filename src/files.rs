//! Capability-scoped file helpers.
//!
//! Every helper opens the parent directory with `cap-std` and operates on the
//! final path component, mirroring how configuration files are read and
//! written elsewhere in the crate. Reads complete and close their handle
//! before any write to the same path begins.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

use crate::error::TrafficError;

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), TrafficError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| TrafficError::Io {
        path: path.to_path_buf(),
        message: String::from("path is missing a file name"),
    })?;
    Ok((parent, file_name))
}

// A missing parent reports the file itself as not found.
fn open_parent(path: &Utf8Path, parent: &Utf8Path) -> Result<Dir, TrafficError> {
    open_dir(parent).map_err(|err| match err {
        TrafficError::NotFound { .. } => TrafficError::NotFound {
            path: path.to_path_buf(),
        },
        other => other,
    })
}

/// Opens `path` as a capability directory.
///
/// # Errors
///
/// Returns [`TrafficError::NotFound`] when the directory does not exist and
/// [`TrafficError::Io`] for other failures.
pub fn open_dir(path: &Utf8Path) -> Result<Dir, TrafficError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| TrafficError::from_io(path, &err))
}

/// Returns whether `path` exists as a directory.
///
/// # Errors
///
/// Returns [`TrafficError::Io`] when the check itself fails.
pub fn dir_exists(path: &Utf8Path) -> Result<bool, TrafficError> {
    match Dir::open_ambient_dir(path, ambient_authority()) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(TrafficError::from_io(path, &err)),
    }
}

/// Returns whether a file exists at `path`.
///
/// # Errors
///
/// Returns [`TrafficError::Io`] when the parent directory cannot be probed.
pub fn file_exists(path: &Utf8Path) -> Result<bool, TrafficError> {
    let (parent, file_name) = split(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => Ok(dir.is_file(file_name)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(TrafficError::from_io(parent, &err)),
    }
}

/// Reads `path` into a string.
///
/// # Errors
///
/// Returns [`TrafficError::NotFound`] when the file or its directory is
/// missing and [`TrafficError::Io`] for other failures, including a parent
/// that cannot be opened.
pub fn read_to_string(path: &Utf8Path) -> Result<String, TrafficError> {
    let (parent, file_name) = split(path)?;
    let dir = open_parent(path, parent)?;
    dir.read_to_string(file_name)
        .map_err(|err| TrafficError::from_io(path, &err))
}

/// Reads `path` into a byte vector.
///
/// # Errors
///
/// Returns [`TrafficError::NotFound`] when the file or its directory is
/// missing and [`TrafficError::Io`] for other failures, including a parent
/// that cannot be opened.
pub fn read(path: &Utf8Path) -> Result<Vec<u8>, TrafficError> {
    let (parent, file_name) = split(path)?;
    let dir = open_parent(path, parent)?;
    dir.read(file_name)
        .map_err(|err| TrafficError::from_io(path, &err))
}

/// Replaces the contents of `path` with `contents`.
///
/// # Errors
///
/// Returns [`TrafficError`] when the parent directory is missing or the write
/// fails.
pub fn write(path: &Utf8Path, contents: impl AsRef<[u8]>) -> Result<(), TrafficError> {
    let (parent, file_name) = split(path)?;
    let dir = open_dir(parent)?;
    dir.write(file_name, contents)
        .map_err(|err| TrafficError::from_io(path, &err))
}

/// Creates (or truncates) `path` for writing, creating missing parent
/// directories first.
///
/// # Errors
///
/// Returns [`TrafficError::Io`] when the directory or file cannot be created.
pub fn create_file(path: &Utf8Path) -> Result<std::fs::File, TrafficError> {
    let (parent, file_name) = split(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| TrafficError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;
    let dir = open_dir(parent)?;
    dir.create(file_name)
        .map(cap_std::fs_utf8::File::into_std)
        .map_err(|err| TrafficError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

/// Lists every regular file below `root`, depth first, with the files of a
/// directory visited before its subdirectories.
///
/// Entries within one directory come back in the order the filesystem
/// reports them.
///
/// # Errors
///
/// Returns [`TrafficError::NotFound`] when `root` does not exist and
/// [`TrafficError::Io`] when a directory cannot be listed.
pub fn walk_files(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, TrafficError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(current) = pending.pop() {
        let dir = open_dir(&current)?;
        let entries = dir
            .entries()
            .map_err(|err| TrafficError::from_io(&current, &err))?;
        let mut subdirs = Vec::new();
        for entry in entries {
            let item = entry.map_err(|err| TrafficError::from_io(&current, &err))?;
            let name = item
                .file_name()
                .map_err(|err| TrafficError::from_io(&current, &err))?;
            let file_type = item
                .file_type()
                .map_err(|err| TrafficError::from_io(&current, &err))?;
            if file_type.is_dir() {
                subdirs.push(current.join(&name));
            } else if file_type.is_file() {
                files.push(current.join(&name));
            }
        }
        // Reverse so the stack pops subdirectories in listing order.
        pending.extend(subdirs.into_iter().rev());
    }
    Ok(files)
}

/// Returns the user's home directory from `HOME`, when set.
#[must_use]
pub fn home_dir() -> Option<Utf8PathBuf> {
    std::env::var_os("HOME").map(|home| Utf8PathBuf::from(home.to_string_lossy().into_owned()))
}
