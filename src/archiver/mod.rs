//! Selective archiver for script and shell source trees.
//!
//! The archiver flattens the source tree: every regular file below the source
//! directory is stored under its base name only. Exclusions are exact
//! base-name matches, so two files sharing a base name in different
//! subdirectories cannot be excluded independently; when both are included
//! the one visited last wins.

use std::collections::BTreeMap;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::context::WorkingContext;
use crate::definition::DefinitionDocument;
use crate::error::TrafficError;
use crate::files;

/// Result of a successful [`build_archive`] call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchiveSummary {
    /// Location of the written archive.
    pub path: Utf8PathBuf,
    /// Base names stored in the archive, sorted.
    pub entries: Vec<String>,
}

/// Returns `true` unless `file_name`'s base name is listed verbatim in the
/// definition's `files.exclude`.
#[must_use]
pub fn should_include(file_name: &str, definition: &DefinitionDocument) -> bool {
    let base = Utf8Path::new(file_name).file_name().unwrap_or(file_name);
    !definition
        .excluded_files()
        .iter()
        .any(|excluded| excluded == base)
}

/// Writes every included file under the context's source directory into
/// `<dist>/<name>.zip`, replacing any existing archive.
///
/// # Errors
///
/// Returns [`TrafficError::NotFound`] when the source directory does not
/// exist (no archive is created in that case) and [`TrafficError::Io`] when
/// reading a source file or writing the archive fails.
pub fn build_archive(
    ctx: &WorkingContext,
    definition: &DefinitionDocument,
    name: &str,
) -> Result<ArchiveSummary, TrafficError> {
    let source = ctx.source_dir();
    if !files::dir_exists(&source)? {
        return Err(TrafficError::NotFound { path: source });
    }

    let selected = select_entries(&source, definition)?;
    let path = ctx.archive_path(name);
    write_archive(&path, &selected)?;

    let entries: Vec<String> = selected.into_keys().collect();
    info!(archive = %path, entries = entries.len(), "archive written");
    Ok(ArchiveSummary { path, entries })
}

/// Copies the file named by `files.main` over the script entry point.
///
/// # Errors
///
/// Returns [`TrafficError::Configuration`] when `files.main` is absent and
/// [`TrafficError::NotFound`] when the named file does not exist in the source
/// directory.
pub fn get_main(ctx: &WorkingContext, definition: &DefinitionDocument) -> Result<(), TrafficError> {
    let main_file = definition.main_file().ok_or_else(|| {
        TrafficError::configuration(format!("{}.yaml is missing files.main", definition.name()))
    })?;
    let source = ctx.source_dir().join(main_file);
    let contents = files::read(&source)?;
    let target = ctx.entry_point_path();
    files::write(&target, contents)?;
    info!(from = %source, to = %target, "entry point replaced");
    Ok(())
}

fn select_entries(
    source: &Utf8Path,
    definition: &DefinitionDocument,
) -> Result<BTreeMap<String, Utf8PathBuf>, TrafficError> {
    let mut selected = BTreeMap::new();
    for path in files::walk_files(source)? {
        let Some(base) = path.file_name().map(str::to_owned) else {
            continue;
        };
        if !should_include(&base, definition) {
            debug!(file = %path, "excluded from archive");
            continue;
        }
        if let Some(previous) = selected.insert(base, path.clone()) {
            debug!(file = %path, replaced = %previous, "archive entry name collision");
        }
    }
    Ok(selected)
}

fn write_archive(
    path: &Utf8Path,
    entries: &BTreeMap<String, Utf8PathBuf>,
) -> Result<(), TrafficError> {
    let io_error = |message: String| TrafficError::Io {
        path: path.to_path_buf(),
        message,
    };

    let file = files::create_file(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, source) in entries {
        let contents = files::read(source)?;
        zip.start_file(name.as_str(), options)
            .map_err(|err| io_error(err.to_string()))?;
        zip.write_all(&contents)
            .map_err(|err| io_error(err.to_string()))?;
        debug!(entry = %name, source = %source, "archived");
    }
    zip.finish().map_err(|err| io_error(err.to_string()))?;
    Ok(())
}
