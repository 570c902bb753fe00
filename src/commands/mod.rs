//! The four CLI flows: `pack`, `generate`, `install`, and `script`.
//!
//! Shell flows patch the package manifest and driver descriptor, then hand
//! over to the packaging toolchain. The script flow archives the script
//! sources and uploads them over an orchestration session that is only
//! opened once the archive exists.

use tracing::info;

use crate::archiver::{ArchiveSummary, build_archive};
use crate::context::WorkingContext;
use crate::definition::{DefinitionDocument, DefinitionKind};
use crate::error::TrafficError;
use crate::patcher::{set_driver_main_class, set_entry_definitions};
use crate::session::CloudShellApi;
use crate::toolchain::Toolchain;

fn patch_shell(ctx: &WorkingContext, definition: &str) -> Result<(), TrafficError> {
    let document = DefinitionDocument::load_for(ctx, definition, DefinitionKind::Shell)?;
    set_entry_definitions(ctx, definition)?;
    set_driver_main_class(ctx, &document)
}

/// Points the manifest at `definition`, sets the driver main class, then
/// packs the shell.
///
/// # Errors
///
/// Returns [`TrafficError`] from the patch steps or the toolchain. The
/// toolchain is not invoked when patching fails.
pub fn pack(
    ctx: &WorkingContext,
    definition: &str,
    toolchain: &impl Toolchain,
) -> Result<(), TrafficError> {
    patch_shell(ctx, definition)?;
    toolchain.pack()?;
    info!(definition, "shell packed");
    Ok(())
}

/// Runs the `pack` flow, then generates the data model.
///
/// # Errors
///
/// Returns [`TrafficError`] from any step. Nothing is patched when the
/// definition fails to load.
pub fn generate(
    ctx: &WorkingContext,
    definition: &str,
    toolchain: &impl Toolchain,
) -> Result<(), TrafficError> {
    pack(ctx, definition, toolchain)?;
    toolchain.generate()?;
    info!(definition, "data model generated");
    Ok(())
}

/// Runs the `pack` flow, then installs the shell.
///
/// # Errors
///
/// Returns [`TrafficError`] from any step.
pub fn install(
    ctx: &WorkingContext,
    definition: &str,
    toolchain: &impl Toolchain,
) -> Result<(), TrafficError> {
    pack(ctx, definition, toolchain)?;
    toolchain.install()?;
    info!(definition, "shell installed");
    Ok(())
}

/// Archives the script sources into `dist/<script_name>.zip`, then opens a
/// session through `connect` and replaces the server-side script with the
/// archive.
///
/// Only existing scripts can be updated; the first upload is manual.
///
/// # Errors
///
/// Returns [`TrafficError::Configuration`] when `script_name` is missing,
/// [`TrafficError::NotFound`] when the source directory is missing (no
/// session is opened), and [`TrafficError::RemoteOperation`] when logon or
/// the upload fails.
pub fn script<S, F>(
    ctx: &WorkingContext,
    definition: &str,
    connect: F,
) -> Result<ArchiveSummary, TrafficError>
where
    S: CloudShellApi,
    F: FnOnce() -> Result<S, TrafficError>,
{
    let document = DefinitionDocument::load_for(ctx, definition, DefinitionKind::Script)?;
    let script_name = document.archive_name(DefinitionKind::Script)?;
    let summary = build_archive(ctx, &document, script_name)?;

    let session = connect()?;
    session.update_script(script_name, &summary.path)?;
    info!(script = script_name, archive = %summary.path, "script updated");
    Ok(summary)
}
