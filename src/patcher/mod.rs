//! Metadata patcher for the package manifest and the driver descriptor.
//!
//! Both operations are read-modify-write on fixed paths of the working
//! context. The new content is built completely in memory before the file is
//! rewritten, so a parse failure never leaves a half-written file behind.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};
use tracing::info;

use crate::context::{WorkingContext, definition_stem};
use crate::definition::{DefinitionDocument, MainClass};
use crate::error::TrafficError;
use crate::files;

/// Manifest key naming the package's entry definition document.
pub const ENTRY_DEFINITIONS_KEY: &str = "Entry-Definitions";

const MAIN_CLASS_ATTRIBUTE: &str = "MainClass";
const NAME_ATTRIBUTE: &str = "Name";

/// Points the package manifest at `<definition>.yaml`.
///
/// # Errors
///
/// Returns [`TrafficError::NotFound`] when the manifest is missing and
/// [`TrafficError::Configuration`] when it is not a YAML mapping.
pub fn set_entry_definitions(ctx: &WorkingContext, definition: &str) -> Result<(), TrafficError> {
    let path = ctx.manifest_path();
    let contents = files::read_to_string(&path)?;
    let patched = rewrite_entry_definitions(&contents, definition)?;
    files::write(&path, patched)?;
    info!(manifest = %path, definition, "set entry definitions");
    Ok(())
}

/// Rewrites the driver descriptor's `MainClass` and `Name` attributes from
/// the definition's `metadata.main_class`.
///
/// The main class is validated before the descriptor is read.
///
/// # Errors
///
/// Returns [`TrafficError::Configuration`] when the main class is missing or
/// malformed or the descriptor is not well-formed XML, and
/// [`TrafficError::NotFound`] when the descriptor is missing.
pub fn set_driver_main_class(
    ctx: &WorkingContext,
    definition: &DefinitionDocument,
) -> Result<(), TrafficError> {
    let main_class = definition.main_class()?;
    let path = ctx.driver_descriptor_path();
    let contents = files::read_to_string(&path)?;
    let patched = patch_driver_descriptor(&contents, &main_class)?;
    files::write(&path, patched)?;
    info!(
        descriptor = %path,
        main_class = %main_class,
        name = main_class.driver_name(),
        "set driver main class"
    );
    Ok(())
}

/// Returns `manifest` re-serialised with `Entry-Definitions` set to
/// `<definition>.yaml`. Other keys keep their order and values.
///
/// # Errors
///
/// Returns [`TrafficError::Configuration`] when `manifest` is not a YAML
/// mapping.
pub fn rewrite_entry_definitions(manifest: &str, definition: &str) -> Result<String, TrafficError> {
    let value: serde_yaml::Value = serde_yaml::from_str(manifest).map_err(|err| {
        TrafficError::configuration(format!("package manifest is not valid YAML: {err}"))
    })?;
    let serde_yaml::Value::Mapping(mut mapping) = value else {
        return Err(TrafficError::configuration(
            "package manifest is not a key/value mapping",
        ));
    };
    mapping.insert(
        serde_yaml::Value::from(ENTRY_DEFINITIONS_KEY),
        serde_yaml::Value::from(format!("{}.yaml", definition_stem(definition))),
    );
    serde_yaml::to_string(&mapping).map_err(|err| {
        TrafficError::configuration(format!("failed to serialise package manifest: {err}"))
    })
}

/// Returns `descriptor` with the root element's `MainClass` and `Name` set
/// from `main_class`.
///
/// Everything outside the root start tag is copied through unchanged.
/// Attributes the root does not yet carry are appended.
///
/// # Errors
///
/// Returns [`TrafficError::Configuration`] when the descriptor is not
/// well-formed or has no root element.
pub fn patch_driver_descriptor(
    descriptor: &str,
    main_class: &MainClass,
) -> Result<String, TrafficError> {
    let mut reader = Reader::from_str(descriptor);
    let mut writer = Writer::new(Vec::new());
    let mut root_seen = false;

    loop {
        let event = reader.read_event().map_err(|err| malformed(&err))?;
        let output = match event {
            Event::Eof => break,
            Event::Start(start) if !root_seen => {
                root_seen = true;
                Event::Start(patch_root(&start, main_class)?)
            }
            Event::Empty(start) if !root_seen => {
                root_seen = true;
                Event::Empty(patch_root(&start, main_class)?)
            }
            other => other,
        };
        writer.write_event(output).map_err(|err| malformed(&err))?;
    }

    if !root_seen {
        return Err(TrafficError::configuration(
            "driver descriptor has no root element",
        ));
    }

    String::from_utf8(writer.into_inner()).map_err(|err| malformed(&err))
}

fn patch_root(
    start: &BytesStart<'_>,
    main_class: &MainClass,
) -> Result<BytesStart<'static>, TrafficError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|err| malformed(&err))?
        .to_owned();
    let mut patched = BytesStart::new(name);
    let mut main_class_set = false;
    let mut name_set = false;

    for item in start.attributes() {
        let attribute = item.map_err(|err| malformed(&err))?;
        let key = attribute.key.as_ref();
        if key == MAIN_CLASS_ATTRIBUTE.as_bytes() {
            patched.push_attribute((MAIN_CLASS_ATTRIBUTE, main_class.as_str()));
            main_class_set = true;
        } else if key == NAME_ATTRIBUTE.as_bytes() {
            patched.push_attribute((NAME_ATTRIBUTE, main_class.driver_name()));
            name_set = true;
        } else {
            patched.push_attribute(attribute);
        }
    }

    if !main_class_set {
        patched.push_attribute((MAIN_CLASS_ATTRIBUTE, main_class.as_str()));
    }
    if !name_set {
        patched.push_attribute((NAME_ATTRIBUTE, main_class.driver_name()));
    }
    Ok(patched)
}

fn malformed(err: &impl std::fmt::Display) -> TrafficError {
    TrafficError::configuration(format!("driver descriptor is malformed: {err}"))
}

#[cfg(test)]
mod tests;
