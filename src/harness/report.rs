//! Device inventories and health-check reports.

use camino::Utf8Path;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::TrafficError;
use crate::files;

/// Default devices file, relative to the shell root.
pub const DEVICES_FILE: &str = "devices.yaml";

/// A resource discovered by autoload.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct InventoryResource {
    /// Address relative to the root resource.
    pub relative_address: String,
    /// Resource model.
    pub model: String,
    /// Resource name.
    pub name: String,
}

/// An attribute discovered by autoload.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct InventoryAttribute {
    /// Address of the owning resource.
    pub relative_address: String,
    /// Attribute name.
    pub attribute_name: String,
    /// Attribute value.
    pub attribute_value: String,
}

/// Autoload result.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Inventory {
    /// Discovered resources.
    #[serde(default)]
    pub resources: Vec<InventoryResource>,
    /// Discovered attributes.
    #[serde(default)]
    pub attributes: Vec<InventoryAttribute>,
}

/// Reasons a health-check report is rejected.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HealthCheckError {
    /// The report has no `report` object.
    #[error("health check has no report")]
    MissingReport,
    /// The report names a different resource.
    #[error("health check reports on {actual}, expected {expected}")]
    WrongResource {
        /// Resource named by the device.
        expected: String,
        /// Resource named by the report.
        actual: String,
    },
    /// The device entry has no `resource` name.
    #[error("device entry has no resource name")]
    MissingDeviceResource,
    /// `report.result` is not a boolean.
    #[error("health check result is not a boolean: {0}")]
    NonBooleanResult(String),
}

/// Reads the devices file: the path in environment variable `env_var` when
/// set, otherwise `devices.yaml` under `shell_root`.
///
/// # Errors
///
/// Returns [`TrafficError::NotFound`] when the file is missing and
/// [`TrafficError::Configuration`] when it is not valid YAML.
pub fn load_devices(
    shell_root: &Utf8Path,
    env_var: Option<&str>,
) -> Result<serde_yaml::Value, TrafficError> {
    let path = env_var
        .and_then(|name| std::env::var(name).ok())
        .filter(|value| !value.trim().is_empty())
        .map_or_else(|| shell_root.join(DEVICES_FILE), Into::into);
    debug!(devices = %path, "loading devices");
    let contents = files::read_to_string(&path)?;
    serde_yaml::from_str(&contents)
        .map_err(|err| TrafficError::configuration(format!("{path}: {err}")))
}

/// Renders an inventory: a blank line, one `address, model, name` line per
/// resource, a blank line, then one `address, name, value` line per
/// attribute.
#[must_use]
pub fn format_inventory(inventory: &Inventory) -> String {
    let mut out = String::from("\n\n");
    for resource in &inventory.resources {
        out.push_str(&format!(
            "{}, {}, {}\n",
            resource.relative_address, resource.model, resource.name
        ));
    }
    out.push_str("\n\n");
    for attribute in &inventory.attributes {
        out.push_str(&format!(
            "{}, {}, {}\n",
            attribute.relative_address, attribute.attribute_name, attribute.attribute_value
        ));
    }
    out
}

/// Checks a health-check report against its device entry: `report.name` must
/// equal the device's `resource`, and `report.result` must be a boolean.
///
/// # Errors
///
/// Returns [`HealthCheckError`] describing the first failed check.
pub fn check_health_report(
    health_check: &serde_json::Value,
    device: &serde_yaml::Value,
) -> Result<(), HealthCheckError> {
    debug!(
        report = %serde_json::to_string_pretty(health_check).unwrap_or_default(),
        "health check report"
    );
    let report = health_check
        .get("report")
        .filter(|value| value.is_object())
        .ok_or(HealthCheckError::MissingReport)?;
    let expected = device
        .get("resource")
        .and_then(serde_yaml::Value::as_str)
        .ok_or(HealthCheckError::MissingDeviceResource)?;
    let actual = report
        .get("name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    if actual != expected {
        return Err(HealthCheckError::WrongResource {
            expected: expected.to_owned(),
            actual: actual.to_owned(),
        });
    }
    match report.get("result") {
        Some(serde_json::Value::Bool(_)) => Ok(()),
        other => Err(HealthCheckError::NonBooleanResult(
            other.map_or_else(|| String::from("null"), ToString::to_string),
        )),
    }
}
