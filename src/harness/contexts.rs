//! Driver request contexts built for local driver tests.
//!
//! These mirror the objects the orchestration server hands to drivers and
//! serialise with the same field names.

use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::Serialize;
use uuid::Uuid;

/// Driver API port advertised to drivers.
pub const CLOUDSHELL_API_PORT: &str = "8029";

/// Packaging API port advertised to drivers.
pub const QUALI_API_PORT: &str = "9000";

/// Server version advertised to drivers.
pub const CLOUDSHELL_VERSION: &str = "9.1";

/// API scheme advertised to drivers.
pub const CLOUDSHELL_API_SCHEME: &str = "http";

/// Family of custom services.
pub const CUSTOM_SERVICE_FAMILY: &str = "CS_CustomService";

/// How to reach the server from inside a driver.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ConnectivityContext {
    /// Server host.
    pub server_address: String,
    /// Driver API port.
    pub cloudshell_api_port: String,
    /// Packaging API port.
    pub quali_api_port: String,
    /// Session token.
    pub admin_auth_token: String,
    /// Server version.
    pub cloudshell_version: String,
    /// API scheme.
    pub cloudshell_api_scheme: String,
}

impl ConnectivityContext {
    /// Builds the context for `host` and `token` with the fixed ports,
    /// version, and scheme.
    #[must_use]
    pub fn new(host: &str, token: &str) -> Self {
        Self {
            server_address: host.to_owned(),
            cloudshell_api_port: CLOUDSHELL_API_PORT.to_owned(),
            quali_api_port: QUALI_API_PORT.to_owned(),
            admin_auth_token: token.to_owned(),
            cloudshell_version: CLOUDSHELL_VERSION.to_owned(),
            cloudshell_api_scheme: CLOUDSHELL_API_SCHEME.to_owned(),
        }
    }
}

/// Deployed-app payloads; empty for physical resources.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AppContext {
    /// App request JSON.
    pub app_request_json: String,
    /// Deployed app JSON.
    pub deployed_app_json: String,
}

/// Resource the driver is invoked for.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ResourceContextDetails {
    /// Unique identifier.
    pub id: String,
    /// Resource name.
    pub name: String,
    /// Full resource path.
    pub fullname: String,
    /// `Resource` or `Service`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource address.
    pub address: String,
    /// Resource model.
    pub model: String,
    /// Resource family.
    pub family: String,
    /// Description.
    pub description: String,
    /// Attribute values by name.
    pub attributes: BTreeMap<String, String>,
    /// App payloads.
    pub app_context: AppContext,
    /// Network information.
    pub networks_info: String,
    /// Shell standard name.
    pub shell_standard: String,
    /// Shell standard version.
    pub shell_standard_version: String,
}

/// Reservation the driver is invoked in.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReservationContextDetails {
    /// Reservation name.
    pub environment_name: String,
    /// Reservation path.
    pub environment_path: String,
    /// Domain.
    pub domain: String,
    /// Description.
    pub description: String,
    /// Owner user.
    pub owner_user: String,
    /// Owner email.
    pub owner_email: String,
    /// Reservation identifier.
    pub reservation_id: String,
    /// Saved sandbox name.
    pub saved_sandbox_name: String,
    /// Saved sandbox identifier.
    pub saved_sandbox_id: String,
    /// User running the command.
    pub running_user: String,
}

/// Context passed to a driver's autoload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AutoLoadCommandContext {
    /// Server connectivity.
    pub connectivity: ConnectivityContext,
    /// Target resource.
    pub resource: ResourceContextDetails,
}

/// Context passed to a driver's initialisation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InitCommandContext {
    /// Server connectivity.
    pub connectivity: ConnectivityContext,
    /// Target resource.
    pub resource: ResourceContextDetails,
}

/// Context passed to a driver's resource commands.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResourceCommandContext {
    /// Server connectivity.
    pub connectivity: ConnectivityContext,
    /// Target resource.
    pub resource: ResourceContextDetails,
    /// Reservation the command runs in.
    pub reservation: ReservationContextDetails,
    /// Connectors attached to the resource.
    pub connectors: Vec<String>,
}

/// Builds resource details for a locally constructed context. The name is
/// the last path segment of `full_name`.
#[must_use]
pub fn resource_details(
    family: &str,
    model: &str,
    address: &str,
    attributes: BTreeMap<String, String>,
    kind: &str,
    full_name: &str,
) -> ResourceContextDetails {
    let name = Utf8Path::new(full_name)
        .file_name()
        .unwrap_or_default()
        .to_owned();
    ResourceContextDetails {
        id: Uuid::new_v4().to_string(),
        name,
        fullname: full_name.to_owned(),
        kind: kind.to_owned(),
        address: address.to_owned(),
        model: model.to_owned(),
        family: family.to_owned(),
        attributes,
        ..ResourceContextDetails::default()
    }
}
