//! Remote orchestration session abstraction.
//!
//! [`CloudShellApi`] names the remote calls this crate relies on; the
//! [`CloudShellSession`] implementation speaks the server's XML API over
//! HTTP. Everything that talks to the server (the `script` flow and the test
//! harness) is generic over the trait so fakes can stand in for the server.

use camino::Utf8Path;
use thiserror::Error;

use crate::error::TrafficError;

mod http;
mod responses;
mod xml;

pub use http::{API_PORT, CloudShellSession, HTTP_TIMEOUT};
pub use responses::{
    parse_created_resource, parse_created_reservation, parse_logon_token,
    parse_reservation_details, parse_reservations, parse_resource_list,
};
pub use xml::{RequestBody, RequestItem, XmlNode, parse_response};

/// Reservation status reported once teardown has finished.
pub const COMPLETED_STATUS: &str = "Completed";

/// A reservation as listed or created on the server.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReservationSummary {
    /// Server-assigned reservation identifier.
    pub id: String,
    /// Reservation display name.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// Lifecycle status (for example `Started` or `Completed`).
    pub status: String,
}

/// A connector between two reservation components.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectorInfo {
    /// Source component name.
    pub source: String,
    /// Target component name.
    pub target: String,
    /// Connector alias.
    pub alias: String,
}

/// Detailed view of a single reservation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReservationDetails {
    /// Server-assigned reservation identifier.
    pub id: String,
    /// Reservation display name.
    pub name: String,
    /// Lifecycle status.
    pub status: String,
    /// Aliases of services added to the reservation.
    pub services: Vec<String>,
    /// Connectors set in the reservation.
    pub connectors: Vec<ConnectorInfo>,
    /// Names of reserved resources.
    pub resources: Vec<String>,
}

/// A resource as known to the server.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceInfo {
    /// Resource name.
    pub name: String,
    /// Resource model.
    pub model: String,
    /// Resource address.
    pub address: String,
    /// Folder holding the resource.
    pub folder: String,
}

/// Attribute name and value pair.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributeNameValue {
    /// Attribute name, optionally model-qualified.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

impl AttributeNameValue {
    /// Creates a new pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Topology global input override.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GlobalInput {
    /// Input name.
    pub name: String,
    /// Input value.
    pub value: String,
}

/// Request to connect two reservation components.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SetConnectorRequest {
    /// Source component name.
    pub source: String,
    /// Target component name.
    pub target: String,
    /// Connector direction (`bi`, `uni`).
    pub direction: String,
    /// Connector alias.
    pub alias: String,
}

/// Parameters for creating a resource.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceRequest {
    /// Resource model.
    pub model: String,
    /// Resource name.
    pub name: String,
    /// Folder to create the resource in.
    pub folder: String,
    /// Resource address.
    pub address: String,
    /// Free-text description.
    pub description: String,
}

/// Attribute updates for a single resource.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceAttributesUpdate {
    /// Full resource path (`folder/name`).
    pub resource_full_name: String,
    /// Attributes to set.
    pub attributes: Vec<AttributeNameValue>,
}

/// Errors raised while talking to the orchestration server.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when the HTTP request cannot be sent or its body read.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Endpoint that was called.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the server answers with a non-success HTTP status.
    #[error("{method} returned HTTP {status}: {body}")]
    Http {
        /// API method that was called.
        method: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Raised when the server reports an API-level failure.
    #[error("{method} failed with error {code}: {message}")]
    Api {
        /// API method that was called.
        method: String,
        /// Server error code.
        code: String,
        /// Server error message.
        message: String,
    },
    /// Raised when a response cannot be interpreted.
    #[error("malformed {method} response: {message}")]
    MalformedResponse {
        /// API method that was called.
        method: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when a bounded wait runs out.
    #[error("timed out waiting for {action} on reservation {reservation_id}")]
    Timeout {
        /// What was being waited for.
        action: String,
        /// Reservation being polled.
        reservation_id: String,
    },
    /// Raised when a local file needed by the call cannot be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Operating system error string.
        message: String,
    },
}

impl From<SessionError> for TrafficError {
    fn from(value: SessionError) -> Self {
        let operation = match &value {
            SessionError::Http { method, .. }
            | SessionError::Api { method, .. }
            | SessionError::MalformedResponse { method, .. } => method.clone(),
            SessionError::Timeout { action, .. } => action.clone(),
            SessionError::Transport { .. } | SessionError::Io { .. } => String::from("session"),
        };
        Self::RemoteOperation {
            operation,
            message: value.to_string(),
        }
    }
}

/// Remote calls exposed by the orchestration server.
///
/// All calls are blocking and return once the server has answered.
pub trait CloudShellApi {
    /// Server host name.
    fn host(&self) -> &str;
    /// Logged-in user name.
    fn username(&self) -> &str;
    /// Logged-in user password.
    fn password(&self) -> &str;
    /// Logged-in domain.
    fn domain(&self) -> &str;
    /// Authentication token issued at logon.
    fn token(&self) -> &str;

    /// Lists reservations owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn get_current_reservations(&self, owner: &str)
    -> Result<Vec<ReservationSummary>, SessionError>;

    /// Creates an empty reservation starting now.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn create_immediate_reservation(
        &self,
        name: &str,
        owner: &str,
        duration_minutes: u32,
    ) -> Result<ReservationSummary, SessionError>;

    /// Creates a reservation from a saved topology starting now.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn create_immediate_topology_reservation(
        &self,
        name: &str,
        owner: &str,
        topology: &str,
        global_inputs: &[GlobalInput],
        duration_minutes: u32,
    ) -> Result<ReservationSummary, SessionError>;

    /// Ends a reservation; teardown continues asynchronously on the server.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn end_reservation(&self, reservation_id: &str) -> Result<(), SessionError>;

    /// Fetches details for a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn get_reservation_details(
        &self,
        reservation_id: &str,
    ) -> Result<ReservationDetails, SessionError>;

    /// Deletes a completed reservation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn delete_reservation(&self, reservation_id: &str) -> Result<(), SessionError>;

    /// Lists all resources.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn get_resource_list(&self) -> Result<Vec<ResourceInfo>, SessionError>;

    /// Creates a resource.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn create_resource(&self, request: &ResourceRequest) -> Result<ResourceInfo, SessionError>;

    /// Deletes a resource by name.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn delete_resource(&self, name: &str) -> Result<(), SessionError>;

    /// Assigns a driver to a resource.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn update_resource_driver(&self, name: &str, driver: &str) -> Result<(), SessionError>;

    /// Sets attribute values on resources.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn set_attributes_values(&self, updates: &[ResourceAttributesUpdate])
    -> Result<(), SessionError>;

    /// Adds a service to a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn add_service_to_reservation(
        &self,
        reservation_id: &str,
        model: &str,
        alias: &str,
        attributes: &[AttributeNameValue],
    ) -> Result<(), SessionError>;

    /// Sets connectors in a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the call fails.
    fn set_connectors_in_reservation(
        &self,
        reservation_id: &str,
        connectors: &[SetConnectorRequest],
    ) -> Result<(), SessionError>;

    /// Replaces the content of an existing script with `archive`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the archive cannot be read or the call
    /// fails.
    fn update_script(&self, name: &str, archive: &Utf8Path) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests;
