//! Conversion of `ResponseInfo` trees into typed results.

use super::{
    ConnectorInfo, ReservationDetails, ReservationSummary, ResourceInfo, SessionError, XmlNode,
};

fn malformed(method: &str, message: &str) -> SessionError {
    SessionError::MalformedResponse {
        method: method.to_owned(),
        message: message.to_owned(),
    }
}

fn reservation(node: &XmlNode) -> ReservationSummary {
    ReservationSummary {
        id: node.field_or_empty("Id"),
        name: node.field_or_empty("Name"),
        owner: node.field_or_empty("Owner"),
        status: node.field_or_empty("Status"),
    }
}

fn resource(node: &XmlNode) -> ResourceInfo {
    let address = node
        .field("FullAddress")
        .filter(|value| !value.is_empty())
        .or_else(|| node.field("Address"))
        .unwrap_or_default()
        .to_owned();
    ResourceInfo {
        name: node.field_or_empty("Name"),
        model: node
            .field("ResourceModelName")
            .or_else(|| node.field("Model"))
            .unwrap_or_default()
            .to_owned(),
        address,
        folder: node.field_or_empty("FolderFullPath"),
    }
}

/// Extracts the session token from a `Logon` response.
///
/// # Errors
///
/// Returns [`SessionError::MalformedResponse`] when no token is present.
pub fn parse_logon_token(info: &XmlNode) -> Result<String, SessionError> {
    info.child("Token")
        .map(|token| token.attr("Token").unwrap_or(token.text.as_str()))
        .or_else(|| info.attr("Token"))
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| malformed("Logon", "response carries no token"))
}

/// Extracts the reservation list from `GetCurrentReservations`.
#[must_use]
pub fn parse_reservations(info: &XmlNode) -> Vec<ReservationSummary> {
    info.child("Reservations")
        .map(|list| list.children_named("Reservation").map(reservation).collect())
        .unwrap_or_default()
}

/// Extracts the reservation created by `CreateImmediate*Reservation`.
///
/// # Errors
///
/// Returns [`SessionError::MalformedResponse`] when the response has no
/// reservation or the reservation has no identifier.
pub fn parse_created_reservation(
    method: &str,
    info: &XmlNode,
) -> Result<ReservationSummary, SessionError> {
    let created = info
        .child("Reservation")
        .map(reservation)
        .ok_or_else(|| malformed(method, "response carries no reservation"))?;
    if created.id.is_empty() {
        return Err(malformed(method, "reservation has no id"));
    }
    Ok(created)
}

/// Extracts reservation details from `GetReservationDetails`.
///
/// # Errors
///
/// Returns [`SessionError::MalformedResponse`] when the response carries no
/// reservation description.
pub fn parse_reservation_details(info: &XmlNode) -> Result<ReservationDetails, SessionError> {
    let description = info
        .child("ReservationDescription")
        .ok_or_else(|| malformed("GetReservationDetails", "missing ReservationDescription"))?;

    let services = description
        .child("Services")
        .map(|list| {
            list.children_named("ReservationService")
                .map(|service| service.field_or_empty("Alias"))
                .collect()
        })
        .unwrap_or_default();
    let connectors = description
        .child("Connectors")
        .map(|list| {
            list.children_named("Connector")
                .map(|connector| ConnectorInfo {
                    source: connector.field_or_empty("Source"),
                    target: connector.field_or_empty("Target"),
                    alias: connector.field_or_empty("Alias"),
                })
                .collect()
        })
        .unwrap_or_default();
    let resources = description
        .child("Resources")
        .map(|list| {
            list.children_named("ReservedResourceInfo")
                .map(|item| item.field_or_empty("Name"))
                .collect()
        })
        .unwrap_or_default();

    Ok(ReservationDetails {
        id: description.field_or_empty("Id"),
        name: description.field_or_empty("Name"),
        status: description.field_or_empty("Status"),
        services,
        connectors,
        resources,
    })
}

/// Extracts the resource list from `GetResourceList`.
#[must_use]
pub fn parse_resource_list(info: &XmlNode) -> Vec<ResourceInfo> {
    info.child("Resources")
        .map(|list| list.children_named("ResourceInfo").map(resource).collect())
        .unwrap_or_default()
}

/// Extracts the resource returned by `CreateResource`.
///
/// The server answers with the resource fields directly on `ResponseInfo`.
#[must_use]
pub fn parse_created_resource(info: &XmlNode) -> ResourceInfo {
    resource(info)
}
