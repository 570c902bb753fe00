//! Blocking HTTP implementation of [`CloudShellApi`].

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, info};

use super::responses::{
    parse_created_resource, parse_created_reservation, parse_logon_token,
    parse_reservation_details, parse_reservations, parse_resource_list,
};
use super::xml::{RequestBody, RequestItem, XmlNode, parse_response};
use super::{
    AttributeNameValue, CloudShellApi, GlobalInput, ReservationDetails, ReservationSummary,
    ResourceAttributesUpdate, ResourceInfo, ResourceRequest, SessionError, SetConnectorRequest,
};
use crate::config::CloudShellConfig;
use crate::files;

/// Default port of the server's XML API.
pub const API_PORT: u16 = 8029;

/// Per-request timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const API_PATH: &str = "ResourceManagerApiService";

/// Authenticated session against the server's XML API.
#[derive(Clone, Debug)]
pub struct CloudShellSession {
    client: Client,
    base_url: String,
    host: String,
    username: String,
    password: String,
    domain: String,
    token: String,
}

impl CloudShellSession {
    /// Logs on using the connection settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the server is unreachable or rejects the
    /// credentials.
    pub fn connect(config: &CloudShellConfig) -> Result<Self, SessionError> {
        Self::connect_to(
            &config.host,
            config.api_port,
            &config.username,
            &config.password,
            &config.domain,
        )
    }

    /// Logs on to `host:port` with explicit credentials.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the server is unreachable or rejects the
    /// credentials.
    pub fn connect_to(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        domain: &str,
    ) -> Result<Self, SessionError> {
        let base_url = format!("http://{host}:{port}/{API_PATH}");
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| SessionError::Transport {
                url: base_url.clone(),
                message: err.to_string(),
            })?;

        let mut session = Self {
            client,
            base_url,
            host: host.to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
            domain: domain.to_owned(),
            token: String::new(),
        };
        let logon = RequestBody::new("Logon")
            .text("username", username)
            .text("password", password)
            .text("domainName", domain);
        let info = session.call(&logon)?;
        session.token = parse_logon_token(&info)?;
        info!(host, username, domain, "logged on");
        Ok(session)
    }

    fn call(&self, body: &RequestBody) -> Result<XmlNode, SessionError> {
        let method = body.method();
        let url = format!("{}/{method}", self.base_url);
        let transport = |err: reqwest::Error| SessionError::Transport {
            url: url.clone(),
            message: err.to_string(),
        };

        debug!(method, "calling server");
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/xml")
            .header(ACCEPT, "*/*")
            .header(
                AUTHORIZATION,
                format!("MachineName={};Token={}", self.host, self.token),
            )
            .body(body.to_xml()?)
            .send()
            .map_err(transport)?;

        let status = response.status();
        let text = response.text().map_err(transport)?;
        if !status.is_success() {
            return Err(SessionError::Http {
                method: method.to_owned(),
                status: status.as_u16(),
                body: text,
            });
        }
        parse_response(method, &text)
    }
}

fn attribute_items(attributes: &[AttributeNameValue]) -> Vec<RequestItem> {
    attributes
        .iter()
        .map(|attribute| {
            RequestItem::new("AttributeNameValue")
                .field("Name", attribute.name.as_str())
                .field("Value", attribute.value.as_str())
        })
        .collect()
}

impl CloudShellApi for CloudShellSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> &str {
        &self.password
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn token(&self) -> &str {
        &self.token
    }

    fn get_current_reservations(
        &self,
        owner: &str,
    ) -> Result<Vec<ReservationSummary>, SessionError> {
        let info =
            self.call(&RequestBody::new("GetCurrentReservations").text("reservationOwner", owner))?;
        Ok(parse_reservations(&info))
    }

    fn create_immediate_reservation(
        &self,
        name: &str,
        owner: &str,
        duration_minutes: u32,
    ) -> Result<ReservationSummary, SessionError> {
        let method = "CreateImmediateReservation";
        let info = self.call(
            &RequestBody::new(method)
                .text("reservationName", name)
                .text("owner", owner)
                .text("durationInMinutes", duration_minutes.to_string()),
        )?;
        parse_created_reservation(method, &info)
    }

    fn create_immediate_topology_reservation(
        &self,
        name: &str,
        owner: &str,
        topology: &str,
        global_inputs: &[GlobalInput],
        duration_minutes: u32,
    ) -> Result<ReservationSummary, SessionError> {
        let method = "CreateImmediateTopologyReservation";
        let inputs = global_inputs
            .iter()
            .map(|input| {
                RequestItem::new("UpdateTopologyGlobalInputsRequest")
                    .field("ParamName", input.name.as_str())
                    .field("Value", input.value.as_str())
            })
            .collect();
        let info = self.call(
            &RequestBody::new(method)
                .text("reservationName", name)
                .text("owner", owner)
                .text("durationInMinutes", duration_minutes.to_string())
                .text("topologyFullPath", topology)
                .list("globalInputs", inputs),
        )?;
        parse_created_reservation(method, &info)
    }

    fn end_reservation(&self, reservation_id: &str) -> Result<(), SessionError> {
        self.call(
            &RequestBody::new("EndReservation")
                .text("reservationId", reservation_id)
                .text("unmap", "true"),
        )?;
        Ok(())
    }

    fn get_reservation_details(
        &self,
        reservation_id: &str,
    ) -> Result<ReservationDetails, SessionError> {
        let info = self
            .call(&RequestBody::new("GetReservationDetails").text("reservationId", reservation_id))?;
        parse_reservation_details(&info)
    }

    fn delete_reservation(&self, reservation_id: &str) -> Result<(), SessionError> {
        self.call(
            &RequestBody::new("DeleteReservation")
                .text("reservationId", reservation_id)
                .text("unmap", "true"),
        )?;
        Ok(())
    }

    fn get_resource_list(&self) -> Result<Vec<ResourceInfo>, SessionError> {
        let info = self.call(&RequestBody::new("GetResourceList").text("folderFullPath", ""))?;
        Ok(parse_resource_list(&info))
    }

    fn create_resource(&self, request: &ResourceRequest) -> Result<ResourceInfo, SessionError> {
        let info = self.call(
            &RequestBody::new("CreateResource")
                .text("resourceFamily", "")
                .text("resourceModel", request.model.as_str())
                .text("resourceName", request.name.as_str())
                .text("resourceAddress", request.address.as_str())
                .text("folderFullPath", request.folder.as_str())
                .text("parentResourceFullPath", "")
                .text("resourceDescription", request.description.as_str()),
        )?;
        Ok(parse_created_resource(&info))
    }

    fn delete_resource(&self, name: &str) -> Result<(), SessionError> {
        self.call(&RequestBody::new("DeleteResource").text("resourceFullPath", name))?;
        Ok(())
    }

    fn update_resource_driver(&self, name: &str, driver: &str) -> Result<(), SessionError> {
        self.call(
            &RequestBody::new("UpdateResourceDriver")
                .text("resourceFullPath", name)
                .text("driverName", driver),
        )?;
        Ok(())
    }

    fn set_attributes_values(
        &self,
        updates: &[ResourceAttributesUpdate],
    ) -> Result<(), SessionError> {
        let requests = updates
            .iter()
            .map(|update| {
                RequestItem::new("ResourceAttributesUpdateRequest")
                    .field("ResourceFullName", update.resource_full_name.as_str())
                    .list("AttributeNamesValues", attribute_items(&update.attributes))
            })
            .collect();
        self.call(
            &RequestBody::new("SetAttributesValues").list("resourcesAttributesUpdateRequests", requests),
        )?;
        Ok(())
    }

    fn add_service_to_reservation(
        &self,
        reservation_id: &str,
        model: &str,
        alias: &str,
        attributes: &[AttributeNameValue],
    ) -> Result<(), SessionError> {
        self.call(
            &RequestBody::new("AddServiceToReservation")
                .text("reservationId", reservation_id)
                .text("serviceName", model)
                .text("alias", alias)
                .list("attributes", attribute_items(attributes)),
        )?;
        Ok(())
    }

    fn set_connectors_in_reservation(
        &self,
        reservation_id: &str,
        connectors: &[SetConnectorRequest],
    ) -> Result<(), SessionError> {
        let items = connectors
            .iter()
            .map(|connector| {
                RequestItem::new("SetConnectorRequest")
                    .field("SourceResourceFullName", connector.source.as_str())
                    .field("TargetResourceFullName", connector.target.as_str())
                    .field("Direction", connector.direction.as_str())
                    .field("Alias", connector.alias.as_str())
            })
            .collect();
        self.call(
            &RequestBody::new("SetConnectorsInReservation")
                .text("reservationId", reservation_id)
                .list("connectors", items),
        )?;
        Ok(())
    }

    fn update_script(&self, name: &str, archive: &Utf8Path) -> Result<(), SessionError> {
        let bytes = files::read(archive).map_err(|err| SessionError::Io {
            path: archive.to_string(),
            message: err.to_string(),
        })?;
        debug!(script = name, archive = %archive, size = bytes.len(), "uploading script");
        self.call(
            &RequestBody::new("UpdateScript")
                .text("scriptName", name)
                .text("scriptFile", STANDARD.encode(&bytes)),
        )?;
        info!(script = name, "script updated");
        Ok(())
    }
}
