//! Helpers for driver and script tests that run against a live server.
//!
//! [`TestHarness`] owns a session and the reservation created for the test.
//! Teardown never fails a test: errors are logged and discarded so a
//! half-ended reservation does not mask the real test outcome.

use std::collections::BTreeMap;

use camino::Utf8Path;
use tracing::{info, warn};

use crate::config::{CloudShellConfig, DeploymentDescriptor, find_shell_root};
use crate::error::TrafficError;
use crate::session::{
    AttributeNameValue, CloudShellApi, CloudShellSession, GlobalInput, ReservationSummary,
    ResourceAttributesUpdate, ResourceInfo, ResourceRequest, SessionError, SetConnectorRequest,
};

mod contexts;
mod report;
mod reservation;

pub use contexts::{
    AppContext, AutoLoadCommandContext, CLOUDSHELL_API_PORT, CLOUDSHELL_API_SCHEME,
    CLOUDSHELL_VERSION, CUSTOM_SERVICE_FAMILY, ConnectivityContext, InitCommandContext,
    QUALI_API_PORT, ReservationContextDetails, ResourceCommandContext, ResourceContextDetails,
    resource_details,
};
pub use report::{
    DEVICES_FILE, HealthCheckError, Inventory, InventoryAttribute, InventoryResource,
    check_health_report, format_inventory, load_devices,
};
pub use reservation::{
    DEFAULT_COMPONENT_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_TEARDOWN_TIMEOUT, TeardownPolicy,
    create_reservation, end_named_reservations, end_reservation, wait_for_connectors,
    wait_for_services,
};

/// Reservation name used when a test does not pick one.
pub const DEFAULT_RESERVATION_NAME: &str = "tg regression tests";

/// Model of the health-check status service.
pub const HEALTH_CHECK_STATUS_MODEL: &str = "Health Check Status";

/// Full name given to resources initialised without one.
pub const DEFAULT_RESOURCE_FULL_NAME: &str = "Testing/testing";

const AUTOLOAD_RESOURCE_DESCRIPTION: &str = "should be removed after test";

/// Opens a session using the packaging toolchain's configuration for
/// `base_dir`, falling back to the layered configuration.
///
/// # Errors
///
/// Returns [`TrafficError`] when configuration cannot be resolved or logon
/// fails.
pub fn session_from_config(base_dir: &Utf8Path) -> Result<CloudShellSession, TrafficError> {
    let config = CloudShellConfig::resolve(base_dir)?;
    Ok(CloudShellSession::connect(&config)?)
}

/// Opens a session using the `deployment.xml` found from `start`.
///
/// # Errors
///
/// Returns [`TrafficError`] when the descriptor is missing or malformed, or
/// logon fails.
pub fn session_from_deployment(start: &Utf8Path) -> Result<CloudShellSession, TrafficError> {
    let root = find_shell_root(start)?;
    let config = DeploymentDescriptor::load(&root)?.into_config();
    Ok(CloudShellSession::connect(&config)?)
}

/// Session plus the reservation created for the current test.
#[derive(Debug)]
pub struct TestHarness<S: CloudShellApi> {
    session: S,
    reservation: Option<ReservationSummary>,
    policy: TeardownPolicy,
    duration_minutes: u32,
}

impl<S: CloudShellApi> TestHarness<S> {
    /// Wraps `session` with the default polling policy and reservation
    /// length.
    #[must_use]
    pub fn new(session: S) -> Self {
        Self {
            session,
            reservation: None,
            policy: TeardownPolicy::default(),
            duration_minutes: crate::config::DEFAULT_RESERVATION_MINUTES,
        }
    }

    /// Overrides the polling policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: TeardownPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the reservation length.
    #[must_use]
    pub const fn with_duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Underlying session.
    #[must_use]
    pub const fn session(&self) -> &S {
        &self.session
    }

    /// Current reservation, if any.
    #[must_use]
    pub const fn reservation(&self) -> Option<&ReservationSummary> {
        self.reservation.as_ref()
    }

    /// Current reservation identifier; empty when there is none.
    #[must_use]
    pub fn reservation_id(&self) -> &str {
        self.reservation
            .as_ref()
            .map_or("", |reservation| reservation.id.as_str())
    }

    /// Creates a reservation from `topology`, ending same-named reservations
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the reservation cannot be created.
    pub fn create_topology_reservation(
        &mut self,
        topology: &str,
        global_inputs: &[GlobalInput],
        name: &str,
    ) -> Result<&ReservationSummary, SessionError> {
        let created = create_reservation(
            &self.session,
            name,
            Some(topology),
            global_inputs,
            self.duration_minutes,
            &self.policy,
        )?;
        Ok(self.reservation.insert(created))
    }

    /// Creates an empty reservation, ending same-named reservations first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the reservation cannot be created.
    pub fn create_reservation(&mut self, name: &str) -> Result<&ReservationSummary, SessionError> {
        let created = create_reservation(
            &self.session,
            name,
            None,
            &[],
            self.duration_minutes,
            &self.policy,
        )?;
        Ok(self.reservation.insert(created))
    }

    /// Ends and deletes the current reservation. Failures are logged and
    /// discarded; the harness forgets the reservation either way.
    pub fn end_reservation(&mut self) {
        let Some(reservation) = self.reservation.take() else {
            return;
        };
        if let Err(err) = end_reservation(&self.session, &reservation.id, &self.policy) {
            warn!(reservation_id = %reservation.id, error = %err, "reservation teardown failed");
        }
    }

    fn connectivity(&self) -> ConnectivityContext {
        ConnectivityContext::new(self.session.host(), self.session.token())
    }

    /// Context for running a driver's autoload against `address`.
    #[must_use]
    pub fn autoload_command_context(
        &self,
        family: &str,
        model: &str,
        address: &str,
        attributes: BTreeMap<String, String>,
    ) -> AutoLoadCommandContext {
        AutoLoadCommandContext {
            connectivity: self.connectivity(),
            resource: resource_details(family, model, address, attributes, "Resource", ""),
        }
    }

    /// Context for initialising a service driver.
    #[must_use]
    pub fn service_init_command_context(
        &self,
        model: &str,
        attributes: BTreeMap<String, String>,
    ) -> InitCommandContext {
        InitCommandContext {
            connectivity: self.connectivity(),
            resource: resource_details(CUSTOM_SERVICE_FAMILY, model, "na", attributes, "Service", ""),
        }
    }

    /// Context for initialising a resource driver. `full_name` defaults to
    /// [`DEFAULT_RESOURCE_FULL_NAME`].
    #[must_use]
    pub fn resource_init_command_context(
        &self,
        family: &str,
        model: &str,
        address: &str,
        attributes: BTreeMap<String, String>,
        full_name: Option<&str>,
    ) -> InitCommandContext {
        let full_name = full_name.unwrap_or(DEFAULT_RESOURCE_FULL_NAME);
        InitCommandContext {
            connectivity: self.connectivity(),
            resource: resource_details(family, model, address, attributes, "Resource", full_name),
        }
    }

    /// Context for running a command on a resource or service of the current
    /// reservation.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Configuration`] when there is no reservation,
    /// neither name is given, or the named component is not found, and
    /// [`TrafficError::RemoteOperation`] when a lookup call fails.
    pub fn resource_command_context(
        &self,
        resource_name: Option<&str>,
        service_name: Option<&str>,
    ) -> Result<ResourceCommandContext, TrafficError> {
        let reservation = self
            .reservation
            .as_ref()
            .ok_or_else(|| TrafficError::configuration("no active reservation"))?;
        let details = self.session.get_reservation_details(&reservation.id)?;

        let resource = match (resource_name, service_name) {
            (Some(name), _) => {
                let found = self
                    .session
                    .get_resource_list()?
                    .into_iter()
                    .find(|resource| resource.name == name)
                    .ok_or_else(|| TrafficError::configuration(format!("resource {name} not found")))?;
                let full_name = if found.folder.is_empty() {
                    found.name.clone()
                } else {
                    format!("{}/{}", found.folder, found.name)
                };
                ResourceContextDetails {
                    address: found.address,
                    model: found.model,
                    ..resource_details("", "", "", BTreeMap::new(), "Resource", &full_name)
                }
            }
            (None, Some(alias)) => {
                if !details.services.iter().any(|service| service == alias) {
                    return Err(TrafficError::configuration(format!(
                        "service {alias} not in reservation {}",
                        reservation.id
                    )));
                }
                resource_details(CUSTOM_SERVICE_FAMILY, "", "na", BTreeMap::new(), "Service", alias)
            }
            (None, None) => {
                return Err(TrafficError::configuration(
                    "resource_command_context needs a resource or service name",
                ));
            }
        };

        let user = self.session.username().to_owned();
        Ok(ResourceCommandContext {
            connectivity: self.connectivity(),
            resource,
            reservation: ReservationContextDetails {
                environment_name: details.name,
                domain: self.session.domain().to_owned(),
                owner_user: user.clone(),
                reservation_id: reservation.id.clone(),
                running_user: user,
                ..ReservationContextDetails::default()
            },
            connectors: Vec::new(),
        })
    }

    /// Creates resource `full_name` (`folder/name`) for autoload tests,
    /// replacing any resource with the same name, assigns the driver named
    /// after `model`, and sets `attributes` when given.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when any call fails.
    pub fn create_autoload_resource(
        &self,
        model: &str,
        full_name: &str,
        address: &str,
        attributes: &[AttributeNameValue],
    ) -> Result<ResourceInfo, SessionError> {
        let path = Utf8Path::new(full_name);
        let folder = path.parent().map(Utf8Path::as_str).unwrap_or_default();
        let name = path.file_name().unwrap_or(full_name);

        if let Some(existing) = self
            .session
            .get_resource_list()?
            .into_iter()
            .find(|resource| resource.name == name)
        {
            self.session.delete_resource(&existing.name)?;
        }

        let resource = self.session.create_resource(&ResourceRequest {
            model: model.to_owned(),
            name: name.to_owned(),
            folder: folder.to_owned(),
            address: address.to_owned(),
            description: AUTOLOAD_RESOURCE_DESCRIPTION.to_owned(),
        })?;
        self.session.update_resource_driver(&resource.name, model)?;
        if !attributes.is_empty() {
            self.session.set_attributes_values(&[ResourceAttributesUpdate {
                resource_full_name: full_name.to_owned(),
                attributes: attributes.to_vec(),
            }])?;
        }
        info!(resource = %resource.name, model, "autoload resource created");
        Ok(resource)
    }

    /// Adds one health-check status service per alias (mapped to its status
    /// selector), connects each to `source`, and waits for them to appear.
    /// An empty map adds a single service aliased after the model with
    /// selector `none`.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError`] when there is no reservation, a call fails,
    /// or the services and connectors do not appear in time.
    pub fn create_health_check_services(
        &self,
        source: &str,
        aliases: &BTreeMap<String, String>,
    ) -> Result<(), TrafficError> {
        let reservation_id = self
            .reservation
            .as_ref()
            .map(|reservation| reservation.id.clone())
            .ok_or_else(|| TrafficError::configuration("no active reservation"))?;
        let defaults = BTreeMap::from([(
            HEALTH_CHECK_STATUS_MODEL.to_owned(),
            String::from("none"),
        )]);
        let selected = if aliases.is_empty() { &defaults } else { aliases };

        for (alias, selector) in selected {
            let attributes = [AttributeNameValue::new(
                format!("{HEALTH_CHECK_STATUS_MODEL}.status_selector"),
                selector.as_str(),
            )];
            self.session.add_service_to_reservation(
                &reservation_id,
                HEALTH_CHECK_STATUS_MODEL,
                alias,
                &attributes,
            )?;
            self.session.set_connectors_in_reservation(
                &reservation_id,
                &[SetConnectorRequest {
                    source: source.to_owned(),
                    target: alias.clone(),
                    direction: String::from("bi"),
                    alias: alias.clone(),
                }],
            )?;
        }

        let names: Vec<String> = selected.keys().cloned().collect();
        wait_for_services(&self.session, &reservation_id, &names, &self.policy)?;
        wait_for_connectors(&self.session, &reservation_id, &names, &self.policy)?;
        Ok(())
    }

    /// Waits until `aliases` are services of the current reservation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] when they do not appear in time.
    pub fn wait_for_services(&self, aliases: &[String]) -> Result<(), SessionError> {
        wait_for_services(&self.session, self.reservation_id(), aliases, &self.policy)
    }

    /// Waits until `aliases` are connected in the current reservation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] when they do not appear in time.
    pub fn wait_for_connectors(&self, aliases: &[String]) -> Result<(), SessionError> {
        wait_for_connectors(&self.session, self.reservation_id(), aliases, &self.policy)
    }
}

#[cfg(test)]
mod tests;
