//! Reservation lifecycle helpers: creation, teardown, and bounded waits.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::session::{
    COMPLETED_STATUS, CloudShellApi, GlobalInput, ReservationDetails, ReservationSummary,
    SessionError,
};

/// Default interval between reservation status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on waiting for a reservation to complete teardown.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(300);

/// Default bound on waiting for services or connectors to appear.
pub const DEFAULT_COMPONENT_TIMEOUT: Duration = Duration::from_secs(8);

/// Polling bounds for teardown and component waits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TeardownPolicy {
    poll_interval: Duration,
    timeout: Duration,
    component_timeout: Duration,
}

impl Default for TeardownPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TEARDOWN_TIMEOUT,
            component_timeout: DEFAULT_COMPONENT_TIMEOUT,
        }
    }
}

impl TeardownPolicy {
    /// Overrides the polling interval.
    ///
    /// This is primarily used by tests to keep polling scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the teardown wait timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the service and connector wait timeout.
    #[must_use]
    pub const fn with_component_timeout(mut self, timeout: Duration) -> Self {
        self.component_timeout = timeout;
        self
    }

    /// Interval between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Teardown wait bound.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Service and connector wait bound.
    #[must_use]
    pub const fn component_timeout(&self) -> Duration {
        self.component_timeout
    }
}

/// Creates a reservation named `name`, ending any of the session user's
/// reservations with the same name first. With a `topology` the reservation
/// is created from it; otherwise it starts empty.
///
/// # Errors
///
/// Returns [`SessionError`] when listing or creating fails. Failures while
/// ending the old reservations are logged and discarded.
pub fn create_reservation<S: CloudShellApi>(
    api: &S,
    name: &str,
    topology: Option<&str>,
    global_inputs: &[GlobalInput],
    duration_minutes: u32,
    policy: &TeardownPolicy,
) -> Result<ReservationSummary, SessionError> {
    end_named_reservations(api, name, policy)?;
    let owner = api.username();
    let reservation = topology.map_or_else(
        || api.create_immediate_reservation(name, owner, duration_minutes),
        |topology| {
            api.create_immediate_topology_reservation(
                name,
                owner,
                topology,
                global_inputs,
                duration_minutes,
            )
        },
    )?;
    info!(reservation_id = %reservation.id, name, "reservation created");
    Ok(reservation)
}

/// Tears down every reservation called `name` owned by the session user.
///
/// # Errors
///
/// Returns [`SessionError`] only when the reservations cannot be listed; each
/// individual teardown failure is logged and discarded.
pub fn end_named_reservations<S: CloudShellApi>(
    api: &S,
    name: &str,
    policy: &TeardownPolicy,
) -> Result<(), SessionError> {
    let reservations = api.get_current_reservations(api.username())?;
    for reservation in reservations.iter().filter(|item| item.name == name) {
        if let Err(err) = end_reservation(api, &reservation.id, policy) {
            warn!(reservation_id = %reservation.id, error = %err, "reservation teardown failed");
        }
    }
    Ok(())
}

/// Ends reservation `reservation_id`, waits until it reports `Completed`,
/// then deletes it.
///
/// # Errors
///
/// Returns [`SessionError`] when any call fails or the reservation does not
/// complete within the policy's timeout. Callers decide whether to surface or
/// discard the failure.
pub fn end_reservation<S: CloudShellApi>(
    api: &S,
    reservation_id: &str,
    policy: &TeardownPolicy,
) -> Result<(), SessionError> {
    api.end_reservation(reservation_id)?;
    poll_details(api, reservation_id, policy.timeout(), policy, "reservation completion", |details| {
        details.status == COMPLETED_STATUS
    })?;
    api.delete_reservation(reservation_id)?;
    info!(reservation_id, "reservation ended and deleted");
    Ok(())
}

/// Waits until every alias in `aliases` is a service in the reservation.
///
/// # Errors
///
/// Returns [`SessionError::Timeout`] when the services do not appear within
/// the policy's component timeout.
pub fn wait_for_services<S: CloudShellApi>(
    api: &S,
    reservation_id: &str,
    aliases: &[String],
    policy: &TeardownPolicy,
) -> Result<(), SessionError> {
    poll_details(
        api,
        reservation_id,
        policy.component_timeout(),
        policy,
        "services",
        |details| aliases.iter().all(|alias| details.services.contains(alias)),
    )
}

/// Waits until every alias in `aliases` is connected in the reservation.
///
/// # Errors
///
/// Returns [`SessionError::Timeout`] when the connectors do not appear within
/// the policy's component timeout.
pub fn wait_for_connectors<S: CloudShellApi>(
    api: &S,
    reservation_id: &str,
    aliases: &[String],
    policy: &TeardownPolicy,
) -> Result<(), SessionError> {
    poll_details(
        api,
        reservation_id,
        policy.component_timeout(),
        policy,
        "connectors",
        |details| {
            aliases.iter().all(|alias| {
                details
                    .connectors
                    .iter()
                    .any(|connector| &connector.target == alias || &connector.source == alias)
            })
        },
    )
}

fn poll_details<S, F>(
    api: &S,
    reservation_id: &str,
    timeout: Duration,
    policy: &TeardownPolicy,
    action: &str,
    ready: F,
) -> Result<(), SessionError>
where
    S: CloudShellApi,
    F: Fn(&ReservationDetails) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let details = api.get_reservation_details(reservation_id)?;
        if ready(&details) {
            return Ok(());
        }
        debug!(reservation_id, action, status = %details.status, "waiting");
        if Instant::now() >= deadline {
            return Err(SessionError::Timeout {
                action: action.to_owned(),
                reservation_id: reservation_id.to_owned(),
            });
        }
        thread::sleep(policy.poll_interval());
    }
}
