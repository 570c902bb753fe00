//! Unit tests for the reservation harness and report helpers.

use std::collections::BTreeMap;
use std::time::Duration;

use super::*;
use crate::error::ErrorKind;
use crate::session::COMPLETED_STATUS;
use crate::test_support::{EnvGuard, FakeCloudShell, Workspace};
use rstest::{fixture, rstest};

fn fast_policy() -> TeardownPolicy {
    TeardownPolicy::default()
        .with_poll_interval(Duration::ZERO)
        .with_component_timeout(Duration::from_millis(50))
}

#[fixture]
fn fake() -> FakeCloudShell {
    FakeCloudShell::new()
}

fn harness(fake: &FakeCloudShell) -> TestHarness<FakeCloudShell> {
    TestHarness::new(fake.clone()).with_policy(fast_policy())
}

fn api_failure(method: &str) -> SessionError {
    SessionError::Api {
        method: method.to_owned(),
        code: String::from("500"),
        message: String::from("server unavailable"),
    }
}

#[rstest]
fn create_reservation_ends_same_named_reservations_first(fake: FakeCloudShell) {
    let stale = fake.seed_reservation(DEFAULT_RESERVATION_NAME);
    let other = fake.seed_reservation("keep me");
    let mut harness = harness(&fake);

    let id = harness
        .create_reservation(DEFAULT_RESERVATION_NAME)
        .expect("create")
        .id
        .clone();

    let calls = fake.calls();
    let end_at = calls
        .iter()
        .position(|call| call == &format!("EndReservation {stale}"))
        .expect("stale reservation ended");
    let create_at = calls
        .iter()
        .position(|call| call.starts_with("CreateImmediateReservation"))
        .expect("reservation created");
    assert!(end_at < create_at, "{calls:?}");
    assert!(calls.contains(&format!("DeleteReservation {stale}")));
    assert!(!calls.contains(&format!("EndReservation {other}")));
    assert_eq!(harness.reservation_id(), id);
}

#[rstest]
fn topology_reservation_uses_topology_call(fake: FakeCloudShell) {
    let mut harness = harness(&fake);
    let inputs = [GlobalInput {
        name: String::from("Chassis"),
        value: String::from("10.0.0.1"),
    }];

    harness
        .create_topology_reservation("Environments/traffic", &inputs, "topology test")
        .expect("create");

    assert!(
        fake.calls()
            .contains(&String::from("CreateImmediateTopologyReservation Environments/traffic"))
    );
    assert_eq!(
        harness.reservation().map(|r| r.name.as_str()),
        Some("topology test")
    );
}

#[rstest]
fn teardown_waits_for_completion_before_deleting(fake: FakeCloudShell) {
    fake.complete_after_polls(3);
    let id = fake.seed_reservation("slow");

    end_reservation(&fake, &id, &fast_policy()).expect("teardown");

    let polls = fake
        .calls()
        .iter()
        .filter(|call| *call == &format!("GetReservationDetails {id}"))
        .count();
    assert_eq!(polls, 3);
    assert_eq!(
        fake.calls().last().map(String::as_str),
        Some(format!("DeleteReservation {id}").as_str())
    );
    assert!(fake.reservations().is_empty());
}

#[rstest]
fn teardown_times_out_when_reservation_never_completes(fake: FakeCloudShell) {
    fake.complete_after_polls(usize::MAX);
    let id = fake.seed_reservation("stuck");
    let policy = fast_policy().with_timeout(Duration::from_millis(20));

    let err = end_reservation(&fake, &id, &policy).expect_err("timeout");

    assert!(matches!(err, SessionError::Timeout { .. }), "{err:?}");
    assert!(!fake.calls().contains(&format!("DeleteReservation {id}")));
    assert_eq!(
        fake.details(&id).map(|details| details.status),
        Some(String::from("Ending"))
    );
}

#[rstest]
fn end_named_reservations_swallows_individual_failures(fake: FakeCloudShell) {
    let first = fake.seed_reservation("dup");
    let second = fake.seed_reservation("dup");
    fake.fail_on("EndReservation", api_failure("EndReservation"));

    end_named_reservations(&fake, "dup", &fast_policy()).expect("listing succeeds");

    let calls = fake.calls();
    assert!(calls.contains(&format!("EndReservation {first}")));
    assert!(calls.contains(&format!("EndReservation {second}")));
}

#[rstest]
fn end_named_reservations_surfaces_listing_failure(fake: FakeCloudShell) {
    fake.fail_on("GetCurrentReservations", api_failure("GetCurrentReservations"));

    let err = end_named_reservations(&fake, "dup", &fast_policy()).expect_err("listing fails");

    assert!(matches!(err, SessionError::Api { .. }));
}

#[rstest]
fn harness_teardown_discards_errors_and_forgets_reservation(fake: FakeCloudShell) {
    let mut harness = harness(&fake);
    harness.create_reservation("doomed").expect("create");
    fake.fail_on("EndReservation", api_failure("EndReservation"));

    harness.end_reservation();

    assert!(harness.reservation().is_none());
    assert_eq!(harness.reservation_id(), "");
    harness.end_reservation();
}

#[rstest]
fn harness_teardown_deletes_reservation(fake: FakeCloudShell) {
    let mut harness = harness(&fake);
    harness.create_reservation("clean").expect("create");

    harness.end_reservation();

    assert!(fake.reservations().is_empty());
}

#[rstest]
fn autoload_context_carries_fixed_connectivity(fake: FakeCloudShell) {
    let harness = harness(&fake);
    let attributes = BTreeMap::from([(String::from("User"), String::from("root"))]);

    let context = harness.autoload_command_context("CS_TrafficGeneratorChassis", "Chassis", "10.0.0.1", attributes);

    assert_eq!(context.connectivity.server_address, "localhost");
    assert_eq!(context.connectivity.admin_auth_token, "fake-token");
    assert_eq!(context.connectivity.cloudshell_api_port, CLOUDSHELL_API_PORT);
    assert_eq!(context.connectivity.quali_api_port, QUALI_API_PORT);
    assert_eq!(context.connectivity.cloudshell_version, CLOUDSHELL_VERSION);
    assert_eq!(context.resource.kind, "Resource");
    assert_eq!(context.resource.address, "10.0.0.1");
    assert_eq!(context.resource.attributes.get("User").map(String::as_str), Some("root"));
    assert!(!context.resource.id.is_empty());
}

#[rstest]
fn service_init_context_uses_custom_service_family(fake: FakeCloudShell) {
    let context = harness(&fake).service_init_command_context("Traffic Controller", BTreeMap::new());

    assert_eq!(context.resource.family, CUSTOM_SERVICE_FAMILY);
    assert_eq!(context.resource.address, "na");
    assert_eq!(context.resource.kind, "Service");
}

#[rstest]
#[case::default_name(None, "Testing/testing", "testing")]
#[case::explicit(Some("Lab/Chassis 1"), "Lab/Chassis 1", "Chassis 1")]
fn resource_init_context_names_from_full_name(
    fake: FakeCloudShell,
    #[case] full_name: Option<&str>,
    #[case] fullname: &str,
    #[case] name: &str,
) {
    let context = harness(&fake).resource_init_command_context(
        "CS_TrafficGeneratorChassis",
        "Chassis",
        "10.0.0.1",
        BTreeMap::new(),
        full_name,
    );

    assert_eq!(context.resource.fullname, fullname);
    assert_eq!(context.resource.name, name);
}

#[rstest]
fn contexts_serialise_kind_as_type(fake: FakeCloudShell) {
    let context = harness(&fake).service_init_command_context("Model", BTreeMap::new());

    let json = serde_json::to_value(&context).expect("serialise");

    assert_eq!(json["resource"]["type"], "Service");
    assert_eq!(json["connectivity"]["cloudshell_api_scheme"], CLOUDSHELL_API_SCHEME);
}

#[rstest]
fn resource_command_context_requires_reservation(fake: FakeCloudShell) {
    let err = harness(&fake)
        .resource_command_context(Some("chassis"), None)
        .expect_err("no reservation");

    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[rstest]
fn resource_command_context_describes_resource(fake: FakeCloudShell) {
    fake.seed_resource("chassis", "Chassis");
    let mut harness = harness(&fake);
    let id = harness.create_reservation("ctx").expect("create").id.clone();

    let context = harness
        .resource_command_context(Some("chassis"), None)
        .expect("context");

    assert_eq!(context.resource.name, "chassis");
    assert_eq!(context.resource.model, "Chassis");
    assert_eq!(context.reservation.reservation_id, id);
    assert_eq!(context.reservation.environment_name, "ctx");
    assert_eq!(context.reservation.owner_user, "admin");
    assert_eq!(context.reservation.domain, "Global");
}

#[rstest]
fn resource_command_context_rejects_unknown_service(fake: FakeCloudShell) {
    let mut harness = harness(&fake);
    harness.create_reservation("ctx").expect("create");

    let err = harness
        .resource_command_context(None, Some("missing"))
        .expect_err("unknown service");

    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[rstest]
fn autoload_resource_replaces_existing_resource(fake: FakeCloudShell) {
    fake.seed_resource("chassis", "Old Model");
    let harness = harness(&fake);
    let attributes = [AttributeNameValue::new("Chassis.User", "root")];

    let created = harness
        .create_autoload_resource("Chassis", "Lab/chassis", "10.0.0.1", &attributes)
        .expect("create");

    assert_eq!(created.folder, "Lab");
    let resources = fake.resources();
    let [resource] = resources.as_slice() else {
        panic!("expected one resource, got {resources:?}");
    };
    assert_eq!(resource.model, "Chassis");
    assert_eq!(fake.driver_of("chassis").as_deref(), Some("Chassis"));
    let updates = fake.attribute_updates();
    let [update] = updates.as_slice() else {
        panic!("expected one attribute update, got {updates:?}");
    };
    assert_eq!(update.resource_full_name, "Lab/chassis");
    assert!(fake.calls().contains(&String::from("DeleteResource chassis")));
}

#[rstest]
fn autoload_resource_skips_attributes_when_none_given(fake: FakeCloudShell) {
    harness(&fake)
        .create_autoload_resource("Chassis", "chassis", "10.0.0.1", &[])
        .expect("create");

    assert!(fake.attribute_updates().is_empty());
    assert!(!fake.calls().iter().any(|call| call.starts_with("DeleteResource")));
}

#[rstest]
fn health_check_services_default_to_model_alias(fake: FakeCloudShell) {
    let mut harness = harness(&fake);
    let id = harness.create_reservation("hc").expect("create").id.clone();

    harness
        .create_health_check_services("chassis", &BTreeMap::new())
        .expect("services");

    let details = fake.details(&id).expect("details");
    assert_eq!(details.services, vec![String::from(HEALTH_CHECK_STATUS_MODEL)]);
    let [connector] = details.connectors.as_slice() else {
        panic!("expected one connector, got {:?}", details.connectors);
    };
    assert_eq!(connector.source, "chassis");
    assert_eq!(connector.target, HEALTH_CHECK_STATUS_MODEL);
}

#[rstest]
fn health_check_services_follow_alias_map(fake: FakeCloudShell) {
    let mut harness = harness(&fake);
    let id = harness.create_reservation("hc").expect("create").id.clone();
    let aliases = BTreeMap::from([
        (String::from("hc-a"), String::from("passed")),
        (String::from("hc-b"), String::from("failed")),
    ]);

    harness
        .create_health_check_services("chassis", &aliases)
        .expect("services");

    let details = fake.details(&id).expect("details");
    assert_eq!(details.services, vec![String::from("hc-a"), String::from("hc-b")]);
}

#[rstest]
fn health_check_services_time_out_when_services_never_appear(fake: FakeCloudShell) {
    fake.hide_services();
    let mut harness = harness(&fake);
    harness.create_reservation("hc").expect("create");

    let err = harness
        .create_health_check_services("chassis", &BTreeMap::new())
        .expect_err("timeout");

    assert_eq!(err.kind(), ErrorKind::RemoteOperation);
    assert!(err.to_string().contains("services"), "{err}");
}

#[rstest]
fn reservation_status_constant_matches_fake(fake: FakeCloudShell) {
    let id = fake.seed_reservation("done");
    fake.end_reservation(&id).expect("end");

    assert_eq!(fake.details(&id).map(|d| d.status), Some(String::from(COMPLETED_STATUS)));
}

#[test]
fn inventory_lines_follow_blank_line_separators() {
    let inventory = Inventory {
        resources: vec![InventoryResource {
            relative_address: String::from("M1"),
            model: String::from("Module"),
            name: String::from("Module1"),
        }],
        attributes: vec![InventoryAttribute {
            relative_address: String::from("M1"),
            attribute_name: String::from("Serial"),
            attribute_value: String::from("abc"),
        }],
    };

    assert_eq!(
        format_inventory(&inventory),
        "\n\nM1, Module, Module1\n\n\nM1, Serial, abc\n"
    );
}

#[test]
fn empty_inventory_renders_separators_only() {
    assert_eq!(format_inventory(&Inventory::default()), "\n\n\n\n");
}

fn device(resource: &str) -> serde_yaml::Value {
    serde_yaml::from_str(&format!("resource: {resource}\n")).expect("device yaml")
}

#[test]
fn matching_boolean_report_passes() {
    let report = serde_json::json!({"report": {"name": "chassis", "result": false}});

    assert_eq!(check_health_report(&report, &device("chassis")), Ok(()));
}

#[rstest]
#[case::missing(serde_json::json!({}), HealthCheckError::MissingReport)]
#[case::wrong_name(
    serde_json::json!({"report": {"name": "other", "result": true}}),
    HealthCheckError::WrongResource { expected: String::from("chassis"), actual: String::from("other") }
)]
#[case::non_boolean(
    serde_json::json!({"report": {"name": "chassis", "result": "yes"}}),
    HealthCheckError::NonBooleanResult(String::from("\"yes\""))
)]
#[case::absent_result(
    serde_json::json!({"report": {"name": "chassis"}}),
    HealthCheckError::NonBooleanResult(String::from("null"))
)]
fn bad_reports_are_rejected(#[case] report: serde_json::Value, #[case] expected: HealthCheckError) {
    assert_eq!(check_health_report(&report, &device("chassis")), Err(expected));
}

#[test]
fn device_without_resource_is_rejected() {
    let report = serde_json::json!({"report": {"name": "chassis", "result": true}});
    let device: serde_yaml::Value = serde_yaml::from_str("address: 10.0.0.1\n").expect("yaml");

    assert_eq!(
        check_health_report(&report, &device),
        Err(HealthCheckError::MissingDeviceResource)
    );
}

#[test]
fn devices_load_from_shell_root() {
    let workspace = Workspace::new();
    workspace.write(DEVICES_FILE, "chassis:\n  resource: chassis-1\n");

    let devices = load_devices(workspace.root(), None).expect("devices");

    assert_eq!(devices["chassis"]["resource"].as_str(), Some("chassis-1"));
}

#[test]
fn devices_path_can_come_from_environment() {
    let workspace = Workspace::new();
    workspace.write("lab/devices.yaml", "chassis:\n  resource: from-env\n");
    let path = workspace.path("lab/devices.yaml");
    let _guard = EnvGuard::set_vars(&[("SHELLFOUNDRY_TRAFFIC_TEST_DEVICES", path.as_str())]);

    let devices =
        load_devices(workspace.root(), Some("SHELLFOUNDRY_TRAFFIC_TEST_DEVICES")).expect("devices");

    assert_eq!(devices["chassis"]["resource"].as_str(), Some("from-env"));
}

#[test]
fn missing_devices_file_is_not_found() {
    let workspace = Workspace::new();

    let err = load_devices(workspace.root(), None).expect_err("missing");

    assert_eq!(err.kind(), ErrorKind::NotFound);
}
