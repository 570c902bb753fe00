//! Unit tests for configuration sources and validation.

use super::*;
use crate::error::ErrorKind;
use crate::test_support::Workspace;
use rstest::{fixture, rstest};

#[fixture]
fn cloudshell_config() -> CloudShellConfig {
    CloudShellConfig {
        host: String::from("cs.example.test"),
        api_port: API_PORT,
        username: String::from("admin"),
        password: String::from("admin"),
        domain: String::from("Global"),
        reservation_duration_minutes: DEFAULT_RESERVATION_MINUTES,
    }
}

#[rstest]
fn valid_cloudshell_config_passes(cloudshell_config: CloudShellConfig) {
    assert_eq!(cloudshell_config.validate(), Ok(()));
}

#[rstest]
#[case::host(|cfg: &mut CloudShellConfig| cfg.host.clear(), "CLOUDSHELL_HOST", "host")]
#[case::username(|cfg: &mut CloudShellConfig| cfg.username = String::from("  "), "CLOUDSHELL_USERNAME", "username")]
#[case::domain(|cfg: &mut CloudShellConfig| cfg.domain.clear(), "CLOUDSHELL_DOMAIN", "domain")]
#[case::port(|cfg: &mut CloudShellConfig| cfg.api_port = 0, "CLOUDSHELL_API_PORT", "api_port")]
fn cloudshell_validation_errors_are_actionable(
    cloudshell_config: CloudShellConfig,
    #[case] mutate: fn(&mut CloudShellConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = cloudshell_config;
    mutate(&mut cfg);

    let error = cfg.validate().expect_err("validation should fail");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error");
    };
    assert!(message.contains(env_var), "{message}");
    assert!(message.contains(toml_key), "{message}");
    assert!(message.contains(CONFIG_FILE_NAME), "{message}");
}

#[test]
fn blank_shellfoundry_bin_is_rejected() {
    let cfg = ToolchainConfig {
        shellfoundry_bin: String::new(),
    };

    let message = cfg.validate().expect_err("blank bin").to_string();

    assert!(message.contains("SHELLFOUNDRY_TRAFFIC_SHELLFOUNDRY_BIN"), "{message}");
}

#[test]
fn config_errors_convert_to_configuration_kind() {
    let err = TrafficError::from(ConfigError::Parse(String::from("bad toml")));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn shellfoundry_install_section_overrides_defaults() {
    let install = ShellfoundryInstall::from_yaml(
        "install:\n  host: 10.0.0.5\n  port: 9001\n  username: tester\n  password: secret\n  domain: Lab\n",
    )
    .expect("parse");

    assert_eq!(
        install,
        ShellfoundryInstall {
            host: String::from("10.0.0.5"),
            port: 9001,
            username: String::from("tester"),
            password: String::from("secret"),
            domain: String::from("Lab"),
        }
    );
}

#[rstest]
#[case("")]
#[case("other: value\n")]
#[case("install:\n  host: ''\n")]
fn shellfoundry_defaults_fill_gaps(#[case] yaml: &str) {
    let install = ShellfoundryInstall::from_yaml(yaml).expect("parse");
    assert_eq!(install, ShellfoundryInstall::default());
}

#[rstest]
fn shellfoundry_install_keeps_api_port(cloudshell_config: CloudShellConfig) {
    let install = ShellfoundryInstall::from_yaml("install:\n  host: lab-host\n  port: 9000\n")
        .expect("parse");

    let merged = install.apply_to(cloudshell_config);

    assert_eq!(merged.host, "lab-host");
    assert_eq!(merged.api_port, API_PORT);
    assert_eq!(merged.username, "admin");
}

#[test]
fn malformed_shellfoundry_file_is_configuration_error() {
    let workspace = Workspace::new();
    workspace.write(LOCAL_CONFIG_FILE, "install: [unclosed\n");

    let err = ShellfoundryInstall::load(&workspace.path(LOCAL_CONFIG_FILE)).expect_err("malformed");

    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn local_shellfoundry_file_is_located_first() {
    let workspace = Workspace::new();
    workspace.write(LOCAL_CONFIG_FILE, "install:\n  host: local\n");

    let located = ShellfoundryInstall::locate(workspace.root()).expect("locate");

    assert_eq!(located, Some(workspace.path(LOCAL_CONFIG_FILE)));
}

const DEPLOYMENT: &str = r"<properties>
    <serverRootAddress>cs.example.test</serverRootAddress>
    <port>8029</port>
    <username>admin</username>
    <password>secret</password>
    <domain>Global</domain>
    <fileName>TrafficControllerDriver.zip</fileName>
    <driverName>TrafficControllerDriver</driverName>
</properties>";

#[test]
fn deployment_descriptor_yields_credentials() {
    let descriptor = DeploymentDescriptor::from_xml(DEPLOYMENT).expect("parse");

    assert_eq!(descriptor.host, "cs.example.test");
    assert_eq!(descriptor.port, API_PORT);
    assert_eq!(descriptor.password, "secret");
    let config = descriptor.into_config();
    assert_eq!(config.domain, "Global");
    assert_eq!(config.reservation_duration_minutes, DEFAULT_RESERVATION_MINUTES);
}

#[rstest]
#[case("<properties><username>a</username><domain>Global</domain></properties>", "serverRootAddress")]
#[case("<properties><serverRootAddress>h</serverRootAddress><domain>Global</domain></properties>", "username")]
fn deployment_descriptor_requires_fields(#[case] xml: &str, #[case] missing: &str) {
    let err = DeploymentDescriptor::from_xml(xml).expect_err("missing field");

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains(missing), "{err}");
}

#[test]
fn missing_deployment_descriptor_is_not_found() {
    let workspace = Workspace::new();
    let err = DeploymentDescriptor::load(workspace.root()).expect_err("absent");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
#[case("tests/unit", "tests/unit")]
#[case("tests", "tests/unit")]
#[case("", "tests/unit")]
fn shell_root_search_walks_up_two_levels(#[case] location: &str, #[case] start: &str) {
    let workspace = Workspace::new();
    workspace.mkdir(start);
    let descriptor = if location.is_empty() {
        String::from(DEPLOYMENT_XML)
    } else {
        format!("{location}/{DEPLOYMENT_XML}")
    };
    workspace.write(&descriptor, DEPLOYMENT);

    let root = find_shell_root(&workspace.path(start)).expect("search");

    let expected = if location.is_empty() {
        workspace.root().to_path_buf()
    } else {
        workspace.path(location)
    };
    assert_eq!(root, expected);
}

#[test]
fn shell_root_search_stops_at_grandparent() {
    let workspace = Workspace::new();
    workspace.mkdir("a/b/c");

    let root = find_shell_root(&workspace.path("a/b/c")).expect("search");

    assert_eq!(root, workspace.path("a"));
}
