//! Unit tests for the metadata patcher.

use super::*;
use crate::error::ErrorKind;
use crate::test_support::Workspace;
use rstest::{fixture, rstest};

const DESCRIPTOR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Driver Description="traffic controller driver" MainClass="driver.Old" Name="Old" Version="1.0.0" PythonVersion="3">
    <Layout>
        <Category Name="Hidden Commands">
            <Command Description="" DisplayName="Keep Alive" Name="keep_alive"/>
        </Category>
    </Layout>
</Driver>
"#;

const MANIFEST: &str = "TOSCA-Meta-File-Version: 1.0\nCSAR-Version: 0.1.0\nCreated-By: Anonymous\nEntry-Definitions: shell-definition.yaml\n";

#[fixture]
fn main_class() -> MainClass {
    "pkg.DriverClass.v1".parse().expect("valid main class")
}

fn root_attribute(xml: &str, key: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().expect("well-formed") {
            Event::Start(start) | Event::Empty(start) => {
                return start
                    .try_get_attribute(key)
                    .expect("attribute")
                    .map(|attr| attr.unescape_value().expect("utf8").into_owned());
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}

#[rstest]
fn patch_sets_main_class_and_name(main_class: MainClass) {
    let patched = patch_driver_descriptor(DESCRIPTOR, &main_class).expect("patch");
    assert_eq!(
        root_attribute(&patched, "MainClass").as_deref(),
        Some("pkg.DriverClass.v1")
    );
    assert_eq!(root_attribute(&patched, "Name").as_deref(), Some("DriverClass"));
    assert_eq!(root_attribute(&patched, "Version").as_deref(), Some("1.0.0"));
    assert!(patched.contains(r#"<Command Description="" DisplayName="Keep Alive" Name="keep_alive"/>"#));
    assert!(patched.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
}

#[rstest]
fn patch_is_idempotent(main_class: MainClass) {
    let once = patch_driver_descriptor(DESCRIPTOR, &main_class).expect("first patch");
    let twice = patch_driver_descriptor(&once, &main_class).expect("second patch");
    assert_eq!(once, twice);
}

#[rstest]
fn patch_appends_missing_attributes(main_class: MainClass) {
    let patched = patch_driver_descriptor("<Driver Version=\"2\"/>", &main_class).expect("patch");
    assert_eq!(
        patched,
        r#"<Driver Version="2" MainClass="pkg.DriverClass.v1" Name="DriverClass"/>"#
    );
}

#[rstest]
#[case("<Driver MainClass=\"a.B\"")]
#[case("just text, no markup")]
#[case("")]
fn patch_rejects_malformed_descriptors(main_class: MainClass, #[case] xml: &str) {
    let err = patch_driver_descriptor(xml, &main_class).expect_err("should fail");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn rewrite_entry_definitions_replaces_key_and_keeps_order() {
    let rewritten = rewrite_entry_definitions(MANIFEST, "shell-definition-2").expect("rewrite");
    let keys: Vec<&str> = rewritten
        .lines()
        .filter_map(|line| line.split(':').next())
        .collect();
    assert_eq!(
        keys,
        [
            "TOSCA-Meta-File-Version",
            "CSAR-Version",
            "Created-By",
            "Entry-Definitions"
        ]
    );
    assert!(rewritten.contains("Entry-Definitions: shell-definition-2.yaml"));
}

#[test]
fn rewrite_entry_definitions_adds_missing_key() {
    let rewritten =
        rewrite_entry_definitions("Created-By: Anonymous\n", "shell.yaml").expect("rewrite");
    assert!(rewritten.contains("Entry-Definitions: shell.yaml"), "{rewritten}");
}

#[rstest]
#[case("- a\n- b\n")]
#[case("")]
#[case("key: [unclosed")]
fn rewrite_entry_definitions_rejects_non_mappings(#[case] manifest: &str) {
    let err = rewrite_entry_definitions(manifest, "shell").expect_err("should fail");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn set_entry_definitions_rewrites_manifest_on_disk() {
    let workspace = Workspace::new();
    workspace.write("TOSCA-Metadata/TOSCA.meta", MANIFEST);
    set_entry_definitions(&workspace.ctx(), "shell-definition-1").expect("patch");
    let contents = workspace.read("TOSCA-Metadata/TOSCA.meta");
    assert!(contents.contains("Entry-Definitions: shell-definition-1.yaml"));
}

#[test]
fn set_entry_definitions_reports_missing_manifest() {
    let workspace = Workspace::new();
    let err = set_entry_definitions(&workspace.ctx(), "shell").expect_err("no manifest");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn set_driver_main_class_rewrites_descriptor_on_disk() {
    let workspace = Workspace::new();
    workspace.write("src/drivermetadata.xml", DESCRIPTOR);
    let definition = DefinitionDocument::parse(
        "shell-definition",
        "metadata:\n  template_name: t\n  main_class: pkg.DriverClass.v1\n",
    )
    .expect("definition");

    set_driver_main_class(&workspace.ctx(), &definition).expect("patch");
    let first = workspace.read("src/drivermetadata.xml");
    assert_eq!(root_attribute(&first, "Name").as_deref(), Some("DriverClass"));

    set_driver_main_class(&workspace.ctx(), &definition).expect("repatch");
    assert_eq!(workspace.read("src/drivermetadata.xml"), first);
}

#[test]
fn set_driver_main_class_without_main_class_leaves_descriptor_untouched() {
    let workspace = Workspace::new();
    workspace.write("src/drivermetadata.xml", DESCRIPTOR);
    let definition =
        DefinitionDocument::parse("shell", "metadata:\n  template_name: t\n").expect("definition");

    let err = set_driver_main_class(&workspace.ctx(), &definition).expect_err("no main class");
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(workspace.read("src/drivermetadata.xml"), DESCRIPTOR);
}

#[test]
fn set_driver_main_class_reports_missing_descriptor() {
    let workspace = Workspace::new();
    let definition =
        DefinitionDocument::parse("shell", "metadata:\n  main_class: a.B\n").expect("definition");
    let err = set_driver_main_class(&workspace.ctx(), &definition).expect_err("no descriptor");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
