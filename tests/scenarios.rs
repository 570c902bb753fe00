//! End-to-end scenarios across the patcher, archiver, and script flow.

use std::collections::BTreeSet;

use shellfoundry_traffic::test_support::{
    FakeCloudShell, ScriptedRunner, Workspace, archive_entries,
};
use shellfoundry_traffic::{
    DefinitionDocument, DefinitionKind, Shellfoundry, build_archive, commands,
    set_driver_main_class,
};

#[test]
fn main_class_patch_names_the_driver_after_second_segment() {
    let workspace = Workspace::shell();
    workspace.write(
        "shell-definition.yaml",
        "metadata:\n  template_name: Traffic\n  main_class: pkg.DriverClass.v1\n",
    );
    let ctx = workspace.ctx();
    let definition =
        DefinitionDocument::load_for(&ctx, "shell-definition", DefinitionKind::Shell).expect("load");

    set_driver_main_class(&ctx, &definition).expect("patch");
    let first = workspace.read("src/drivermetadata.xml");
    set_driver_main_class(&ctx, &definition).expect("repatch");

    assert!(first.contains(r#"MainClass="pkg.DriverClass.v1""#), "{first}");
    assert!(first.contains(r#"Name="DriverClass""#), "{first}");
    assert_eq!(workspace.read("src/drivermetadata.xml"), first);
}

#[test]
fn archive_holds_exactly_the_included_files() {
    let workspace = Workspace::script(
        "demo",
        &[("a.py", "a\n"), ("b.py", "b\n"), ("skip.txt", "skip\n")],
    );
    workspace.write(
        "script-definition.yaml",
        "metadata:\n  script_name: demo\nfiles:\n  exclude:\n    - skip.txt\n",
    );
    let ctx = workspace.ctx();
    let definition =
        DefinitionDocument::load_for(&ctx, "script-definition", DefinitionKind::Script)
            .expect("load");

    let summary = build_archive(&ctx, &definition, "demo").expect("archive");

    assert_eq!(summary.path, workspace.path("dist/demo.zip"));
    let expected: BTreeSet<String> = ["a.py", "b.py"].into_iter().map(String::from).collect();
    assert_eq!(archive_entries(&summary.path), expected);
}

#[test]
fn script_flow_uploads_the_fresh_archive() {
    let workspace = Workspace::script("traffic-script", &[("main.py", "print('go')\n")]);
    let fake = FakeCloudShell::new();

    let summary = commands::script(&workspace.ctx(), "script-definition", || Ok(fake.clone()))
        .expect("script flow");

    assert_eq!(summary.entries, ["main.py"]);
    assert_eq!(fake.calls(), ["UpdateScript traffic-script"]);
}

#[test]
fn generate_runs_pack_before_generate() {
    let workspace = Workspace::shell();
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_success();
    let toolchain = Shellfoundry::new("shellfoundry", workspace.root(), runner.clone());

    commands::generate(&workspace.ctx(), "shell-definition", &toolchain).expect("generate");

    let operations: Vec<String> = runner
        .invocations()
        .iter()
        .map(|call| call.command_string())
        .collect();
    assert_eq!(operations, ["shellfoundry pack", "shellfoundry generate"]);
}
