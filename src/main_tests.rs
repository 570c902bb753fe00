//! Unit tests for the `shellfoundry_traffic` CLI binary implementation.

use super::*;
use rstest::rstest;

#[rstest]
#[case::default(0, None, "warn")]
#[case::from_env(0, Some("shellfoundry_traffic=trace"), "shellfoundry_traffic=trace")]
#[case::blank_env(0, Some("  "), "warn")]
#[case::verbose(1, Some("error"), "info")]
#[case::very_verbose(3, None, "debug")]
fn log_directive_follows_verbosity(
    #[case] verbose: u8,
    #[case] from_env: Option<&str>,
    #[case] expected: &str,
) {
    assert_eq!(log_directive(verbose, from_env.map(str::to_owned)), expected);
}

#[test]
fn explicit_directory_is_used_verbatim() {
    let dir = resolve_base_dir(Some(Utf8Path::new("shells/traffic"))).expect("resolve");

    assert_eq!(dir, "shells/traffic");
}

#[test]
fn default_directory_is_current_dir() {
    let dir = resolve_base_dir(None).expect("resolve");
    let cwd = env::current_dir().expect("cwd");

    assert_eq!(dir.as_std_path(), cwd);
}

#[test]
fn parses_global_options_before_subcommand() {
    let cli = Cli::try_parse_from([
        "shellfoundry_traffic",
        "-y",
        "shell-definition",
        "-C",
        "work",
        "-vv",
        "install",
    ])
    .expect("parse");

    assert_eq!(cli.yaml, "shell-definition");
    assert_eq!(cli.directory.as_deref(), Some(Utf8Path::new("work")));
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.command, Command::Install);
}

#[test]
fn yaml_is_required() {
    let err = Cli::try_parse_from(["shellfoundry_traffic", "pack"]).expect_err("missing yaml");

    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[test]
fn write_error_writes_single_line() {
    let mut buf = Vec::new();
    let err = CliError::Traffic(TrafficError::configuration("shell.yaml is missing metadata.main_class"));

    write_error(&mut buf, &err);

    let rendered = String::from_utf8(buf).expect("utf8");
    assert_eq!(
        rendered,
        "configuration error: shell.yaml is missing metadata.main_class\n"
    );
}
