//! CLI tests for payload handling.
//!
//! Spawns the resource binary with payloads that fail before any network
//! access and checks exit codes and the error reported on stderr.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use tfe_resource::exit_codes;

fn run_with_stdin(args: &[&str], stdin: &str) -> Output {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut child = Command::new(env!("CARGO_BIN_EXE_tfe-resource"))
        .current_dir(temp.path())
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tfe-resource");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait")
}

#[test]
fn missing_source_fields_fail_with_every_problem() {
    let output = run_with_stdin(&["check"], r#"{"source": {"address": "not a url"}}"#);
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid configuration provided"), "{stderr}");
    assert!(stderr.contains("workspace is not set"), "{stderr}");
    assert!(stderr.contains("organization is not set"), "{stderr}");
    assert!(stderr.contains("token is not set"), "{stderr}");
    assert!(stderr.contains("is not a valid URL"), "{stderr}");
}

#[test]
fn unknown_payload_field_is_rejected() {
    let output = run_with_stdin(&["in", "."], r#"{"source": {"workspaces": "foo"}}"#);
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("parse resource input"), "{stderr}");
}

#[test]
fn unterminated_template_is_a_configuration_error() {
    let payload = r#"{
        "source": {"workspace": "foo", "organization": "acme", "token": "t"},
        "params": {"message": "broken ${job"}
    }"#;
    let output = run_with_stdin(&["out", "."], payload);
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid run message"), "{stderr}");
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = run_with_stdin(&["plan"], "{}");
    assert_ne!(output.status.code(), Some(exit_codes::OK));
    assert!(output.stdout.is_empty());
}
