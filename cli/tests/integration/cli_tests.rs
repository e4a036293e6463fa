//! Integration tests for argument parsing, target resolution, and the
//! checks that run before any connection.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command isolated from the operator's configuration and environment.
fn ducklake(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ducklake-provision"));
    cmd.env("NO_COLOR", "1")
        .env("DUCKLAKE_CONFIG", dir.path().join("config.yaml"))
        .env_remove("DUCKLAKE_POSTGRES_HOST")
        .env_remove("POSTGRES_DB_PASSWORD")
        .env_remove("DUCKLAKE_YES")
        .env_remove("RUST_LOG");
    cmd
}

// --- Help and version ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir).assert().code(2).stderr(predicate::str::contains(
        "Provision a PostgreSQL host as a DuckLake catalog over SSH",
    ));
}

#[test]
fn test_cli_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("firewall"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("facts"))
        .stdout(predicate::str::contains("target"));
}

#[test]
fn test_version_command_shows_version() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ducklake-provision v0.1.0"));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let dir = TempDir::new().unwrap();
    let output = ducklake(&dir).args(["version", "--json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["version"], "0.1.0");
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir).arg("bootstrap").assert().code(2);
}

// --- Target resolution ---

#[test]
fn test_target_host_flag_is_printed() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .args(["target", "--host", "10.0.0.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0.0.5"))
        .stdout(predicate::str::contains("--host"));
}

#[test]
fn test_target_reads_environment_variable() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .arg("target")
        .env("DUCKLAKE_POSTGRES_HOST", "203.0.113.7")
        .assert()
        .success()
        .stdout(predicate::str::contains("203.0.113.7"))
        .stdout(predicate::str::contains("$DUCKLAKE_POSTGRES_HOST"));
}

#[test]
fn test_target_quiet_prints_bare_address() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .args(["target", "--quiet", "--host", "10.0.0.5"])
        .assert()
        .success()
        .stdout("10.0.0.5\n");
}

#[test]
fn test_target_unset_variable_fails_with_hint() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .arg("target")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DUCKLAKE_POSTGRES_HOST"))
        .stderr(predicate::str::contains("--host"));
}

#[test]
fn test_target_custom_variable() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .args(["target", "--target-env", "CATALOG_IP"])
        .env("CATALOG_IP", "10.1.2.3")
        .assert()
        .success()
        .stdout(predicate::str::contains("10.1.2.3"));
}

#[test]
fn test_target_file_reads_terraform_output() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("outputs.json");
    std::fs::write(
        &file,
        r#"{"ip": {"sensitive": false, "type": "string", "value": "198.51.100.4"}}"#,
    )
    .unwrap();
    ducklake(&dir)
        .args(["target", "--target-file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("198.51.100.4"));
}

#[test]
fn test_target_missing_file_is_artifact_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("missing.json");
    ducklake(&dir)
        .args(["target", "--target-file"])
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.json"))
        .stderr(predicate::str::contains("terraform apply"));
}

#[test]
fn test_target_json_error_object() {
    let dir = TempDir::new().unwrap();
    let output = ducklake(&dir).args(["target", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "target");
    assert!(
        value["message"]
            .as_str()
            .unwrap()
            .contains("DUCKLAKE_POSTGRES_HOST")
    );
}

// --- Checks before connecting ---

#[test]
fn test_deploy_without_password_fails_before_connecting() {
    let dir = TempDir::new().unwrap();
    // 192.0.2.0/24 is reserved for documentation; a connection attempt
    // would time out instead of failing with the credential message.
    ducklake(&dir)
        .args(["deploy", "--yes", "--host", "192.0.2.10"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("POSTGRES_DB_PASSWORD"));
}

#[test]
fn test_deploy_placeholder_password_is_credential_error() {
    let dir = TempDir::new().unwrap();
    let output = ducklake(&dir)
        .args(["deploy", "--json", "--yes", "--host", "192.0.2.10"])
        .env("POSTGRES_DB_PASSWORD", "changeme")
        .timeout(std::time::Duration::from_secs(20))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["code"], "credential");
    assert!(value["message"].as_str().unwrap().contains("placeholder"));
}

#[test]
fn test_deploy_without_target_fails_before_password_check() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .args(["deploy", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DUCKLAKE_POSTGRES_HOST"));
}

#[test]
fn test_firewall_without_target_fails() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .args(["firewall", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DUCKLAKE_POSTGRES_HOST"));
}
