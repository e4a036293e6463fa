//! Integration tests for `ducklake-provision config`.
//!
//! Every test points `DUCKLAKE_CONFIG` or `--config` at a temp path so it
//! never reads or writes the operator's configuration.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ducklake() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ducklake-provision"));
    cmd.env("NO_COLOR", "1").env_remove("POSTGRES_DB_PASSWORD");
    cmd
}

/// Returns a `TempDir` and the path string for a config file inside it.
fn temp_config_path() -> (TempDir, String) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir
        .path()
        .join("config.yaml")
        .to_string_lossy()
        .into_owned();
    (dir, path)
}

#[test]
fn test_config_help_shows_subcommands() {
    ducklake()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_config_path_honors_environment() {
    let (_dir, path) = temp_config_path();
    ducklake()
        .args(["config", "path"])
        .env("DUCKLAKE_CONFIG", &path)
        .assert()
        .success()
        .stdout(format!("{path}\n"));
}

#[test]
fn test_config_flag_beats_environment() {
    let (_dir, path) = temp_config_path();
    ducklake()
        .args(["config", "path", "--config", &path])
        .env("DUCKLAKE_CONFIG", "/nonexistent/other.yaml")
        .assert()
        .success()
        .stdout(format!("{path}\n"));
}

#[test]
fn test_config_show_without_file_uses_defaults() {
    let (_dir, path) = temp_config_path();
    ducklake()
        .args(["config", "show"])
        .env("DUCKLAKE_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("postgres.version:"))
        .stdout(predicate::str::contains("16"))
        .stdout(predicate::str::contains("scram-sha-256"));
}

#[test]
fn test_config_show_masks_password() {
    let (_dir, path) = temp_config_path();
    ducklake()
        .args(["config", "show"])
        .env("DUCKLAKE_CONFIG", &path)
        .env("POSTGRES_DB_PASSWORD", "s3cret-value")
        .assert()
        .success()
        .stdout(predicate::str::contains("(set)"))
        .stdout(predicate::str::contains("s3cret-value").not());
}

#[test]
fn test_config_init_writes_file_once() {
    let (_dir, path) = temp_config_path();
    ducklake()
        .args(["config", "init"])
        .env("DUCKLAKE_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("postgres:"));
    assert!(written.contains("firewall:"));

    ducklake()
        .args(["config", "init"])
        .env("DUCKLAKE_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    ducklake()
        .args(["config", "init", "--force"])
        .env("DUCKLAKE_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
}

#[test]
fn test_config_show_reads_file() {
    let (_dir, path) = temp_config_path();
    std::fs::write(
        &path,
        "postgres:\n  version: 15\n  database: lake\nfirewall:\n  backend: iptables\n",
    )
    .unwrap();
    ducklake()
        .args(["config", "show"])
        .env("DUCKLAKE_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("lake"))
        .stdout(predicate::str::contains("iptables"));
}

#[test]
fn test_config_show_json() {
    let (_dir, path) = temp_config_path();
    let output = ducklake()
        .args(["config", "show", "--json"])
        .env("DUCKLAKE_CONFIG", &path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["config"]["postgres"]["version"], 16);
    assert_eq!(value["config"]["firewall"]["ssh_port"], 22);
}

#[test]
fn test_config_invalid_value_is_config_error() {
    let (_dir, path) = temp_config_path();
    std::fs::write(&path, "postgres:\n  version: 9\n").unwrap();
    let output = ducklake()
        .args(["config", "show", "--json"])
        .env("DUCKLAKE_CONFIG", &path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["code"], "config");
}
