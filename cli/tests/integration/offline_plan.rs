//! Integration tests for `plan --snapshot`, which never contacts a host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;

use assert_cmd::Command;
use ducklake_provision::domain::platform::{Platform, PlatformInfo};
use ducklake_provision::domain::snapshot::HostSnapshot;
use ducklake_provision::infra::env::write_snapshot;
use predicates::prelude::*;
use tempfile::TempDir;

fn ducklake(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ducklake-provision"));
    cmd.env("NO_COLOR", "1")
        .env("DUCKLAKE_CONFIG", dir.path().join("config.yaml"))
        .env_remove("POSTGRES_DB_PASSWORD");
    cmd
}

fn ubuntu_snapshot(dir: &TempDir) -> PathBuf {
    let snapshot = HostSnapshot::new(PlatformInfo {
        platform: Platform::Debian,
        os_id: "ubuntu".to_string(),
        major_version: "24".to_string(),
        arch: "x86_64".to_string(),
        codename: "noble".to_string(),
    });
    let path = dir.path().join("facts.json");
    write_snapshot(&path, &snapshot).unwrap();
    path
}

fn plan_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn step_names(value: &serde_json::Value) -> Vec<String> {
    value["plan"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_firewall_plan_from_snapshot_needs_no_password() {
    let dir = TempDir::new().unwrap();
    let snapshot = ubuntu_snapshot(&dir);
    let value = plan_json(
        ducklake(&dir)
            .args(["plan", "--json", "--firewall-only", "--snapshot"])
            .arg(&snapshot),
    );
    assert_eq!(value["backend"], "iptables");
    assert_eq!(value["applied"], false);

    let names = step_names(&value);
    let ssh = names.iter().position(|n| n.contains("SSH")).unwrap();
    let drop = names
        .iter()
        .position(|n| n == "set INPUT policy DROP")
        .unwrap();
    assert!(ssh < drop, "{names:?}");
    assert!(!names.iter().any(|n| n.contains("PostgreSQL on port")));
}

#[test]
fn test_deploy_plan_from_snapshot_redacts_password() {
    let dir = TempDir::new().unwrap();
    let snapshot = ubuntu_snapshot(&dir);
    let output = ducklake(&dir)
        .args(["plan", "--json", "--snapshot"])
        .arg(&snapshot)
        .env("POSTGRES_DB_PASSWORD", "Tr0ub4dor-and-3")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Tr0ub4dor-and-3"));
    assert!(!stdout.contains("SCRAM-SHA-256$"));

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let names = step_names(&value);
    assert!(names.iter().any(|n| n.contains("PostgreSQL on port 5432")));
    assert!(names.iter().any(|n| n.contains("fail2ban")));
}

#[test]
fn test_deploy_plan_from_snapshot_requires_password() {
    let dir = TempDir::new().unwrap();
    let snapshot = ubuntu_snapshot(&dir);
    ducklake(&dir)
        .args(["plan", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("POSTGRES_DB_PASSWORD"));
}

#[test]
fn test_plan_human_output_numbers_steps() {
    let dir = TempDir::new().unwrap();
    let snapshot = ubuntu_snapshot(&dir);
    ducklake(&dir)
        .args(["plan", "--firewall-only", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("(firewall: iptables)"))
        .stdout(predicate::str::contains("[firewall]"))
        .stdout(predicate::str::contains(" 1. "));
}

#[test]
fn test_plan_missing_snapshot_fails() {
    let dir = TempDir::new().unwrap();
    ducklake(&dir)
        .args(["plan", "--firewall-only", "--snapshot"])
        .arg(dir.path().join("absent.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("absent.json"));
}
