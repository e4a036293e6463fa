//! Domain types and validators for runbook configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::credential::DEFAULT_PASSWORD_ENV;
use crate::domain::error::ConfigError;
use crate::domain::target::DEFAULT_TARGET_ENV;

// ── Constants ────────────────────────────────────────────────────────────────

/// Environment variable overriding the configuration location.
pub const CONFIG_ENV: &str = "DUCKLAKE_CONFIG";

pub const VALID_FIREWALL_BACKENDS: &[&str] = &["auto", "iptables", "firewalld"];
pub const VALID_AUTH_METHODS: &[&str] = &["scram-sha-256", "md5"];
pub const SUPPORTED_POSTGRES_VERSIONS: std::ops::RangeInclusive<u32> = 13..=17;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.config/ducklake/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    pub target: TargetConfig,
    pub ssh: SshConfig,
    pub postgres: PostgresConfig,
    pub firewall: FirewallConfig,
    pub fail2ban: Fail2banConfig,
}

/// Where the target address is looked up when no `--host` is given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetConfig {
    /// Deployment output file (checked first when set).
    pub output_file: Option<PathBuf>,
    /// Environment variable holding the address.
    pub env_var: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            output_file: None,
            env_var: DEFAULT_TARGET_ENV.to_string(),
        }
    }
}

/// SSH connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshConfig {
    /// Remote user; `None` defers to `~/.ssh/config`.
    pub user: Option<String>,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Per-command timeout.
    pub command_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: None,
            port: 22,
            identity_file: None,
            connect_timeout_secs: 10,
            command_timeout_secs: 300,
        }
    }
}

/// Database server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PostgresConfig {
    pub version: u32,
    pub role: String,
    pub database: String,
    pub locale: String,
    pub encoding: String,
    pub port: u16,
    /// Source network allowed by the client-authentication entry.
    pub allowed_cidr: String,
    pub auth_method: String,
    /// Environment variable holding the role password.
    pub password_env: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            version: 16,
            role: "ducklake".to_string(),
            database: "ducklake_catalog".to_string(),
            locale: "en_US.UTF-8".to_string(),
            encoding: "UTF8".to_string(),
            port: 5432,
            allowed_cidr: "0.0.0.0/0".to_string(),
            auth_method: "scram-sha-256".to_string(),
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
        }
    }
}

/// Firewall backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FirewallBackend {
    /// firewalld on RHEL hosts that have it, iptables otherwise.
    #[default]
    Auto,
    Iptables,
    Firewalld,
}

impl std::fmt::Display for FirewallBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Iptables => f.write_str("iptables"),
            Self::Firewalld => f.write_str("firewalld"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FirewallConfig {
    pub backend: FirewallBackend,
    /// Port the SSH allow rule opens; must match the port we connect on.
    pub ssh_port: u16,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            backend: FirewallBackend::Auto,
            ssh_port: 22,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Fail2banConfig {
    pub enabled: bool,
}

impl Default for Fail2banConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

fn is_sql_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.len() <= 63
}

fn invalid(key: &str, value: impl ToString, valid: &str) -> anyhow::Error {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        valid: valid.to_string(),
    }
    .into()
}

/// Validates a loaded configuration.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for the first offending field.
pub fn validate(config: &DeployConfig) -> Result<()> {
    let pg = &config.postgres;
    if !SUPPORTED_POSTGRES_VERSIONS.contains(&pg.version) {
        return Err(invalid("postgres.version", pg.version, "13 through 17"));
    }
    if !is_sql_name(&pg.role) {
        return Err(invalid("postgres.role", &pg.role, "lowercase identifier, max 63 chars"));
    }
    if !is_sql_name(&pg.database) {
        return Err(invalid(
            "postgres.database",
            &pg.database,
            "lowercase identifier, max 63 chars",
        ));
    }
    if !VALID_AUTH_METHODS.contains(&pg.auth_method.as_str()) {
        return Err(invalid(
            "postgres.auth_method",
            &pg.auth_method,
            &VALID_AUTH_METHODS.join(", "),
        ));
    }
    if !pg.allowed_cidr.contains('/') {
        return Err(invalid("postgres.allowed_cidr", &pg.allowed_cidr, "CIDR, e.g. 10.0.0.0/8"));
    }
    if pg.password_env.trim().is_empty() {
        return Err(invalid("postgres.password_env", "", "environment variable name"));
    }
    if config.ssh.port == 0 || config.firewall.ssh_port == 0 || pg.port == 0 {
        return Err(invalid("port", 0, "1-65535"));
    }
    if config.ssh.command_timeout_secs == 0 {
        return Err(invalid("ssh.command_timeout_secs", 0, "positive number of seconds"));
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
