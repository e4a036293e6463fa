//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Target errors ─────────────────────────────────────────────────────────────

/// Errors raised while resolving the deployment target.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Deployment output '{path}' is unusable: {reason}. Run 'terraform apply' first.")]
    MissingArtifact { path: String, reason: String },

    #[error("Environment variable {var} is not set. Export it or pass --host.")]
    MissingConfiguration { var: String },

    #[error("Target address '{address}' from {origin} is not a host name or IP address.")]
    InvalidAddress { address: String, origin: String },
}

// ── Credential errors ─────────────────────────────────────────────────────────

/// Errors raised when the database credential is unusable.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Database password not set. Export {var} before deploying.")]
    Missing { var: String },

    #[error("Database password in {var} is empty.")]
    Empty { var: String },

    #[error("Database password in {var} is the placeholder '{value}'. Refusing to provision.")]
    Placeholder { var: String, value: String },

    #[error("Malformed SCRAM verifier: {0}")]
    MalformedVerifier(String),
}

// ── Platform errors ───────────────────────────────────────────────────────────

/// Errors raised by platform detection.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unsupported platform '{id}' (ID_LIKE: '{id_like}'). Supported: Debian and RHEL families.")]
    Unsupported { id: String, id_like: String },

    #[error("Cannot read /etc/os-release on the target host.")]
    MissingOsRelease,
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Conflicts between the host state and the requested configuration that
/// cannot be converged automatically.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(
        "Database '{database}' exists with {field} '{actual}' (wanted '{expected}'). \
         Drop it manually or change postgres.database."
    )]
    DatabaseMismatch {
        database: String,
        field: &'static str,
        actual: String,
        expected: String,
    },

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

// ── Plan errors ───────────────────────────────────────────────────────────────

/// Plan invariant violations detected before execution.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(
        "Step '{step}' sets INPUT policy to DROP before SSH (port {ssh_port}) is allowed. \
         Executing it would lock out the operator."
    )]
    Lockout { step: String, ssh_port: u16 },
}

// ── Execution errors ──────────────────────────────────────────────────────────

/// Failure while applying a plan to the host.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(
        "Step '{failed_step}' failed after {} applied step(s); manual remediation required.\n\
         Applied: {}",
        applied.len(),
        if applied.is_empty() { "none".to_string() } else { applied.join(", ") }
    )]
    PartialApplication {
        failed_step: String,
        applied: Vec<String>,
        #[source]
        source: anyhow::Error,
    },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
