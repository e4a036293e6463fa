//! Deployment target types and pure parsing of deployment output.
//!
//! No I/O here: callers read the file or the environment and hand the raw
//! contents in.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::TargetError;

/// Default environment variable holding the target address.
pub const DEFAULT_TARGET_ENV: &str = "DUCKLAKE_POSTGRES_HOST";

/// Field of the deployment output file that carries the address.
pub const OUTPUT_IP_FIELD: &str = "ip";

/// The single host a run configures. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetHost(String);

impl TargetHost {
    /// Builds a target from a literal address.
    ///
    /// # Errors
    ///
    /// Returns `TargetError::MissingConfiguration` naming `origin` when the
    /// address is empty after trimming, and `TargetError::InvalidAddress`
    /// when it could be read by ssh as an option.
    pub fn parse(address: &str, origin: &str) -> Result<Self, TargetError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(TargetError::MissingConfiguration {
                var: origin.to_string(),
            });
        }
        Self::checked(trimmed, origin)
    }

    /// ssh takes any argument starting with `-` as an option, so such an
    /// address never reaches the destination slot.
    fn checked(address: &str, origin: &str) -> Result<Self, TargetError> {
        if address.starts_with('-') || address.chars().any(char::is_whitespace) {
            return Err(TargetError::InvalidAddress {
                address: address.to_string(),
                origin: origin.to_string(),
            });
        }
        Ok(Self(address.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the target address comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    /// Address given on the command line.
    Literal(String),
    /// Deployment output file written by the provisioning step.
    OutputFile(std::path::PathBuf),
    /// Named environment variable.
    EnvVar(String),
}

impl fmt::Display for TargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("--host"),
            Self::OutputFile(path) => write!(f, "file {}", path.display()),
            Self::EnvVar(var) => write!(f, "${var}"),
        }
    }
}

/// Extracts the target address from deployment output JSON.
///
/// Accepts a bare string, `{"ip": "<addr>"}`, or the `terraform output -json`
/// shape `{"ip": {"value": "<addr>"}}`.
///
/// # Errors
///
/// Returns `TargetError::MissingArtifact` if the JSON is malformed or has no
/// usable address.
pub fn parse_output_file(path: &str, contents: &str) -> Result<TargetHost, TargetError> {
    let artifact = |reason: &str| TargetError::MissingArtifact {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let value: Value =
        serde_json::from_str(contents).map_err(|e| artifact(&format!("invalid JSON ({e})")))?;

    let address = match &value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => match map.get(OUTPUT_IP_FIELD) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Object(inner)) => inner.get("value").and_then(Value::as_str),
            _ => None,
        },
        _ => None,
    }
    .ok_or_else(|| artifact(&format!("no '{OUTPUT_IP_FIELD}' field")))?;

    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(artifact(&format!("'{OUTPUT_IP_FIELD}' is empty")));
    }
    TargetHost::checked(trimmed, path)
}
