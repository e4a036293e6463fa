//! Application service: target and credential resolution.
//!
//! Both run on the operator machine and complete before any connection to
//! the target is attempted.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::ports::OperatorEnvironment;
use crate::domain::config::{PostgresConfig, TargetConfig};
use crate::domain::credential::DbPassword;
use crate::domain::error::{CredentialError, TargetError};
use crate::domain::target::{TargetHost, TargetSource, parse_output_file};

/// Target selection from the command line. Unset fields fall back to the
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct TargetRequest {
    pub host: Option<String>,
    pub env_var: Option<String>,
    pub output_file: Option<PathBuf>,
}

impl TargetRequest {
    /// Picks the source by precedence: `--host`, `--target-env`,
    /// `--target-file`, configured output file, configured variable.
    #[must_use]
    pub fn source(&self, config: &TargetConfig) -> TargetSource {
        if let Some(host) = &self.host {
            return TargetSource::Literal(host.clone());
        }
        if let Some(var) = &self.env_var {
            return TargetSource::EnvVar(var.clone());
        }
        if let Some(path) = self.output_file.as_ref().or(config.output_file.as_ref()) {
            return TargetSource::OutputFile(path.clone());
        }
        TargetSource::EnvVar(config.env_var.clone())
    }
}

/// Resolves the target address.
///
/// # Errors
///
/// Returns `TargetError::MissingArtifact` for an unusable output file,
/// `TargetError::MissingConfiguration` for an unset or empty variable, and
/// `TargetError::InvalidAddress` for an address ssh would parse as an option.
pub fn resolve_target(
    env: &impl OperatorEnvironment,
    request: &TargetRequest,
    config: &TargetConfig,
) -> Result<(TargetHost, TargetSource), TargetError> {
    let source = request.source(config);
    let host = match &source {
        TargetSource::Literal(address) => TargetHost::parse(address, "--host")?,
        TargetSource::EnvVar(var) => {
            let value = env.var(var).ok_or_else(|| TargetError::MissingConfiguration {
                var: var.clone(),
            })?;
            TargetHost::parse(&value, var)?
        }
        TargetSource::OutputFile(path) => {
            let display = path.display().to_string();
            let contents = env.read_file(path).map_err(|e| TargetError::MissingArtifact {
                path: display.clone(),
                reason: format!("{e:#}"),
            })?;
            parse_output_file(&display, &contents)?
        }
    };
    tracing::debug!(host = %host, source = %source, "resolved target");
    Ok((host, source))
}

/// Reads the database password from the configured variable.
///
/// # Errors
///
/// Fails closed on a missing, empty, or placeholder value.
pub fn load_password(
    env: &impl OperatorEnvironment,
    config: &PostgresConfig,
) -> Result<DbPassword, CredentialError> {
    DbPassword::from_env_value(&config.password_env, env.var(&config.password_env))
}
