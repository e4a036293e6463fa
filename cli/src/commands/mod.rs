//! Command implementations

pub mod config;
pub mod deploy;
pub mod facts;
pub mod plan;
pub mod target;
pub mod version;

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::config_service;
use crate::application::services::target::TargetRequest;
use crate::domain::config::{DeployConfig, validate};

/// Target selection and SSH overrides shared by the remote commands.
#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    /// Target address, overriding every other source
    #[arg(long, value_name = "ADDR")]
    pub host: Option<String>,

    /// Deployment output file holding `{"ip": "..."}`
    #[arg(long, value_name = "PATH")]
    pub target_file: Option<PathBuf>,

    /// Environment variable holding the target address
    #[arg(long, value_name = "VAR")]
    pub target_env: Option<String>,

    /// Remote user
    #[arg(long, value_name = "USER")]
    pub ssh_user: Option<String>,

    /// SSH port; the firewall allow rule opens the same port
    #[arg(long, value_name = "PORT")]
    pub ssh_port: Option<u16>,

    /// Private key for the connection
    #[arg(long, value_name = "PATH")]
    pub identity: Option<PathBuf>,
}

impl TargetArgs {
    /// Target selection for the resolver.
    #[must_use]
    pub fn request(&self) -> TargetRequest {
        TargetRequest {
            host: self.host.clone(),
            env_var: self.target_env.clone(),
            output_file: self.target_file.clone(),
        }
    }

    /// Applies the SSH overrides to `config`.
    pub fn apply(&self, config: &mut DeployConfig) {
        if let Some(user) = &self.ssh_user {
            config.ssh.user = Some(user.clone());
        }
        if let Some(port) = self.ssh_port {
            config.ssh.port = port;
            config.firewall.ssh_port = port;
        }
        if let Some(identity) = &self.identity {
            config.ssh.identity_file = Some(identity.clone());
        }
    }
}

/// Loads the configuration and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the file is unreadable or a value is invalid.
pub fn load_config(app: &AppContext, target: &TargetArgs) -> Result<DeployConfig> {
    let mut config = config_service::load_config(&app.config_store)?;
    target.apply(&mut config);
    validate(&config)?;
    Ok(config)
}
