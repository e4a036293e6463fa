//! `ducklake-provision config`: show and initialize configuration.

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::config_service;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be read or written.
pub fn run(app: &AppContext, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let config = config_service::load_config(&app.config_store)?;
            let path = app.config_store.path()?;
            app.renderer().config(&config, &path)
        }
        ConfigCommand::Path => {
            println!("{}", app.config_store.path()?.display());
            Ok(())
        }
        ConfigCommand::Init { force } => {
            let path = app.config_store.path()?;
            if config_service::init_config(&app.config_store, *force)? {
                app.output.success(&format!("Wrote {}", path.display()));
            } else {
                app.output.warn(&format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ));
            }
            Ok(())
        }
    }
}
