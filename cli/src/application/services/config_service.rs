//! Application service: configuration use-cases.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::{DeployConfig, validate};

/// Load and validate configuration.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or holds an invalid value.
pub fn load_config(store: &impl ConfigStore) -> Result<DeployConfig> {
    let config = store.load()?;
    validate(&config)?;
    Ok(config)
}

/// Write the default configuration unless a file already exists.
///
/// Returns `false` when an existing file was left untouched and `force`
/// was not given.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn init_config(store: &impl ConfigStore, force: bool) -> Result<bool> {
    if store.path()?.exists() && !force {
        return Ok(false);
    }
    store.save(&DeployConfig::default())?;
    Ok(true)
}
