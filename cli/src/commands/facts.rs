//! `ducklake-provision facts`: gather and print the host snapshot.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::services::provision::connect_and_gather;
use crate::commands::{TargetArgs, load_config};
use crate::infra::env::{ProcessEnvironment, write_snapshot};
use crate::infra::ssh::SshConnector;

/// Arguments for the facts command.
#[derive(Args, Debug, Default)]
pub struct FactsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Save the snapshot to a file for `plan --snapshot`
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Run `ducklake-provision facts`.
///
/// Without `--output` the snapshot is printed as JSON on stdout.
///
/// # Errors
///
/// Returns an error if the target cannot be reached or the file written.
pub async fn run(app: &AppContext, args: &FactsArgs) -> Result<()> {
    let config = load_config(app, &args.target)?;
    let reporter = app.reporter();
    let connector = SshConnector::new(config.ssh.clone());
    let (host, _shell, snapshot) = connect_and_gather(
        &ProcessEnvironment,
        &connector,
        &reporter,
        &config,
        &args.target.request(),
    )
    .await?;

    match &args.output {
        Some(path) => {
            write_snapshot(path, &snapshot)?;
            app.renderer().facts(&host, &snapshot)?;
            app.output.success(&format!("Saved facts to {}", path.display()));
        }
        None => println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("JSON serialization failed")?
        ),
    }
    Ok(())
}
