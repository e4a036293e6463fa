//! `ducklake-provision plan`: print what a run would change.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::provision::{self, Procedure};
use crate::commands::deploy::{self, ApplyArgs};
use crate::commands::{TargetArgs, load_config};
use crate::domain::target::TargetHost;
use crate::infra::env::{ProcessEnvironment, read_snapshot};

/// Arguments for the plan command.
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Plan against a snapshot saved by `facts --output` instead of the host
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Plan the firewall procedure only
    #[arg(long)]
    pub firewall_only: bool,
}

/// Run `ducklake-provision plan`.
///
/// # Errors
///
/// Returns an error if facts cannot be gathered or planning fails.
pub async fn run(app: &AppContext, args: &PlanArgs) -> Result<()> {
    let procedure = if args.firewall_only {
        Procedure::Firewall
    } else {
        Procedure::Deploy
    };

    let Some(path) = &args.snapshot else {
        let apply = ApplyArgs {
            target: args.target.clone(),
            dry_run: true,
        };
        return deploy::run(app, &apply, procedure).await;
    };

    let config = load_config(app, &args.target)?;
    let snapshot = read_snapshot(path)?;
    let (backend, plan) =
        provision::plan_snapshot(&ProcessEnvironment, &config, &snapshot, procedure)?;
    let label = TargetHost::parse(&path.display().to_string(), "--snapshot")?;
    app.renderer().plan(&label, backend, &plan, None)
}
