//! `ducklake-provision deploy` and `ducklake-provision firewall`: plan
//! against freshly gathered facts, confirm, then apply.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::executor::execute_plan;
use crate::application::services::provision::{self, Procedure};
use crate::commands::{TargetArgs, load_config};
use crate::infra::env::ProcessEnvironment;
use crate::infra::ssh::SshConnector;

/// Arguments for the deploy and firewall commands.
#[derive(Args, Debug, Default, Clone)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the plan without changing the host
    #[arg(long)]
    pub dry_run: bool,
}

/// Run `procedure` against the resolved target.
///
/// # Errors
///
/// Returns an error if resolution, fact gathering, planning, or a step fails.
/// A failed step leaves earlier steps applied.
pub async fn run(app: &AppContext, args: &ApplyArgs, procedure: Procedure) -> Result<()> {
    let config = load_config(app, &args.target)?;
    let reporter = app.reporter();
    let connector = SshConnector::new(config.ssh.clone());

    let prepared = provision::prepare(
        &ProcessEnvironment,
        &connector,
        &reporter,
        &config,
        &args.target.request(),
        procedure,
    )
    .await?;
    let (host, backend, plan) = (&prepared.host, prepared.backend, &prepared.plan);
    let renderer = app.renderer();

    if plan.is_empty() || args.dry_run {
        return renderer.plan(host, backend, plan, None);
    }
    if !app.is_json() {
        renderer.plan(host, backend, plan, None)?;
    }
    if !app.confirm(&format!("Apply {} step(s) to {host}?", plan.len()), true)? {
        app.output.info("Cancelled.");
        return Ok(());
    }

    let report = execute_plan(&prepared.shell, plan, &reporter).await?;
    tracing::info!(
        host = %host,
        applied = report.applied.len(),
        warnings = report.warnings.len(),
        "run complete"
    );
    renderer.plan(host, backend, plan, Some(&report))
}
