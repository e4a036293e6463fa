//! Application service: deploy and firewall use-cases.
//!
//! Imports only from `crate::domain` and `crate::application`. All I/O is
//! routed through injected port traits. Target and credential problems are
//! reported before the connector is asked for a shell.

use anyhow::{Context, Result};

use crate::application::ports::{OperatorEnvironment, ProgressReporter, RemoteConnector};
use crate::application::services::facts::gather_facts;
use crate::application::services::target::{TargetRequest, load_password, resolve_target};
use crate::domain::config::DeployConfig;
use crate::domain::credential::DbPassword;
use crate::domain::plan::Plan;
use crate::domain::runbook::{self, FirewallMode, resolve_backend};
use crate::domain::snapshot::HostSnapshot;
use crate::domain::target::TargetHost;

/// Which runbook to plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    /// Database, firewall, persistence, fail2ban.
    Deploy,
    /// Firewall rules and persistence only.
    Firewall,
}

/// Planning input that depends on the procedure.
pub enum Runbook<'a> {
    Deploy(&'a DbPassword),
    Firewall,
}

/// A connected target with its facts and plan, ready to execute.
pub struct Prepared<S> {
    pub host: TargetHost,
    pub shell: S,
    pub snapshot: HostSnapshot,
    pub backend: FirewallMode,
    pub plan: Plan,
}

/// Plans `runbook` against `snapshot`.
///
/// # Errors
///
/// Propagates planning errors (database conflicts, lockout).
pub fn build_plan(snapshot: &HostSnapshot, config: &DeployConfig, runbook: &Runbook<'_>) -> Result<Plan> {
    match runbook {
        Runbook::Deploy(password) => runbook::plan_deploy(snapshot, config, password),
        Runbook::Firewall => runbook::plan_firewall(snapshot, config),
    }
}

/// Resolves the target, connects, and gathers facts.
///
/// # Errors
///
/// Returns target errors before any connection is attempted, then
/// connection and platform errors.
pub async fn connect_and_gather<C: RemoteConnector>(
    env: &impl OperatorEnvironment,
    connector: &C,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
    request: &TargetRequest,
) -> Result<(TargetHost, C::Shell, HostSnapshot)> {
    let (host, source) = resolve_target(env, request, &config.target)?;
    reporter.step(&format!("gathering facts from {host} (target from {source})"));
    let shell = connector.connect(&host);
    let snapshot = gather_facts(&shell, config)
        .await
        .with_context(|| format!("gathering facts from {host}"))?;
    reporter.success(&format!(
        "{host}: {} {} ({})",
        snapshot.platform.os_id, snapshot.platform.major_version, snapshot.platform.platform
    ));
    Ok((host, shell, snapshot))
}

/// Prepares a run of `procedure`: resolve, load the credential, connect,
/// gather, plan, verify.
///
/// # Errors
///
/// Target and credential errors are returned before any remote command.
pub async fn prepare<C: RemoteConnector>(
    env: &impl OperatorEnvironment,
    connector: &C,
    reporter: &impl ProgressReporter,
    config: &DeployConfig,
    request: &TargetRequest,
    procedure: Procedure,
) -> Result<Prepared<C::Shell>> {
    // Fail fast on local configuration before touching the network.
    resolve_target(env, request, &config.target)?;
    let password = match procedure {
        Procedure::Deploy => Some(load_password(env, &config.postgres)?),
        Procedure::Firewall => None,
    };

    let (host, shell, snapshot) = connect_and_gather(env, connector, reporter, config, request).await?;
    let runbook = match &password {
        Some(password) => Runbook::Deploy(password),
        None => Runbook::Firewall,
    };
    let backend = resolve_backend(config.firewall.backend, &snapshot);
    let plan = build_plan(&snapshot, config, &runbook)?;
    tracing::info!(host = %host, steps = plan.len(), backend = %backend, "planned");

    Ok(Prepared {
        host,
        shell,
        snapshot,
        backend,
        plan,
    })
}

/// Plans `procedure` against a previously saved snapshot. Nothing is
/// contacted.
///
/// # Errors
///
/// Credential errors for `Deploy`, then planning errors.
pub fn plan_snapshot(
    env: &impl OperatorEnvironment,
    config: &DeployConfig,
    snapshot: &HostSnapshot,
    procedure: Procedure,
) -> Result<(FirewallMode, Plan)> {
    let plan = match procedure {
        Procedure::Deploy => {
            let password = load_password(env, &config.postgres)?;
            build_plan(snapshot, config, &Runbook::Deploy(&password))?
        }
        Procedure::Firewall => build_plan(snapshot, config, &Runbook::Firewall)?,
    };
    Ok((resolve_backend(config.firewall.backend, snapshot), plan))
}
