//! The provisioning runbook: pure planners that turn a [`HostSnapshot`] and
//! the configuration into a [`Plan`].
//!
//! Every planner follows the same rule: emit an action only when the
//! snapshot shows the desired state does not yet hold, and record the
//! resulting state as effects so that later planners (and a second run)
//! see it.

pub mod fail2ban;
pub mod firewall;
pub mod persistence;
pub mod postgres;

use anyhow::Result;

use crate::domain::config::{DeployConfig, FirewallBackend};
use crate::domain::credential::DbPassword;
use crate::domain::plan::{Action, Component, Plan, PlanBuilder, Step};
use crate::domain::platform::Platform;
use crate::domain::snapshot::{Effect, HostSnapshot};

/// Firewall backend after resolving `auto` against the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallMode {
    Iptables,
    Firewalld,
}

impl std::fmt::Display for FirewallMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Iptables => f.write_str("iptables"),
            Self::Firewalld => f.write_str("firewalld"),
        }
    }
}

/// Resolves the configured backend. `auto` picks firewalld on RHEL-family
/// hosts that have it installed.
#[must_use]
pub fn resolve_backend(configured: FirewallBackend, snapshot: &HostSnapshot) -> FirewallMode {
    match configured {
        FirewallBackend::Iptables => FirewallMode::Iptables,
        FirewallBackend::Firewalld => FirewallMode::Firewalld,
        FirewallBackend::Auto => {
            if snapshot.platform.platform == Platform::Rhel && snapshot.has_package("firewalld") {
                FirewallMode::Firewalld
            } else {
                FirewallMode::Iptables
            }
        }
    }
}

/// Full deployment: database, database port, firewall, persistence,
/// intrusion prevention.
///
/// # Errors
///
/// Fails on an unconvergeable database, a credential error, or a plan that
/// would lock out SSH.
pub fn plan_deploy(
    snapshot: &HostSnapshot,
    config: &DeployConfig,
    password: &DbPassword,
) -> Result<Plan> {
    let mode = resolve_backend(config.firewall.backend, snapshot);
    let mut builder = PlanBuilder::new(snapshot.clone());

    postgres::setup_postgres(&mut builder, &config.postgres, password)?;
    if mode == FirewallMode::Iptables {
        firewall::open_database_port(&mut builder, config.postgres.port);
    }
    firewall::setup_firewall(&mut builder, mode, config.firewall.ssh_port, config.postgres.port);
    persistence::persist_firewall_config(&mut builder, mode);
    if config.fail2ban.enabled {
        fail2ban::setup_fail2ban(&mut builder, config.firewall.ssh_port);
    }

    let (plan, _) = builder.finish();
    plan.verify(snapshot, config.firewall.ssh_port)?;
    Ok(plan)
}

/// Firewall rules and their persistence only.
///
/// # Errors
///
/// Fails when the plan would lock out SSH.
pub fn plan_firewall(snapshot: &HostSnapshot, config: &DeployConfig) -> Result<Plan> {
    let mode = resolve_backend(config.firewall.backend, snapshot);
    let mut builder = PlanBuilder::new(snapshot.clone());

    firewall::setup_firewall(&mut builder, mode, config.firewall.ssh_port, config.postgres.port);
    persistence::persist_firewall_config(&mut builder, mode);

    let (plan, _) = builder.finish();
    plan.verify(snapshot, config.firewall.ssh_port)?;
    Ok(plan)
}

// ── Shared step helpers ──────────────────────────────────────────────────────

/// Builds an install step for the packages in `packages` that are missing.
///
/// Pushes a package-index refresh first when the platform needs one and it
/// has not happened yet in this run. Returns `None` when nothing is missing.
pub(crate) fn install_step(
    builder: &mut PlanBuilder,
    component: Component,
    name: &str,
    packages: &[String],
) -> Option<Step> {
    let missing: Vec<&str> = packages
        .iter()
        .filter(|p| !builder.snapshot().has_package(p))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        return None;
    }

    if !builder.snapshot().package_index_refreshed {
        if let Some(argv) = builder.snapshot().platform.refresh_index_command() {
            builder.push(
                Step::new(component, "refresh package index")
                    .action(Action::Command { argv })
                    .effect(Effect::PackageIndexRefreshed),
            );
        }
    }

    let argv = builder.snapshot().platform.install_command(&missing);
    Some(
        Step::new(component, name)
            .action(Action::Command { argv })
            .effect(Effect::PackagesInstalled {
                packages: missing.iter().map(ToString::to_string).collect(),
            }),
    )
}

/// Pushes the install step for any missing `packages`.
pub(crate) fn install(
    builder: &mut PlanBuilder,
    component: Component,
    name: &str,
    packages: &[String],
) {
    if let Some(step) = install_step(builder, component, name, packages) {
        builder.push(step);
    }
}

/// Enables and starts `service` as needed.
pub(crate) fn enable_and_start(builder: &mut PlanBuilder, component: Component, service: &str) {
    let enabled = builder.snapshot().is_enabled(service);
    let active = builder.snapshot().is_active(service);
    let argv: Vec<&str> = match (enabled, active) {
        (true, true) => return,
        (false, false) => vec!["systemctl", "enable", "--now", service],
        (false, true) => vec!["systemctl", "enable", service],
        (true, false) => vec!["systemctl", "start", service],
    };

    let mut step = Step::new(component, format!("enable and start {service}"))
        .action(Action::command(argv));
    if !enabled {
        step = step.effect(Effect::ServiceEnabled {
            service: service.to_string(),
        });
    }
    if !active {
        step = step.effect(Effect::ServiceStarted {
            service: service.to_string(),
        });
    }
    builder.push(step);
}

/// Enables `service` for boot without starting it.
pub(crate) fn enable(builder: &mut PlanBuilder, component: Component, service: &str) {
    if builder.snapshot().is_enabled(service) {
        return;
    }
    builder.push(
        Step::new(component, format!("enable {service}"))
            .action(Action::command(["systemctl", "enable", service]))
            .effect(Effect::ServiceEnabled {
                service: service.to_string(),
            }),
    );
}

/// Restarts `service` when an earlier step changed its configuration.
pub(crate) fn restart_if_pending(builder: &mut PlanBuilder, component: Component, service: &str) {
    if !builder.snapshot().pending_restarts.contains(service) {
        return;
    }
    builder.push(
        Step::new(component, format!("restart {service}"))
            .action(Action::command(["systemctl", "restart", service]))
            .effect(Effect::ServiceRestarted {
                service: service.to_string(),
            }),
    );
}
