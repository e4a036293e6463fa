//! Firewall configurator: baseline allow rules and default-deny policies
//! (iptables) or zone configuration (firewalld).

use crate::domain::firewall::{Chain, FirewallRule, Policy};
use crate::domain::plan::{Action, Component, PlanBuilder, Step};
use crate::domain::platform::Platform;
use crate::domain::runbook::{FirewallMode, enable, install};
use crate::domain::snapshot::Effect;

const COMPONENT: Component = Component::Firewall;

/// Default policies, applied after the allow rules.
const POLICIES: [(Chain, Policy); 3] = [
    (Chain::Input, Policy::Drop),
    (Chain::Forward, Policy::Drop),
    (Chain::Output, Policy::Accept),
];

/// Baseline allow rules in the order they must be appended.
#[must_use]
pub fn baseline_rules(ssh_port: u16) -> [(&'static str, FirewallRule); 4] {
    [
        ("allow loopback input", FirewallRule::loopback_in()),
        ("allow loopback output", FirewallRule::loopback_out()),
        (
            "allow established and related connections",
            FirewallRule::established_in(),
        ),
        ("allow SSH", FirewallRule::allow_tcp_in(ssh_port)),
    ]
}

/// Plans the packet filter for the resolved backend.
pub fn setup_firewall(builder: &mut PlanBuilder, mode: FirewallMode, ssh_port: u16, db_port: u16) {
    match mode {
        FirewallMode::Iptables => setup_iptables(builder, ssh_port),
        FirewallMode::Firewalld => setup_firewalld(builder, ssh_port, db_port),
    }
}

/// Appends the database-port allow rule (iptables backend).
pub fn open_database_port(builder: &mut PlanBuilder, port: u16) {
    ensure_iptables(builder, Component::DatabasePort);
    let rule = FirewallRule::allow_tcp_in(port);
    if builder.snapshot().firewall.live.contains(&rule) {
        return;
    }
    builder.push(
        Step::new(Component::DatabasePort, format!("allow PostgreSQL on port {port}"))
            .action(Action::Command {
                argv: rule.append_command(),
            })
            .effect(Effect::RuleAppended { rule }),
    );
}

/// Package providing the `iptables` command.
fn iptables_package(builder: &PlanBuilder) -> String {
    let info = &builder.snapshot().platform;
    let nft_only = info.platform == Platform::Rhel
        && info.major_version.parse::<u32>().is_ok_and(|v| v >= 9);
    if nft_only {
        "iptables-nft".to_string()
    } else {
        "iptables".to_string()
    }
}

fn ensure_iptables(builder: &mut PlanBuilder, component: Component) {
    let package = iptables_package(builder);
    install(builder, component, "install iptables", &[package]);
}

fn setup_iptables(builder: &mut PlanBuilder, ssh_port: u16) {
    ensure_iptables(builder, COMPONENT);

    for (name, rule) in baseline_rules(ssh_port) {
        if builder.snapshot().firewall.live.contains(&rule) {
            continue;
        }
        builder.push(
            Step::new(COMPONENT, name)
                .action(Action::Command {
                    argv: rule.append_command(),
                })
                .effect(Effect::RuleAppended { rule }),
        );
    }

    for (chain, policy) in POLICIES {
        if builder.snapshot().firewall.live.policy(chain) == policy {
            continue;
        }
        builder.push(
            Step::new(COMPONENT, format!("set {chain} policy {policy}"))
                .action(Action::command([
                    "iptables".to_string(),
                    "-P".to_string(),
                    chain.to_string(),
                    policy.to_string(),
                ]))
                .effect(Effect::PolicySet { chain, policy }),
        );
    }
}

/// A firewalld zone entry: a named service or a `port/proto` pair.
enum ZoneEntry {
    Service(String),
    Port(String),
}

impl ZoneEntry {
    fn flag(&self) -> String {
        match self {
            Self::Service(s) => format!("--add-service={s}"),
            Self::Port(p) => format!("--add-port={p}"),
        }
    }

    fn effect(&self) -> Effect {
        match self {
            Self::Service(s) => Effect::FirewalldServiceAllowed { service: s.clone() },
            Self::Port(p) => Effect::FirewalldPortAllowed { port: p.clone() },
        }
    }
}

fn setup_firewalld(builder: &mut PlanBuilder, ssh_port: u16, db_port: u16) {
    install(builder, COMPONENT, "install firewalld", &["firewalld".to_string()]);

    let ssh = if ssh_port == 22 {
        ZoneEntry::Service("ssh".to_string())
    } else {
        ZoneEntry::Port(format!("{ssh_port}/tcp"))
    };
    let db = ZoneEntry::Port(format!("{db_port}/tcp"));

    let state = &builder.snapshot().firewall.firewalld;
    let missing: Vec<ZoneEntry> = [ssh, db]
        .into_iter()
        .filter(|entry| match entry {
            ZoneEntry::Service(s) => !state.services.contains(s),
            ZoneEntry::Port(p) => !state.ports.contains(p),
        })
        .collect();
    let running = state.running;

    if running {
        let mut step = Step::new(COMPONENT, "allow SSH and PostgreSQL in firewalld");
        for entry in &missing {
            step = step
                .action(Action::command([
                    "firewall-cmd".to_string(),
                    "--permanent".to_string(),
                    entry.flag(),
                ]))
                .effect(entry.effect());
        }
        if !missing.is_empty() {
            step = step.action(Action::command(["firewall-cmd", "--reload"]));
        }
        builder.push(step);
        enable(builder, COMPONENT, "firewalld");
        return;
    }

    // Offline edits land in the permanent configuration the daemon loads.
    let mut step = Step::new(COMPONENT, "allow SSH and PostgreSQL in firewalld (offline)");
    for entry in &missing {
        step = step
            .action(Action::command([
                "firewall-offline-cmd".to_string(),
                entry.flag(),
            ]))
            .effect(entry.effect());
    }
    builder.push(step);
    builder.push(
        Step::new(COMPONENT, "enable and start firewalld")
            .action(Action::command(["systemctl", "enable", "--now", "firewalld"]))
            .effect(Effect::FirewalldRunning)
            .effect(Effect::ServiceEnabled {
                service: "firewalld".to_string(),
            })
            .effect(Effect::ServiceStarted {
                service: "firewalld".to_string(),
            }),
    );
}
