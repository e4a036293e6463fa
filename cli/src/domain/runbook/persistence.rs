//! Firewall persistence: the boot-time restore package, its service, and
//! the rule save.

use crate::domain::plan::{Action, Component, PlanBuilder, Step};
use crate::domain::platform::Platform;
use crate::domain::runbook::{FirewallMode, enable, install_step};
use crate::domain::snapshot::Effect;

const COMPONENT: Component = Component::Persistence;

/// Saved rule file the restore service loads at boot.
#[must_use]
pub fn rules_file(platform: Platform) -> &'static str {
    match platform {
        Platform::Debian => "/etc/iptables/rules.v4",
        Platform::Rhel => "/etc/sysconfig/iptables",
    }
}

struct Persistence {
    package: &'static str,
    service: &'static str,
    save: &'static [&'static str],
}

fn persistence_for(platform: Platform) -> Persistence {
    match platform {
        Platform::Debian => Persistence {
            package: "iptables-persistent",
            service: "netfilter-persistent",
            save: &["netfilter-persistent", "save"],
        },
        Platform::Rhel => Persistence {
            package: "iptables-services",
            service: "iptables",
            save: &["service", "iptables", "save"],
        },
    }
}

/// Answers the install-time questions so the package installs unattended
/// without saving rules on its own.
const DEBCONF_PRESEED: &str = "printf '%s\\n' \
'iptables-persistent iptables-persistent/autosave_v4 boolean false' \
'iptables-persistent iptables-persistent/autosave_v6 boolean false' \
| debconf-set-selections";

/// Plans persistence of the live iptables rule set. firewalld keeps its
/// permanent configuration itself, so that backend plans nothing.
pub fn persist_firewall_config(builder: &mut PlanBuilder, mode: FirewallMode) {
    if mode == FirewallMode::Firewalld {
        return;
    }
    let platform = builder.snapshot().platform.platform;
    let persistence = persistence_for(platform);

    let name = format!("install {}", persistence.package);
    if let Some(mut step) =
        install_step(builder, COMPONENT, &name, &[persistence.package.to_string()])
    {
        if platform == Platform::Debian {
            step.actions
                .insert(0, Action::command(["sh", "-c", DEBCONF_PRESEED]));
        }
        builder.push(step);
    }

    // Enabled only: starting the RHEL service would load the stock rule file
    // over the live rules.
    enable(builder, COMPONENT, persistence.service);

    let firewall = &builder.snapshot().firewall;
    let saved = firewall
        .persisted
        .as_ref()
        .is_some_and(|persisted| persisted.equivalent(&firewall.live));
    if saved {
        return;
    }

    builder.push(
        Step::new(COMPONENT, "save firewall rules")
            .action(Action::command(persistence.save.iter().copied()))
            .effect(Effect::RulesPersisted)
            .best_effort(),
    );
}
