//! Intrusion prevention for SSH.

use crate::domain::plan::{Action, Component, FileEdit, PlanBuilder, Step};
use crate::domain::platform::Platform;
use crate::domain::runbook::{enable_and_start, install, restart_if_pending};
use crate::domain::snapshot::Effect;

const COMPONENT: Component = Component::IntrusionPrevention;
const SERVICE: &str = "fail2ban";

/// Drop-in jail file managed by the runbook.
pub const JAIL_PATH: &str = "/etc/fail2ban/jail.d/sshd.local";

/// Contents of [`JAIL_PATH`].
#[must_use]
pub fn jail_config(ssh_port: u16) -> String {
    format!("[sshd]\nenabled = true\nport = {ssh_port}\n")
}

pub fn setup_fail2ban(builder: &mut PlanBuilder, ssh_port: u16) {
    let info = builder.snapshot().platform.clone();
    if info.platform == Platform::Rhel {
        install(builder, COMPONENT, "install EPEL release", &[info.epel_package()]);
    }
    install(builder, COMPONENT, "install fail2ban", &[SERVICE.to_string()]);

    let content = jail_config(ssh_port);
    if builder.snapshot().files.get(JAIL_PATH) != Some(&content) {
        let mut step = Step::new(COMPONENT, "enable sshd jail")
            .action(Action::EditFile {
                path: JAIL_PATH.to_string(),
                edit: FileEdit::Replace {
                    content: content.clone(),
                },
            })
            .effect(Effect::FileWritten {
                path: JAIL_PATH.to_string(),
                content,
            });
        if builder.snapshot().is_active(SERVICE) {
            step = step.effect(Effect::RestartRequired {
                service: SERVICE.to_string(),
            });
        }
        builder.push(step);
    }

    enable_and_start(builder, COMPONENT, SERVICE);
    restart_if_pending(builder, COMPONENT, SERVICE);
}
