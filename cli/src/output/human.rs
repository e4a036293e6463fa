//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::application::services::executor::ExecutionReport;
use crate::domain::config::{CONFIG_ENV, DeployConfig};
use crate::domain::plan::Plan;
use crate::domain::runbook::FirewallMode;
use crate::domain::snapshot::HostSnapshot;
use crate::domain::target::{TargetHost, TargetSource};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.info(&format!("ducklake-provision v{version}"));
    }

    /// Render the resolved target.
    pub fn render_target(&self, host: &TargetHost, source: &TargetSource) {
        if self.ctx.quiet {
            println!("{host}");
            return;
        }
        self.ctx.kv("Target:", host.as_str());
        self.ctx.kv("Source:", &source.to_string());
    }

    /// Render the steps of a plan with the commands each one runs.
    pub fn render_plan(&self, host: &TargetHost, backend: FirewallMode, plan: &Plan) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header(&format!("Plan for {host} (firewall: {backend})"));
        println!();
        if plan.is_empty() {
            self.ctx.success("Host already matches the runbook; nothing to do");
            return;
        }
        for (i, step) in plan.steps.iter().enumerate() {
            let marker = if step.best_effort { " (best effort)" } else { "" };
            println!(
                "  {:>2}. {} {}{}",
                i + 1,
                format!("[{}]", step.component).style(self.ctx.styles.component),
                step.name,
                marker.style(self.ctx.styles.dim)
            );
            for action in &step.actions {
                println!("        {}", action.describe().style(self.ctx.styles.dim));
            }
        }
        println!();
        self.ctx.info(&format!("{} step(s)", plan.len()));
    }

    /// Render the outcome of an applied plan.
    pub fn render_report(&self, host: &TargetHost, report: &ExecutionReport) {
        if self.ctx.quiet {
            return;
        }
        println!();
        for backup in &report.backups {
            self.ctx.kv("Backup:", backup);
        }
        for warning in &report.warnings {
            self.ctx.warn(warning);
        }
        self.ctx.success(&format!(
            "{host}: applied {} step(s), {} warning(s)",
            report.applied.len(),
            report.warnings.len()
        ));
    }

    /// Render gathered facts.
    pub fn render_facts(&self, host: &TargetHost, snapshot: &HostSnapshot) {
        if self.ctx.quiet {
            return;
        }
        let info = &snapshot.platform;
        println!();
        self.ctx.header(&format!("Facts for {host}"));
        println!();
        self.ctx.kv(
            "Platform:",
            &format!("{} {} {} ({})", info.os_id, info.major_version, info.arch, info.platform),
        );
        self.ctx.kv("Packages:", &snapshot.packages.len().to_string());
        self.ctx.kv(
            "Active services:",
            &snapshot.active_services.iter().cloned().collect::<Vec<_>>().join(", "),
        );
        let pg = &snapshot.postgres;
        self.ctx.kv("Data directory:", if pg.data_initialized { "initialized" } else { "absent" });
        self.ctx.kv(
            "listen_addresses:",
            pg.listen_addresses.as_deref().unwrap_or("(default)"),
        );
        self.ctx.kv("Roles:", &pg.roles.keys().cloned().collect::<Vec<_>>().join(", "));
        self.ctx.kv("Databases:", &pg.databases.keys().cloned().collect::<Vec<_>>().join(", "));
        self.ctx.kv("iptables rules:", &snapshot.firewall.live.rules.len().to_string());
        self.ctx.kv(
            "Saved rules:",
            if snapshot.firewall.persisted.is_some() { "present" } else { "absent" },
        );
        if snapshot.has_package("firewalld") {
            let fw = &snapshot.firewall.firewalld;
            self.ctx.kv("firewalld:", if fw.running { "running" } else { "stopped" });
        }
    }

    /// Render the current configuration.
    pub fn render_config(&self, config: &DeployConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        let pg = &config.postgres;
        println!("  {:<24} {}", "postgres.version:", pg.version);
        println!("  {:<24} {}", "postgres.role:", pg.role);
        println!("  {:<24} {}", "postgres.database:", pg.database);
        println!("  {:<24} {}", "postgres.port:", pg.port);
        println!("  {:<24} {}", "postgres.allowed_cidr:", pg.allowed_cidr);
        println!("  {:<24} {}", "postgres.auth_method:", pg.auth_method);
        println!("  {:<24} {}", "firewall.backend:", config.firewall.backend);
        println!("  {:<24} {}", "firewall.ssh_port:", config.firewall.ssh_port);
        println!("  {:<24} {}", "fail2ban.enabled:", config.fail2ban.enabled);
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in [
            CONFIG_ENV,
            config.target.env_var.as_str(),
            pg.password_env.as_str(),
        ] {
            let value = match std::env::var(var) {
                Ok(_) if var == pg.password_env => "(set)".to_string(),
                Ok(v) => v,
                Err(_) => "(not set)".to_string(),
            };
            println!("    {:<24} {value}", format!("{var}:"));
        }
        println!();
    }
}
