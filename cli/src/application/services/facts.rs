//! Application service: fact gathering.
//!
//! Builds a [`HostSnapshot`] from read-only commands on the target. Nothing
//! here changes the host.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};

use crate::application::ports::ShellExecutor;
use crate::domain::config::DeployConfig;
use crate::domain::error::PlatformError;
use crate::domain::firewall::RuleSet;
use crate::domain::platform::{Platform, detect};
use crate::domain::postgres::{
    PGDG_APT_LIST, PostgresLayout, hba_entries, listen_addresses, normalize_locale, quote_literal,
};
use crate::domain::runbook::fail2ban::JAIL_PATH;
use crate::domain::runbook::persistence::rules_file;
use crate::domain::snapshot::{
    DatabaseState, FirewalldState, HostSnapshot, PostgresState, RoleState,
};

/// Exit status `ssh` reports for its own failures.
pub const SSH_FAILURE: i32 = 255;

/// Privilege escalation prefix; `-n` fails instead of prompting.
pub const SUDO: [&str; 2] = ["sudo", "-n"];

/// `psql` invocation as the database superuser, reading SQL from stdin.
pub const PSQL: [&str; 13] = [
    "sudo", "-n", "-u", "postgres", "psql", "-X", "-q", "-v", "ON_ERROR_STOP=1", "-d", "postgres",
    "-f", "-",
];

/// Runs a read-only command. `Ok(None)` when it exits non-zero.
///
/// # Errors
///
/// Returns an error when the command cannot be run or the connection fails.
pub async fn probe(shell: &impl ShellExecutor, args: &[&str]) -> Result<Option<String>> {
    let output = shell.exec(args).await?;
    if output.status.code() == Some(SSH_FAILURE) {
        bail!(
            "cannot reach target: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned()))
}

async fn probe_privileged(shell: &impl ShellExecutor, args: &[&str]) -> Result<Option<String>> {
    let argv: Vec<&str> = SUDO.iter().chain(args).copied().collect();
    probe(shell, &argv).await
}

/// Runs a query as the database superuser in unaligned, tuples-only mode.
async fn query(shell: &impl ShellExecutor, sql: &str) -> Result<Vec<Vec<String>>> {
    let mut argv = PSQL.to_vec();
    argv.extend(["-A", "-t", "-F", "|"]);
    let output = shell.exec_with_stdin(&argv, sql.as_bytes()).await?;
    if !output.status.success() {
        bail!(
            "query failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split('|').map(str::to_string).collect())
        .collect())
}

/// Gathers the current state of the target.
///
/// # Errors
///
/// Returns an error when the host is unreachable, lacks passwordless sudo,
/// or runs an unsupported platform.
pub async fn gather_facts(shell: &impl ShellExecutor, config: &DeployConfig) -> Result<HostSnapshot> {
    let os_release = probe(shell, &["cat", "/etc/os-release"])
        .await?
        .ok_or(PlatformError::MissingOsRelease)?;
    let arch = probe(shell, &["uname", "-m"]).await?.unwrap_or_default();
    let info = detect(&os_release, &arch)?;
    tracing::info!(
        platform = %info.platform,
        os = %info.os_id,
        version = %info.major_version,
        "detected platform"
    );

    if probe_privileged(shell, &["true"]).await?.is_none() {
        bail!("passwordless sudo is required for the SSH user on the target");
    }

    let mut snapshot = HostSnapshot::new(info);
    snapshot.packages = installed_packages(shell, snapshot.platform.platform).await?;
    snapshot.enabled_services = unit_names(
        &probe(
            shell,
            &[
                "systemctl",
                "list-unit-files",
                "--type=service",
                "--state=enabled",
                "--no-legend",
                "--plain",
            ],
        )
        .await?
        .unwrap_or_default(),
    );
    snapshot.active_services = unit_names(
        &probe(
            shell,
            &[
                "systemctl",
                "list-units",
                "--type=service",
                "--state=active",
                "--no-legend",
                "--plain",
            ],
        )
        .await?
        .unwrap_or_default(),
    );
    snapshot.locales = probe(shell, &["locale", "-a"])
        .await?
        .unwrap_or_default()
        .lines()
        .map(|l| normalize_locale(l.trim()))
        .collect();

    snapshot.postgres = postgres_state(shell, &snapshot, config)
        .await
        .context("reading PostgreSQL state")?;
    firewall_state(shell, &mut snapshot).await?;

    let mut managed = vec![JAIL_PATH];
    if snapshot.platform.platform == Platform::Debian {
        managed.push(PGDG_APT_LIST);
    }
    for path in managed {
        if let Some(contents) = probe_privileged(shell, &["cat", path]).await? {
            snapshot.files.insert(path.to_string(), contents);
        }
    }

    tracing::debug!(
        packages = snapshot.packages.len(),
        rules = snapshot.firewall.live.rules.len(),
        "gathered facts"
    );
    Ok(snapshot)
}

async fn installed_packages(shell: &impl ShellExecutor, platform: Platform) -> Result<BTreeSet<String>> {
    let listing = match platform {
        Platform::Debian => {
            probe(shell, &["dpkg-query", "-W", "-f=${db:Status-Status} ${Package}\\n"]).await?
        }
        Platform::Rhel => probe(shell, &["rpm", "-qa", "--qf", "%{NAME}\\n"]).await?,
    }
    .context("cannot list installed packages")?;
    Ok(parse_packages(platform, &listing))
}

fn parse_packages(platform: Platform, listing: &str) -> BTreeSet<String> {
    listing
        .lines()
        .filter_map(|line| match platform {
            Platform::Debian => line.strip_prefix("installed "),
            Platform::Rhel => Some(line),
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Service names from `systemctl --plain --no-legend` listings.
fn unit_names(listing: &str) -> BTreeSet<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|unit| unit.strip_suffix(".service"))
        .map(str::to_string)
        .collect()
}

async fn postgres_state(
    shell: &impl ShellExecutor,
    snapshot: &HostSnapshot,
    config: &DeployConfig,
) -> Result<PostgresState> {
    let pg = &config.postgres;
    let layout = PostgresLayout::new(snapshot.platform.platform, pg.version);
    let (marker, conf_path, hba_path) = (
        layout.version_marker(),
        layout.postgresql_conf(),
        layout.hba_conf(),
    );
    let mut state = PostgresState {
        data_initialized: probe_privileged(shell, &["test", "-f", marker.as_str()])
            .await?
            .is_some(),
        ..PostgresState::default()
    };

    if let Some(conf) = probe_privileged(shell, &["cat", conf_path.as_str()]).await? {
        state.listen_addresses = listen_addresses(&conf);
    }
    if let Some(conf) = probe_privileged(shell, &["cat", hba_path.as_str()]).await? {
        state.hba_entries = hba_entries(&conf);
    }

    if !snapshot.is_active(&layout.service()) {
        if state.data_initialized {
            tracing::info!(
                service = %layout.service(),
                "server not running; role and database state unknown"
            );
        }
        return Ok(state);
    }

    let roles = query(
        shell,
        &format!(
            "SELECT rolname, rolcanlogin, coalesce(rolpassword, '') FROM pg_authid WHERE rolname = {};",
            quote_literal(&pg.role)
        ),
    )
    .await?;
    for row in roles {
        if let [name, login, verifier] = row.as_slice() {
            state.roles.insert(
                name.clone(),
                RoleState {
                    login: login == "t",
                    verifier: (!verifier.is_empty()).then(|| verifier.clone()),
                },
            );
        }
    }

    let databases = query(
        shell,
        &format!(
            "SELECT datname, pg_get_userbyid(datdba), pg_encoding_to_char(encoding), datcollate, datctype \
             FROM pg_database WHERE datname = {};",
            quote_literal(&pg.database)
        ),
    )
    .await?;
    for row in databases {
        if let [name, owner, encoding, collate, ctype] = row.as_slice() {
            state.databases.insert(
                name.clone(),
                DatabaseState {
                    owner: owner.clone(),
                    encoding: encoding.clone(),
                    collate: collate.clone(),
                    ctype: ctype.clone(),
                },
            );
        }
    }
    state.catalog_known = true;
    Ok(state)
}

async fn firewall_state(shell: &impl ShellExecutor, snapshot: &mut HostSnapshot) -> Result<()> {
    if let Some(rules) = probe_privileged(shell, &["iptables", "-S"]).await? {
        snapshot.firewall.live = RuleSet::parse(&rules);
    }
    let saved = rules_file(snapshot.platform.platform);
    if let Some(rules) = probe_privileged(shell, &["cat", saved]).await? {
        snapshot.firewall.persisted = Some(RuleSet::parse(&rules));
    }

    if !snapshot.has_package("firewalld") {
        return Ok(());
    }
    let running = probe_privileged(shell, &["firewall-cmd", "--state"]).await?.is_some();
    let tool: &[&str] = if running {
        &["firewall-cmd", "--permanent"]
    } else {
        &["firewall-offline-cmd"]
    };
    let list = |flag: &'static str| {
        let mut argv = tool.to_vec();
        argv.push(flag);
        argv
    };
    let services = probe_privileged(shell, &list("--list-services")).await?.unwrap_or_default();
    let ports = probe_privileged(shell, &list("--list-ports")).await?.unwrap_or_default();
    snapshot.firewall.firewalld = FirewalldState {
        running,
        services: services.split_whitespace().map(str::to_string).collect(),
        ports: ports.split_whitespace().map(str::to_string).collect(),
    };
    Ok(())
}
