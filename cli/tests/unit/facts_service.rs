//! Unit tests for fact gathering against scripted hosts.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use ducklake_provision::application::services::facts::gather_facts;
use ducklake_provision::application::services::provision::{Procedure, plan_snapshot};
use ducklake_provision::domain::config::DeployConfig;
use ducklake_provision::domain::error::PlatformError;
use ducklake_provision::domain::firewall::{Chain, Policy};
use ducklake_provision::domain::plan::Action;
use ducklake_provision::domain::platform::Platform;

use crate::helpers::{FakeEnv, err_output};
use crate::mocks::{MockShell, fresh_oracle_with_firewalld, fresh_ubuntu};

const SCRAM: &str = "SCRAM-SHA-256$4096:c2FsdA==$c3RvcmVk:c2VydmVy";

fn provisioned_ubuntu() -> MockShell {
    fresh_ubuntu()
        .ok(
            "dpkg-query",
            "installed postgresql-16\ninstalled iptables\ninstalled fail2ban\n",
        )
        .ok(
            "systemctl list-units",
            "postgresql.service loaded active exited\nfail2ban.service loaded active running\n",
        )
        .ok("sudo -n test -f /var/lib/postgresql/16/main/PG_VERSION", "")
        .ok(
            "sudo -n cat /etc/postgresql/16/main/postgresql.conf",
            "#listen_addresses = 'localhost'\nlisten_addresses = '*'\n",
        )
        .ok(
            "sudo -n cat /etc/postgresql/16/main/pg_hba.conf",
            "local all postgres peer\nhost ducklake_catalog ducklake 0.0.0.0/0 scram-sha-256\n",
        )
        .respond_stdin(
            "sudo -n -u postgres psql",
            "pg_authid",
            crate::helpers::ok_output(format!("ducklake|t|{SCRAM}\n").as_bytes()),
        )
        .respond_stdin(
            "sudo -n -u postgres psql",
            "pg_database",
            crate::helpers::ok_output(b"ducklake_catalog|ducklake|UTF8|en_US.UTF-8|en_US.UTF-8\n"),
        )
        .ok(
            "sudo -n iptables -S",
            "-P INPUT DROP\n-P FORWARD DROP\n-P OUTPUT ACCEPT\n-A INPUT -i lo -j ACCEPT\n\
             -A INPUT -p tcp -m tcp --dport 22 -j ACCEPT\n",
        )
        .ok(
            "sudo -n cat /etc/iptables/rules.v4",
            "*filter\n:INPUT DROP [0:0]\n:FORWARD DROP [0:0]\n:OUTPUT ACCEPT [0:0]\n\
             -A INPUT -i lo -j ACCEPT\nCOMMIT\n",
        )
        .ok(
            "sudo -n cat /etc/fail2ban/jail.d/sshd.local",
            "[sshd]\nenabled = true\nport = 22\n",
        )
}

#[tokio::test]
async fn test_fresh_ubuntu_snapshot() {
    let shell = fresh_ubuntu();
    let snapshot = gather_facts(&shell, &DeployConfig::default()).await.unwrap();

    assert_eq!(snapshot.platform.platform, Platform::Debian);
    assert_eq!(snapshot.platform.major_version, "24");
    assert!(snapshot.has_package("openssh-server"));
    assert!(snapshot.is_active("ssh"));
    assert!(!snapshot.postgres.data_initialized);
    assert!(snapshot.postgres.roles.is_empty());
    assert!(snapshot.firewall.live.rules.is_empty());
    assert!(snapshot.firewall.persisted.is_none());

    // The database is not queried while the service is down.
    assert!(shell.lines().iter().all(|l| !l.contains("psql")));
}

#[tokio::test]
async fn test_provisioned_ubuntu_snapshot() {
    let shell = provisioned_ubuntu();
    let snapshot = gather_facts(&shell, &DeployConfig::default()).await.unwrap();

    let pg = &snapshot.postgres;
    assert!(pg.data_initialized);
    assert!(pg.catalog_known);
    assert_eq!(pg.listen_addresses.as_deref(), Some("*"));
    assert_eq!(pg.hba_entries.len(), 1);
    assert_eq!(pg.hba_entries[0].method, "scram-sha-256");

    let role = &pg.roles["ducklake"];
    assert!(role.login);
    assert_eq!(role.verifier.as_deref(), Some(SCRAM));
    let db = &pg.databases["ducklake_catalog"];
    assert_eq!(db.owner, "ducklake");
    assert_eq!(db.encoding, "UTF8");

    let fw = &snapshot.firewall;
    assert_eq!(fw.live.policy(Chain::Input), Policy::Drop);
    assert!(fw.live.allows_tcp_in(22));
    let saved = fw.persisted.as_ref().expect("rules file");
    assert_eq!(saved.policy(Chain::Forward), Policy::Drop);
    assert_eq!(saved.rules.len(), 1);

    assert!(snapshot.files.contains_key("/etc/fail2ban/jail.d/sshd.local"));
}

#[tokio::test]
async fn test_stopped_server_leaves_catalog_unknown() {
    let shell = provisioned_ubuntu()
        .ok(
            "systemctl list-unit-files",
            "ssh.service enabled enabled\npostgresql.service enabled enabled\n",
        )
        .ok("systemctl list-units", "ssh.service loaded active running\n")
        .ok("locale -a", "C\nC.utf8\nen_US.utf8\n");
    let snapshot = gather_facts(&shell, &DeployConfig::default()).await.unwrap();

    let pg = &snapshot.postgres;
    assert!(pg.data_initialized);
    assert!(!pg.catalog_known);
    assert!(pg.roles.is_empty() && pg.databases.is_empty());
    assert!(shell.lines().iter().all(|l| !l.contains("psql")));

    // The plan must not assume the role and database are missing.
    let env = FakeEnv::default()
        .with_var("DUCKLAKE_POSTGRES_HOST", "10.0.0.5")
        .with_var("POSTGRES_DB_PASSWORD", "s3cret");
    let (_, plan) =
        plan_snapshot(&env, &DeployConfig::default(), &snapshot, Procedure::Deploy).unwrap();
    let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        &names[..3],
        ["enable and start postgresql", "ensure role ducklake", "ensure database ducklake_catalog"]
    );
    let sql: Vec<String> = plan
        .steps
        .iter()
        .flat_map(|s| &s.actions)
        .filter(|a| matches!(a, Action::Sql { .. }))
        .map(Action::describe)
        .collect();
    assert!(sql.iter().all(|s| !s.starts_with("psql: CREATE")), "got: {sql:?}");
    assert!(sql.iter().any(|s| s.contains("WHERE NOT EXISTS") && s.ends_with("\\gexec")));
}

#[tokio::test]
async fn test_pgdg_source_list_is_read_on_debian() {
    let list = "deb [signed-by=/usr/share/postgresql-common/pgdg/apt.postgresql.org.asc] \
                https://apt.postgresql.org/pub/repos/apt noble-pgdg main\n";
    let shell = fresh_ubuntu().ok("sudo -n cat /etc/apt/sources.list.d/pgdg.list", list);
    let snapshot = gather_facts(&shell, &DeployConfig::default()).await.unwrap();

    assert_eq!(snapshot.platform.codename, "noble");
    assert_eq!(
        snapshot.files.get("/etc/apt/sources.list.d/pgdg.list").map(String::as_str),
        Some(list)
    );
}

#[tokio::test]
async fn test_queries_are_filtered_to_configured_names() {
    let shell = provisioned_ubuntu();
    gather_facts(&shell, &DeployConfig::default()).await.unwrap();

    let queries: Vec<String> = shell
        .calls()
        .iter()
        .filter(|c| c.line().contains("psql"))
        .map(|c| c.stdin_text())
        .collect();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains("rolname = 'ducklake'"));
    assert!(queries[1].contains("datname = 'ducklake_catalog'"));
}

#[tokio::test]
async fn test_oracle_firewalld_state() {
    let snapshot = gather_facts(&fresh_oracle_with_firewalld(), &DeployConfig::default())
        .await
        .unwrap();

    assert_eq!(snapshot.platform.platform, Platform::Rhel);
    assert_eq!(snapshot.platform.os_id, "ol");
    let fw = &snapshot.firewall.firewalld;
    assert!(fw.running);
    assert!(fw.services.contains("ssh"));
    assert!(fw.ports.is_empty());
}

#[tokio::test]
async fn test_unreachable_host_is_reported() {
    let shell = MockShell::new().respond(
        "",
        err_output(255, b"ssh: connect to host 10.0.0.5 port 22: Connection refused"),
    );
    let err = gather_facts(&shell, &DeployConfig::default()).await.unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("cannot reach target"), "got: {message}");
    assert!(message.contains("Connection refused"), "got: {message}");
    assert_eq!(shell.calls().len(), 1);
}

#[tokio::test]
async fn test_password_prompting_sudo_is_rejected() {
    let shell = fresh_ubuntu().respond("sudo -n true", err_output(1, b"sudo: a password is required"));
    let err = gather_facts(&shell, &DeployConfig::default()).await.unwrap_err();
    assert!(err.to_string().contains("passwordless sudo"), "got: {err}");
    // Nothing privileged after the check.
    let lines = shell.lines();
    assert_eq!(lines.last().map(String::as_str), Some("sudo -n true"));
}

#[tokio::test]
async fn test_unsupported_platform_stops_before_sudo() {
    let shell = MockShell::new()
        .ok("cat /etc/os-release", "ID=alpine\nVERSION_ID=3.20.0\n")
        .ok("uname -m", "x86_64\n");
    let err = gather_facts(&shell, &DeployConfig::default()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PlatformError>(),
        Some(PlatformError::Unsupported { .. })
    ));
    assert!(shell.lines().iter().all(|l| !l.starts_with("sudo")));
}
