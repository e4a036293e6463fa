//! Property-based tests for planning invariants and text handling.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use ducklake_provision::domain::config::{DeployConfig, FirewallBackend};
use ducklake_provision::domain::firewall::{Chain, Policy};
use ducklake_provision::domain::platform::{Platform, PlatformInfo};
use ducklake_provision::domain::postgres::{HbaEntry, ensure_hba_entry, hba_entries, normalize_locale};
use ducklake_provision::domain::runbook::plan_firewall;
use ducklake_provision::domain::snapshot::HostSnapshot;
use ducklake_provision::infra::ssh::shell_quote;
use proptest::prelude::*;

fn host(platform: Platform) -> HostSnapshot {
    let (os_id, major_version, codename) = match platform {
        Platform::Debian => ("debian", "12", "bookworm"),
        Platform::Rhel => ("rocky", "9", ""),
    };
    HostSnapshot::new(PlatformInfo {
        platform,
        os_id: os_id.to_string(),
        major_version: major_version.to_string(),
        arch: "x86_64".to_string(),
        codename: codename.to_string(),
    })
}

proptest! {
    /// For any SSH port the iptables plan opens it before INPUT drops, and
    /// the predicted rule set still admits it.
    #[test]
    fn prop_firewall_plan_never_locks_out(ssh_port in 1u16..=65535, debian in proptest::bool::ANY) {
        let mut config = DeployConfig::default();
        config.firewall.backend = FirewallBackend::Iptables;
        config.firewall.ssh_port = ssh_port;
        let snapshot = host(if debian { Platform::Debian } else { Platform::Rhel });

        let plan = plan_firewall(&snapshot, &config).unwrap();
        let after = plan.predict(&snapshot);
        prop_assert_eq!(after.firewall.live.policy(Chain::Input), Policy::Drop);
        prop_assert!(after.firewall.live.allows_tcp_in(ssh_port));
    }

    /// Appending an entry is idempotent.
    #[test]
    fn prop_hba_entry_appended_once(
        database in "[a-z_]{1,12}",
        user in "[a-z_]{1,12}",
        octet in 0u8..=255,
        prefix in 0u8..=32,
    ) {
        let line = format!("host {database} {user} 10.{octet}.0.0/{prefix} scram-sha-256");
        let entry = HbaEntry::parse(&line).unwrap();
        let once = ensure_hba_entry("local all postgres peer\n", &entry);
        let twice = ensure_hba_entry(&once, &entry);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(hba_entries(&twice), vec![entry]);
    }

    /// Normalizing a locale twice changes nothing.
    #[test]
    fn prop_normalize_locale_idempotent(lang in "[a-z]{2}_[A-Z]{2}", codeset in "(UTF-8|utf8|UTF8|ISO-8859-1)") {
        let once = normalize_locale(&format!("{lang}.{codeset}"));
        prop_assert_eq!(normalize_locale(&once), once.clone());
    }

    /// Quoted arguments never leave a bare single quote open.
    #[test]
    fn prop_shell_quote_balanced(arg in "[^\\\\]{0,40}") {
        let quoted = shell_quote(&arg);
        let bare_quotes = quoted.replace(r"'\''", "").matches('\'').count();
        prop_assert_eq!(bare_quotes % 2, 0);
    }
}
