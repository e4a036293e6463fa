//! Versioned model of the target host state the runbook cares about.
//!
//! Planners read a [`HostSnapshot`] and describe changes as [`Effect`]s;
//! [`HostSnapshot::apply`] is the pure transition function.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::firewall::{Chain, FirewallRule, Policy, RuleSet};
use crate::domain::platform::PlatformInfo;
use crate::domain::postgres::{HbaEntry, normalize_locale};

/// A role as stored in `pg_authid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleState {
    pub login: bool,
    /// Stored password verifier, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
}

/// A database as listed in `pg_database`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseState {
    pub owner: String,
    pub encoding: String,
    pub collate: String,
    pub ctype: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresState {
    pub data_initialized: bool,
    /// Whether `roles` and `databases` reflect the server's catalog. False
    /// for an existing cluster whose server was down during fact gathering.
    pub catalog_known: bool,
    pub roles: BTreeMap<String, RoleState>,
    pub databases: BTreeMap<String, DatabaseState>,
    /// Effective `listen_addresses`; `None` when unset or unreadable.
    pub listen_addresses: Option<String>,
    pub hba_entries: Vec<HbaEntry>,
}

/// Permanent firewalld configuration of the default zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewalldState {
    pub running: bool,
    pub services: BTreeSet<String>,
    pub ports: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallState {
    /// In-kernel filter table.
    pub live: RuleSet,
    /// Rules the boot-time restore service would load; `None` if no file.
    pub persisted: Option<RuleSet>,
    pub firewalld: FirewalldState,
}

/// The modeled host state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// Incremented by every applied step.
    #[serde(default)]
    pub version: u64,
    pub platform: PlatformInfo,
    #[serde(default)]
    pub packages: BTreeSet<String>,
    #[serde(default)]
    pub enabled_services: BTreeSet<String>,
    #[serde(default)]
    pub active_services: BTreeSet<String>,
    /// Normalized locale names (`en_US.utf8`).
    #[serde(default)]
    pub locales: BTreeSet<String>,
    #[serde(default)]
    pub postgres: PostgresState,
    #[serde(default)]
    pub firewall: FirewallState,
    /// Contents of small files the runbook manages wholesale.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Whether the package index was refreshed during this run.
    #[serde(default, skip_serializing)]
    pub package_index_refreshed: bool,
    /// Services whose configuration changed and which await a restart.
    #[serde(default, skip_serializing)]
    pub pending_restarts: BTreeSet<String>,
}

/// Semantic state change promised by a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    PackageIndexRefreshed,
    PackagesInstalled { packages: Vec<String> },
    DataDirectoryInitialized,
    ServiceEnabled { service: String },
    ServiceStarted { service: String },
    ServiceRestarted { service: String },
    RestartRequired { service: String },
    LocalePresent { locale: String },
    RoleEnsured { role: String, verifier: String },
    DatabaseEnsured { name: String, state: DatabaseState },
    ListenAddressesSet { value: String },
    HbaEntryPresent { entry: HbaEntry },
    RuleAppended { rule: FirewallRule },
    PolicySet { chain: Chain, policy: Policy },
    RulesPersisted,
    FirewalldRunning,
    FirewalldServiceAllowed { service: String },
    FirewalldPortAllowed { port: String },
    FileWritten { path: String, content: String },
}

impl HostSnapshot {
    /// A snapshot of a host about which nothing but the platform is known.
    #[must_use]
    pub fn new(platform: PlatformInfo) -> Self {
        Self {
            version: 0,
            platform,
            packages: BTreeSet::new(),
            enabled_services: BTreeSet::new(),
            active_services: BTreeSet::new(),
            locales: BTreeSet::new(),
            postgres: PostgresState::default(),
            firewall: FirewallState::default(),
            files: BTreeMap::new(),
            package_index_refreshed: false,
            pending_restarts: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn has_package(&self, name: &str) -> bool {
        self.packages.contains(name)
    }

    #[must_use]
    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains(&normalize_locale(locale))
    }

    #[must_use]
    pub fn is_enabled(&self, service: &str) -> bool {
        self.enabled_services.contains(service)
    }

    #[must_use]
    pub fn is_active(&self, service: &str) -> bool {
        self.active_services.contains(service)
    }

    /// Applies one effect. Does not touch `version`.
    pub fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::PackageIndexRefreshed => self.package_index_refreshed = true,
            Effect::PackagesInstalled { packages } => {
                self.packages.extend(packages.iter().cloned());
            }
            Effect::DataDirectoryInitialized => {
                // A new cluster holds no application roles or databases.
                self.postgres.data_initialized = true;
                self.postgres.catalog_known = true;
            }
            Effect::ServiceEnabled { service } => {
                self.enabled_services.insert(service.clone());
            }
            Effect::ServiceStarted { service } => {
                self.active_services.insert(service.clone());
            }
            Effect::ServiceRestarted { service } => {
                self.active_services.insert(service.clone());
                self.pending_restarts.remove(service);
            }
            Effect::RestartRequired { service } => {
                self.pending_restarts.insert(service.clone());
            }
            Effect::LocalePresent { locale } => {
                self.locales.insert(normalize_locale(locale));
            }
            Effect::RoleEnsured { role, verifier } => {
                self.postgres.roles.insert(
                    role.clone(),
                    RoleState {
                        login: true,
                        verifier: Some(verifier.clone()),
                    },
                );
            }
            Effect::DatabaseEnsured { name, state } => {
                self.postgres.databases.insert(name.clone(), state.clone());
            }
            Effect::ListenAddressesSet { value } => {
                self.postgres.listen_addresses = Some(value.clone());
            }
            Effect::HbaEntryPresent { entry } => {
                if !self.postgres.hba_entries.contains(entry) {
                    self.postgres.hba_entries.push(entry.clone());
                }
            }
            Effect::RuleAppended { rule } => self.firewall.live.append(rule.clone()),
            Effect::PolicySet { chain, policy } => self.firewall.live.set_policy(*chain, *policy),
            Effect::RulesPersisted => self.firewall.persisted = Some(self.firewall.live.clone()),
            Effect::FirewalldRunning => self.firewall.firewalld.running = true,
            Effect::FirewalldServiceAllowed { service } => {
                self.firewall.firewalld.services.insert(service.clone());
            }
            Effect::FirewalldPortAllowed { port } => {
                self.firewall.firewalld.ports.insert(port.clone());
            }
            Effect::FileWritten { path, content } => {
                self.files.insert(path.clone(), content.clone());
            }
        }
    }

    /// Snapshot with run-local bookkeeping cleared, for comparing end states.
    #[must_use]
    pub fn settled(&self) -> Self {
        Self {
            version: 0,
            package_index_refreshed: false,
            pending_restarts: BTreeSet::new(),
            ..self.clone()
        }
    }
}
