//! PostgreSQL layout per platform, configuration-file editing, and SQL text.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::platform::{Platform, PlatformInfo};

/// Where a PostgreSQL major version lives on a given platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostgresLayout {
    pub platform: Platform,
    pub version: u32,
}

impl PostgresLayout {
    #[must_use]
    pub fn new(platform: Platform, version: u32) -> Self {
        Self { platform, version }
    }

    /// Server packages to install.
    #[must_use]
    pub fn server_packages(&self) -> Vec<String> {
        match self.platform {
            Platform::Rhel => vec![
                format!("postgresql{}-server", self.version),
                format!("postgresql{}", self.version),
            ],
            Platform::Debian => vec![format!("postgresql-{}", self.version)],
        }
    }

    /// systemd unit name.
    #[must_use]
    pub fn service(&self) -> String {
        match self.platform {
            Platform::Rhel => format!("postgresql-{}", self.version),
            Platform::Debian => "postgresql".to_string(),
        }
    }

    #[must_use]
    pub fn config_dir(&self) -> String {
        match self.platform {
            Platform::Rhel => format!("/var/lib/pgsql/{}/data", self.version),
            Platform::Debian => format!("/etc/postgresql/{}/main", self.version),
        }
    }

    #[must_use]
    pub fn postgresql_conf(&self) -> String {
        format!("{}/postgresql.conf", self.config_dir())
    }

    #[must_use]
    pub fn hba_conf(&self) -> String {
        format!("{}/pg_hba.conf", self.config_dir())
    }

    /// File whose presence marks an initialized data directory.
    #[must_use]
    pub fn version_marker(&self) -> String {
        match self.platform {
            Platform::Rhel => format!("/var/lib/pgsql/{}/data/PG_VERSION", self.version),
            Platform::Debian => format!("/var/lib/postgresql/{}/main/PG_VERSION", self.version),
        }
    }

    /// Cluster initialization. Debian packaging already creates the `main`
    /// cluster on install; `pg_createcluster` only recovers a removed one.
    #[must_use]
    pub fn initdb_command(&self) -> Vec<String> {
        match self.platform {
            Platform::Rhel => vec![
                format!("/usr/pgsql-{v}/bin/postgresql-{v}-setup", v = self.version),
                "initdb".to_string(),
            ],
            Platform::Debian => vec![
                "pg_createcluster".to_string(),
                self.version.to_string(),
                "main".to_string(),
            ],
        }
    }

    /// Whether installing the server packages also initializes the cluster.
    #[must_use]
    pub fn install_creates_cluster(&self) -> bool {
        self.platform == Platform::Debian
    }
}

/// PGDG repository RPM for the host's EL release and architecture.
#[must_use]
pub fn pgdg_repo_url(info: &PlatformInfo) -> String {
    format!(
        "https://download.postgresql.org/pub/repos/yum/reporpms/EL-{}-{}/pgdg-redhat-repo-latest.noarch.rpm",
        info.major_version, info.arch
    )
}

/// Package installed by the PGDG repository RPM.
pub const PGDG_REPO_PACKAGE: &str = "pgdg-redhat-repo";

/// Signing key of apt.postgresql.org.
pub const PGDG_APT_KEY_URL: &str = "https://www.postgresql.org/media/keys/ACCC4CF8.asc";
pub const PGDG_APT_KEYRING_DIR: &str = "/usr/share/postgresql-common/pgdg";
pub const PGDG_APT_KEYRING: &str = "/usr/share/postgresql-common/pgdg/apt.postgresql.org.asc";
pub const PGDG_APT_LIST: &str = "/etc/apt/sources.list.d/pgdg.list";

/// `sources.list` entry for apt.postgresql.org, or `None` when the host
/// reports no release codename.
#[must_use]
pub fn pgdg_apt_source(info: &PlatformInfo) -> Option<String> {
    if info.codename.is_empty() {
        return None;
    }
    Some(format!(
        "deb [signed-by={PGDG_APT_KEYRING}] https://apt.postgresql.org/pub/repos/apt {}-pgdg main\n",
        info.codename
    ))
}

// ── /etc/locale.gen ──────────────────────────────────────────────────────────

/// File listing the locales `locale-gen` compiles on Debian-family hosts.
pub const LOCALE_GEN: &str = "/etc/locale.gen";

/// `locale.gen` line for `locale`, e.g. `en_US.UTF-8 UTF-8`.
fn locale_gen_line(locale: &str) -> String {
    let charset = locale.split_once('.').map_or("ISO-8859-1", |(_, codeset)| codeset);
    format!("{locale} {charset}")
}

fn locale_gen_name(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

/// Returns `contents` with `locale` enabled: an active entry is kept, the
/// first commented entry is uncommented, otherwise a new entry is appended.
#[must_use]
pub fn enable_locale(contents: &str, locale: &str) -> String {
    let wanted = normalize_locale(locale);
    let matches = |line: &str| locale_gen_name(line).is_some_and(|name| normalize_locale(name) == wanted);

    if contents
        .lines()
        .any(|l| !l.trim_start().starts_with('#') && matches(l))
    {
        return contents.to_string();
    }

    let mut uncommented = false;
    let mut lines: Vec<String> = contents
        .lines()
        .map(|line| {
            let body = line.trim_start().strip_prefix('#').map(str::trim_start);
            match body {
                Some(entry) if !uncommented && matches(entry) => {
                    uncommented = true;
                    entry.to_string()
                }
                _ => line.to_string(),
            }
        })
        .collect();
    if !uncommented {
        lines.push(locale_gen_line(locale));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

// ── postgresql.conf ──────────────────────────────────────────────────────────

const LISTEN_KEY: &str = "listen_addresses";

/// Splits `key = value  # comment` into `(key, value)` for active lines.
fn setting(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let (key, rest) = line.split_once('=')?;
    let value = rest.split('#').next().unwrap_or_default().trim();
    Some((key.trim(), value.trim_matches('\'')))
}

fn is_commented_setting(line: &str, key: &str) -> bool {
    line.trim()
        .strip_prefix('#')
        .and_then(|rest| rest.split_once('='))
        .is_some_and(|(k, _)| k.trim() == key)
}

/// Effective `listen_addresses` value (last active line wins).
#[must_use]
pub fn listen_addresses(conf: &str) -> Option<String> {
    conf.lines()
        .filter_map(setting)
        .filter(|(k, _)| *k == LISTEN_KEY)
        .last()
        .map(|(_, v)| v.to_string())
}

/// Returns `conf` with `listen_addresses` set to `value`.
///
/// Active lines are rewritten in place; otherwise the first commented
/// template line is replaced; otherwise the setting is appended.
#[must_use]
pub fn set_listen_addresses(conf: &str, value: &str) -> String {
    let wanted = format!("{LISTEN_KEY} = '{value}'");
    let has_active = conf
        .lines()
        .any(|l| setting(l).is_some_and(|(k, _)| k == LISTEN_KEY));

    let mut replaced_comment = false;
    let mut lines: Vec<String> = conf
        .lines()
        .map(|line| {
            let active = setting(line).is_some_and(|(k, _)| k == LISTEN_KEY);
            if active || (!has_active && !replaced_comment && is_commented_setting(line, LISTEN_KEY))
            {
                if !active {
                    replaced_comment = true;
                }
                wanted.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !has_active && !replaced_comment {
        lines.push(wanted);
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

// ── pg_hba.conf ──────────────────────────────────────────────────────────────

/// A `host` client-authentication entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HbaEntry {
    pub database: String,
    pub user: String,
    pub address: String,
    pub method: String,
}

impl HbaEntry {
    /// Parses a `host ...` line; other connection types and comments yield `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.split('#').next()?.trim();
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["host", database, user, address, method, ..] => Some(Self {
                database: (*database).to_string(),
                user: (*user).to_string(),
                address: (*address).to_string(),
                method: (*method).to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for HbaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host    {:<24} {:<16} {:<18} {}",
            self.database, self.user, self.address, self.method
        )
    }
}

/// All `host` entries of a `pg_hba.conf`.
#[must_use]
pub fn hba_entries(conf: &str) -> Vec<HbaEntry> {
    conf.lines().filter_map(HbaEntry::parse).collect()
}

/// Returns `conf` with `entry` appended unless an equal entry exists.
#[must_use]
pub fn ensure_hba_entry(conf: &str, entry: &HbaEntry) -> String {
    if hba_entries(conf).contains(entry) {
        return conf.to_string();
    }
    let mut out = conf.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&entry.to_string());
    out.push('\n');
    out
}

// ── SQL ──────────────────────────────────────────────────────────────────────

/// Quotes an SQL identifier.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes an SQL string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Requested properties of the application database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub name: String,
    pub owner: String,
    pub encoding: String,
    pub collate: String,
    pub ctype: String,
}

impl DatabaseSpec {
    #[must_use]
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE DATABASE {} OWNER {} TEMPLATE template0 ENCODING {} LC_COLLATE {} LC_CTYPE {}",
            quote_ident(&self.name),
            quote_ident(&self.owner),
            quote_literal(&self.encoding),
            quote_literal(&self.collate),
            quote_literal(&self.ctype),
        )
    }

    /// `CREATE DATABASE` that is skipped when the database exists. Runs
    /// through psql's `\gexec` since `CREATE DATABASE` cannot run inside a
    /// `DO` block.
    #[must_use]
    pub fn create_if_missing_sql(&self) -> String {
        format!(
            "SELECT {} WHERE NOT EXISTS (SELECT FROM pg_catalog.pg_database WHERE datname = {}){GEXEC}",
            quote_literal(&self.create_sql()),
            quote_literal(&self.name),
        )
    }

    #[must_use]
    pub fn alter_owner_sql(&self) -> String {
        format!(
            "ALTER DATABASE {} OWNER TO {}",
            quote_ident(&self.name),
            quote_ident(&self.owner)
        )
    }
}

/// `CREATE ROLE` or `ALTER ROLE` statement carrying a pre-hashed password.
#[must_use]
pub fn role_password_sql(role: &str, verifier: &str, create: bool) -> String {
    let verb = if create { "CREATE" } else { "ALTER" };
    format!(
        "{verb} ROLE {} WITH LOGIN PASSWORD {}",
        quote_ident(role),
        quote_literal(verifier)
    )
}

/// Creates the role or resets its password, whichever applies when the
/// server runs the statement.
#[must_use]
pub fn ensure_role_sql(role: &str, verifier: &str) -> String {
    format!(
        "DO $ensure$ BEGIN IF EXISTS (SELECT FROM pg_catalog.pg_roles WHERE rolname = {}) \
         THEN {}; ELSE {}; END IF; END $ensure$",
        quote_literal(role),
        role_password_sql(role, verifier, false),
        role_password_sql(role, verifier, true),
    )
}

/// psql meta-command that runs each result cell as a statement. A statement
/// ending with it must not get a trailing `;`.
pub const GEXEC: &str = "\\gexec";

/// Normalizes a locale name the way `locale -a` prints it (`en_US.utf8`).
#[must_use]
pub fn normalize_locale(locale: &str) -> String {
    match locale.split_once('.') {
        Some((lang, codeset)) => {
            let codeset: String = codeset
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase();
            format!("{lang}.{codeset}")
        }
        None => locale.to_string(),
    }
}
