//! Database provisioner: server install, locale, role, database, network
//! settings, client authentication, restart.

use crate::domain::config::PostgresConfig;
use crate::domain::credential::DbPassword;
use crate::domain::error::ProvisionError;
use crate::domain::plan::{Action, Component, FileEdit, PlanBuilder, Step};
use crate::domain::platform::Platform;
use crate::domain::postgres::{
    DatabaseSpec, HbaEntry, LOCALE_GEN, PGDG_APT_KEY_URL, PGDG_APT_KEYRING, PGDG_APT_KEYRING_DIR,
    PGDG_APT_LIST, PGDG_REPO_PACKAGE, PostgresLayout, ensure_role_sql, normalize_locale,
    pgdg_apt_source, pgdg_repo_url, role_password_sql,
};
use crate::domain::runbook::{enable_and_start, install, install_step, restart_if_pending};
use crate::domain::snapshot::{DatabaseState, Effect};

const COMPONENT: Component = Component::Postgres;

/// `listen_addresses` value that accepts remote connections.
pub const LISTEN_ALL: &str = "*";

/// Plans the database server for `config`.
///
/// # Errors
///
/// Returns `ProvisionError::DatabaseMismatch` when the database exists with
/// an encoding or locale that cannot be changed in place, and propagates
/// verifier errors.
pub fn setup_postgres(
    builder: &mut PlanBuilder,
    config: &PostgresConfig,
    password: &DbPassword,
) -> Result<(), ProvisionError> {
    let layout = PostgresLayout::new(builder.snapshot().platform.platform, config.version);

    install_server(builder, &layout);
    ensure_locale(builder, &config.locale);
    ensure_role(builder, &config.role, password)?;
    ensure_database(builder, config)?;
    configure_network(builder, &layout, config);
    restart_if_pending(builder, COMPONENT, &layout.service());
    Ok(())
}

fn install_server(builder: &mut PlanBuilder, layout: &PostgresLayout) {
    let packages = layout.server_packages();
    let service = layout.service();

    if layout.platform == Platform::Debian {
        add_pgdg_apt_repository(builder, &packages);
    }
    if layout.platform == Platform::Rhel {
        let info = builder.snapshot().platform.clone();
        if info.is_oracle_linux() {
            install(builder, COMPONENT, "install EPEL release", &[info.epel_package()]);
        }
        if !builder.snapshot().has_package(PGDG_REPO_PACKAGE) {
            let url = pgdg_repo_url(&info);
            builder.push(
                Step::new(COMPONENT, "install PGDG repository")
                    .action(Action::command(["dnf", "install", "-y", url.as_str()]))
                    .effect(Effect::PackagesInstalled {
                        packages: vec![PGDG_REPO_PACKAGE.to_string()],
                    }),
            );
        }
        if !packages.iter().all(|p| builder.snapshot().has_package(p)) {
            builder.push(
                Step::new(COMPONENT, "disable distribution postgresql module")
                    .action(Action::command(["dnf", "-qy", "module", "disable", "postgresql"]))
                    .best_effort(),
            );
        }
    }

    let name = format!("install PostgreSQL {} server", layout.version);
    if let Some(mut step) = install_step(builder, COMPONENT, &name, &packages) {
        if layout.install_creates_cluster() && !builder.snapshot().postgres.data_initialized {
            step = step.effect(Effect::DataDirectoryInitialized);
        }
        builder.push(step);
    }

    if !builder.snapshot().postgres.data_initialized {
        builder.push(
            Step::new(COMPONENT, "initialize data directory")
                .action(Action::Command {
                    argv: layout.initdb_command(),
                })
                .effect(Effect::DataDirectoryInitialized),
        );
    }

    enable_and_start(builder, COMPONENT, &service);
}

/// Distribution archives carry a single PostgreSQL major version, so the
/// configured one comes from apt.postgresql.org.
fn add_pgdg_apt_repository(builder: &mut PlanBuilder, packages: &[String]) {
    if packages.iter().all(|p| builder.snapshot().has_package(p)) {
        return;
    }
    let Some(source) = pgdg_apt_source(&builder.snapshot().platform) else {
        return;
    };
    if builder.snapshot().files.get(PGDG_APT_LIST) == Some(&source) {
        return;
    }

    install(
        builder,
        COMPONENT,
        "install PGDG repository prerequisites",
        &["curl".to_string(), "ca-certificates".to_string()],
    );
    builder.push(
        Step::new(COMPONENT, "install PGDG apt repository")
            .action(Action::command(["install", "-d", PGDG_APT_KEYRING_DIR]))
            .action(Action::command([
                "curl",
                "-fsSL",
                "-o",
                PGDG_APT_KEYRING,
                PGDG_APT_KEY_URL,
            ]))
            .action(Action::EditFile {
                path: PGDG_APT_LIST.to_string(),
                edit: FileEdit::Replace {
                    content: source.clone(),
                },
            })
            .action(Action::command(["apt-get", "update"]))
            .effect(Effect::FileWritten {
                path: PGDG_APT_LIST.to_string(),
                content: source,
            })
            .effect(Effect::PackageIndexRefreshed),
    );
}

fn ensure_locale(builder: &mut PlanBuilder, locale: &str) {
    if builder.snapshot().has_locale(locale) {
        return;
    }
    let present = Effect::LocalePresent {
        locale: locale.to_string(),
    };
    match builder.snapshot().platform.platform {
        Platform::Debian => {
            // Debian's locale-gen ignores its arguments and compiles what
            // locale.gen lists.
            install(builder, COMPONENT, "install locale support", &["locales".to_string()]);
            builder.push(
                Step::new(COMPONENT, format!("generate locale {locale}"))
                    .action(Action::EditFile {
                        path: LOCALE_GEN.to_string(),
                        edit: FileEdit::EnableLocale {
                            locale: locale.to_string(),
                        },
                    })
                    .action(Action::command(["locale-gen", locale]))
                    .effect(present),
            );
        }
        Platform::Rhel => {
            let lang = locale.split('_').next().unwrap_or(locale);
            let package = format!("glibc-langpack-{lang}");
            let argv = builder.snapshot().platform.install_command(&[package.as_str()]);
            builder.push(
                Step::new(COMPONENT, format!("install locale {locale}"))
                    .action(Action::Command { argv })
                    .effect(Effect::PackagesInstalled {
                        packages: vec![package],
                    })
                    .effect(present),
            );
        }
    }
}

fn ensure_role(
    builder: &mut PlanBuilder,
    role: &str,
    password: &DbPassword,
) -> Result<(), ProvisionError> {
    let snapshot = builder.snapshot();
    if !snapshot.postgres.catalog_known && !snapshot.postgres.roles.contains_key(role) {
        return ensure_role_unseen(builder, role, password);
    }
    let create = match builder.snapshot().postgres.roles.get(role) {
        None => true,
        Some(state) => {
            let current = state.login
                && state
                    .verifier
                    .as_deref()
                    .is_some_and(|stored| password.matches(stored));
            if current {
                return Ok(());
            }
            false
        }
    };

    let verifier = password.verifier()?.to_string();
    let name = if create {
        format!("create role {role}")
    } else {
        format!("update password of role {role}")
    };
    builder.push(
        Step::new(COMPONENT, name)
            .action(Action::sensitive_sql(role_password_sql(role, &verifier, create)))
            .effect(Effect::RoleEnsured {
                role: role.to_string(),
                verifier,
            }),
    );
    Ok(())
}

/// Role step for a cluster whose catalog could not be read: the statement
/// decides between create and alter on the server.
fn ensure_role_unseen(
    builder: &mut PlanBuilder,
    role: &str,
    password: &DbPassword,
) -> Result<(), ProvisionError> {
    let verifier = password.verifier()?.to_string();
    builder.push(
        Step::new(COMPONENT, format!("ensure role {role}"))
            .action(Action::sensitive_sql(ensure_role_sql(role, &verifier)))
            .effect(Effect::RoleEnsured {
                role: role.to_string(),
                verifier,
            }),
    );
    Ok(())
}

fn ensure_database(builder: &mut PlanBuilder, config: &PostgresConfig) -> Result<(), ProvisionError> {
    let spec = DatabaseSpec {
        name: config.database.clone(),
        owner: config.role.clone(),
        encoding: config.encoding.clone(),
        collate: config.locale.clone(),
        ctype: config.locale.clone(),
    };
    let wanted = DatabaseState {
        owner: spec.owner.clone(),
        encoding: spec.encoding.clone(),
        collate: spec.collate.clone(),
        ctype: spec.ctype.clone(),
    };

    let Some(existing) = builder.snapshot().postgres.databases.get(&spec.name).cloned() else {
        if !builder.snapshot().postgres.catalog_known {
            // Encoding and locale of an existing database are checked on the
            // next run, once the server is up.
            builder.push(
                Step::new(COMPONENT, format!("ensure database {}", spec.name))
                    .action(Action::sql(spec.create_if_missing_sql()))
                    .action(Action::sql(spec.alter_owner_sql()))
                    .effect(Effect::DatabaseEnsured {
                        name: spec.name.clone(),
                        state: wanted,
                    }),
            );
            return Ok(());
        }
        builder.push(
            Step::new(COMPONENT, format!("create database {}", spec.name))
                .action(Action::sql(spec.create_sql()))
                .effect(Effect::DatabaseEnsured {
                    name: spec.name.clone(),
                    state: wanted,
                }),
        );
        return Ok(());
    };

    let mismatch = |field: &'static str, actual: &str, expected: &str| {
        ProvisionError::DatabaseMismatch {
            database: spec.name.clone(),
            field,
            actual: actual.to_string(),
            expected: expected.to_string(),
        }
    };
    if !existing.encoding.eq_ignore_ascii_case(&spec.encoding) {
        return Err(mismatch("encoding", &existing.encoding, &spec.encoding));
    }
    if normalize_locale(&existing.collate) != normalize_locale(&spec.collate) {
        return Err(mismatch("LC_COLLATE", &existing.collate, &spec.collate));
    }
    if normalize_locale(&existing.ctype) != normalize_locale(&spec.ctype) {
        return Err(mismatch("LC_CTYPE", &existing.ctype, &spec.ctype));
    }

    if existing.owner != spec.owner {
        builder.push(
            Step::new(COMPONENT, format!("change owner of database {}", spec.name))
                .action(Action::sql(spec.alter_owner_sql()))
                .effect(Effect::DatabaseEnsured {
                    name: spec.name.clone(),
                    state: DatabaseState {
                        owner: spec.owner.clone(),
                        ..existing
                    },
                }),
        );
    }
    Ok(())
}

fn configure_network(builder: &mut PlanBuilder, layout: &PostgresLayout, config: &PostgresConfig) {
    let service = layout.service();

    if builder.snapshot().postgres.listen_addresses.as_deref() != Some(LISTEN_ALL) {
        builder.push(
            Step::new(COMPONENT, "listen on all addresses")
                .action(Action::EditFile {
                    path: layout.postgresql_conf(),
                    edit: FileEdit::ListenAddresses {
                        value: LISTEN_ALL.to_string(),
                    },
                })
                .effect(Effect::ListenAddressesSet {
                    value: LISTEN_ALL.to_string(),
                })
                .effect(Effect::RestartRequired {
                    service: service.clone(),
                }),
        );
    }

    let entry = HbaEntry {
        database: config.database.clone(),
        user: config.role.clone(),
        address: config.allowed_cidr.clone(),
        method: config.auth_method.clone(),
    };
    if !builder.snapshot().postgres.hba_entries.contains(&entry) {
        builder.push(
            Step::new(COMPONENT, "allow remote catalog connections")
                .action(Action::EditFile {
                    path: layout.hba_conf(),
                    edit: FileEdit::HbaEntry {
                        entry: entry.clone(),
                    },
                })
                .effect(Effect::HbaEntryPresent { entry })
                .effect(Effect::RestartRequired { service }),
        );
    }
}
