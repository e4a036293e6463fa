//! Plan model: ordered steps, their remote actions, and their effects.
//!
//! A plan is built by threading a [`HostSnapshot`] through the planners with
//! [`PlanBuilder`]. It can be replayed against the starting snapshot to
//! predict the end state or to check ordering invariants before anything
//! touches the host.

use std::fmt;

use serde::Serialize;

use crate::domain::error::PlanError;
use crate::domain::firewall::{Chain, Policy};
use crate::domain::postgres::{HbaEntry, enable_locale, ensure_hba_entry, set_listen_addresses};
use crate::domain::snapshot::{Effect, HostSnapshot};

/// Runbook component a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Postgres,
    DatabasePort,
    Firewall,
    Persistence,
    IntrusionPrevention,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::DatabasePort => "database-port",
            Self::Firewall => "firewall",
            Self::Persistence => "persistence",
            Self::IntrusionPrevention => "fail2ban",
        })
    }
}

/// Pure transformation of a remote file's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum FileEdit {
    ListenAddresses { value: String },
    HbaEntry { entry: HbaEntry },
    EnableLocale { locale: String },
    Replace { content: String },
}

impl FileEdit {
    /// New contents given the current ones (`None` if the file is absent).
    #[must_use]
    pub fn apply(&self, current: Option<&str>) -> String {
        let current = current.unwrap_or_default();
        match self {
            Self::ListenAddresses { value } => set_listen_addresses(current, value),
            Self::HbaEntry { entry } => ensure_hba_entry(current, entry),
            Self::EnableLocale { locale } => enable_locale(current, locale),
            Self::Replace { content } => content.clone(),
        }
    }

    /// Whether the edit may create the file. Server configuration edits
    /// refuse to run against a missing file.
    #[must_use]
    pub fn creates_missing(&self) -> bool {
        match self {
            Self::ListenAddresses { .. } | Self::HbaEntry { .. } => false,
            Self::EnableLocale { .. } | Self::Replace { .. } => true,
        }
    }
}

/// One remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Privileged command, given as an argument vector.
    Command { argv: Vec<String> },
    /// Statement run by the database superuser, piped over stdin.
    Sql {
        #[serde(serialize_with = "serialize_sql")]
        statement: String,
        #[serde(skip)]
        sensitive: bool,
    },
    /// Read, edit, back up, and rewrite a file.
    EditFile { path: String, edit: FileEdit },
}

fn serialize_sql<S: serde::Serializer>(statement: &str, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&redact_sql(statement))
}

/// Hides string literals that follow `PASSWORD`.
fn redact_sql(statement: &str) -> String {
    match statement.find(" PASSWORD '") {
        Some(idx) => format!("{} PASSWORD '[REDACTED]'", &statement[..idx]),
        None => statement.to_string(),
    }
}

impl Action {
    #[must_use]
    pub fn command<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Command {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn sql(statement: impl Into<String>) -> Self {
        Self::Sql {
            statement: statement.into(),
            sensitive: false,
        }
    }

    /// SQL whose text must never be printed verbatim.
    #[must_use]
    pub fn sensitive_sql(statement: impl Into<String>) -> Self {
        Self::Sql {
            statement: statement.into(),
            sensitive: true,
        }
    }

    /// Human-readable, secret-free description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Command { argv } => argv.join(" "),
            Self::Sql {
                statement,
                sensitive,
            } => {
                if *sensitive {
                    format!("psql: {}", redact_sql(statement))
                } else {
                    format!("psql: {statement}")
                }
            }
            Self::EditFile { path, edit } => match edit {
                FileEdit::ListenAddresses { value } => {
                    format!("edit {path}: listen_addresses = '{value}'")
                }
                FileEdit::HbaEntry { entry } => format!("edit {path}: append '{entry}'"),
                FileEdit::EnableLocale { locale } => format!("edit {path}: enable {locale}"),
                FileEdit::Replace { .. } => format!("write {path}"),
            },
        }
    }
}

/// A named group of actions with the state change they bring about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub name: String,
    pub component: Component,
    pub actions: Vec<Action>,
    /// Planning-time state changes; may hold verifiers, so never printed.
    #[serde(skip)]
    pub effects: Vec<Effect>,
    /// Failure is reported but does not abort the run.
    pub best_effort: bool,
}

impl Step {
    #[must_use]
    pub fn new(component: Component, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component,
            actions: Vec::new(),
            effects: Vec::new(),
            best_effort: false,
        }
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

/// Ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Replays every effect on a copy of `initial`.
    #[must_use]
    pub fn predict(&self, initial: &HostSnapshot) -> HostSnapshot {
        let mut snapshot = initial.clone();
        for step in &self.steps {
            for effect in &step.effects {
                snapshot.apply(effect);
            }
            snapshot.version += 1;
        }
        snapshot
    }

    /// Checks the self-lockout invariant: INPUT is never set to DROP while no
    /// rule accepts `ssh_port`.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Lockout` naming the first offending step.
    pub fn verify(&self, initial: &HostSnapshot, ssh_port: u16) -> Result<(), PlanError> {
        let mut snapshot = initial.clone();
        for step in &self.steps {
            for effect in &step.effects {
                if let Effect::PolicySet {
                    chain: Chain::Input,
                    policy: Policy::Drop,
                } = effect
                {
                    if !snapshot.firewall.live.allows_tcp_in(ssh_port) {
                        return Err(PlanError::Lockout {
                            step: step.name.clone(),
                            ssh_port,
                        });
                    }
                }
                snapshot.apply(effect);
            }
        }
        Ok(())
    }
}

/// Accumulates steps while keeping the predicted snapshot current.
pub struct PlanBuilder {
    snapshot: HostSnapshot,
    plan: Plan,
}

impl PlanBuilder {
    #[must_use]
    pub fn new(snapshot: HostSnapshot) -> Self {
        Self {
            snapshot,
            plan: Plan::default(),
        }
    }

    /// State as it will be after every step pushed so far.
    #[must_use]
    pub fn snapshot(&self) -> &HostSnapshot {
        &self.snapshot
    }

    /// Appends `step` and applies its effects. Steps without actions are
    /// dropped.
    pub fn push(&mut self, step: Step) {
        if step.actions.is_empty() {
            return;
        }
        for effect in &step.effects {
            self.snapshot.apply(effect);
        }
        self.snapshot.version += 1;
        self.plan.steps.push(step);
    }

    #[must_use]
    pub fn finish(self) -> (Plan, HostSnapshot) {
        (self.plan, self.snapshot)
    }
}
