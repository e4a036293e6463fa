//! Application service: plan execution.
//!
//! Runs steps in order. A failing best-effort step is reported and skipped;
//! any other failure stops the run with `ExecutionError::PartialApplication`.
//! Nothing is rolled back.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::application::ports::{ProgressReporter, ShellExecutor};
use crate::application::services::facts::{PSQL, SUDO};
use crate::domain::error::ExecutionError;
use crate::domain::plan::{Action, Plan, Step};
use crate::domain::postgres::GEXEC;

/// Outcome of a completed run.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExecutionReport {
    /// Steps that completed, in order.
    pub applied: Vec<String>,
    /// Best-effort steps that failed, with the reason.
    pub warnings: Vec<String>,
    /// Backups written before editing files.
    pub backups: Vec<String>,
}

/// Backup path for `path` edited at `at`.
#[must_use]
pub fn backup_path(path: &str, at: DateTime<Utc>) -> String {
    format!("{path}.{}.bak", at.format("%Y%m%dT%H%M%SZ"))
}

/// Executes `plan` on the target.
///
/// # Errors
///
/// Returns `ExecutionError::PartialApplication` naming the failed step and
/// every step applied before it.
pub async fn execute_plan(
    shell: &impl ShellExecutor,
    plan: &Plan,
    reporter: &impl ProgressReporter,
) -> Result<ExecutionReport, ExecutionError> {
    let started = Utc::now();
    let mut report = ExecutionReport::default();

    for step in &plan.steps {
        reporter.step(&step.name);
        let span = tracing::info_span!("step", step = %step.name, component = %step.component);
        let result = run_step(shell, step, started, &mut report.backups)
            .instrument(span)
            .await;

        match result {
            Ok(()) => {
                tracing::info!(step = %step.name, "applied");
                reporter.success(&step.name);
                report.applied.push(step.name.clone());
            }
            Err(e) if step.best_effort => {
                tracing::warn!(
                    step = %step.name,
                    error = %format!("{e:#}"),
                    "best-effort step failed"
                );
                reporter.warn(&format!("{} failed (continuing): {e:#}", step.name));
                report.warnings.push(format!("{}: {e:#}", step.name));
            }
            Err(e) => {
                tracing::error!(step = %step.name, error = %format!("{e:#}"), "step failed");
                return Err(ExecutionError::PartialApplication {
                    failed_step: step.name.clone(),
                    applied: report.applied,
                    source: e,
                });
            }
        }
    }
    Ok(report)
}

async fn run_step(
    shell: &impl ShellExecutor,
    step: &Step,
    started: DateTime<Utc>,
    backups: &mut Vec<String>,
) -> Result<()> {
    for action in &step.actions {
        tracing::debug!(action = %action.describe(), "running");
        match action {
            Action::Command { argv } => {
                let mut args: Vec<&str> = SUDO.to_vec();
                args.extend(argv.iter().map(String::as_str));
                check(shell.exec(&args).await?, &action.describe())?;
            }
            Action::Sql { statement, .. } => {
                check(
                    shell
                        .exec_with_stdin(&PSQL, psql_input(statement).as_bytes())
                        .await?,
                    &action.describe(),
                )?;
            }
            Action::EditFile { path, edit } => {
                let current = read_existing(shell, path).await?;
                if current.is_none() && !edit.creates_missing() {
                    bail!("{path} does not exist; refusing to create it from scratch");
                }
                let updated = edit.apply(current.as_deref());
                if current.as_deref() == Some(updated.as_str()) {
                    tracing::debug!(path = %path, "file already up to date");
                    continue;
                }
                if current.is_some() {
                    let backup = backup_path(path, started);
                    check(
                        shell
                            .exec(&["sudo", "-n", "cp", "-p", path.as_str(), backup.as_str()])
                            .await?,
                        &format!("back up {path}"),
                    )?;
                    backups.push(backup);
                }
                check(
                    shell
                        .exec_with_stdin(&["sudo", "-n", "tee", path.as_str()], updated.as_bytes())
                        .await?,
                    &format!("write {path}"),
                )?;
            }
        }
    }
    Ok(())
}

/// Script fed to psql for one statement.
fn psql_input(statement: &str) -> String {
    if statement.trim_end().ends_with(GEXEC) {
        format!("{statement}\n")
    } else {
        format!("{statement};\n")
    }
}

/// Contents of `path`, or `None` when `test -e` says it is absent. A file
/// that exists but cannot be read is an error.
async fn read_existing(shell: &impl ShellExecutor, path: &str) -> Result<Option<String>> {
    let exists = shell.exec(&["sudo", "-n", "test", "-e", path]).await?;
    match exists.status.code() {
        Some(0) => {}
        Some(1) => return Ok(None),
        _ => check(exists, &format!("test -e {path}"))?,
    }
    let output = shell.exec(&["sudo", "-n", "cat", path]).await?;
    let what = format!("read {path}");
    let contents = String::from_utf8_lossy(&output.stdout).into_owned();
    check(output, &what)?;
    Ok(Some(contents))
}

fn check(output: std::process::Output, what: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    match output.status.code() {
        Some(code) => bail!("'{what}' exited with {code}: {}", stderr.trim()),
        None => bail!("'{what}' was terminated: {}", stderr.trim()),
    }
}
