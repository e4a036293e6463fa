//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::Result;

use crate::domain::config::DeployConfig;
use crate::domain::target::TargetHost;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
    /// Run a program with stdin piped from `stdin`.
    async fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<Output>;
}

// ── Remote Execution Ports ────────────────────────────────────────────────────

/// Command execution on the target host.
///
/// Arguments are passed as a vector and must reach the remote program
/// unchanged; privilege escalation is the caller's business.
#[allow(async_fn_in_trait)]
pub trait ShellExecutor {
    /// Execute a command on the target and capture output.
    async fn exec(&self, args: &[&str]) -> Result<Output>;
    /// Execute a command on the target with stdin piped from `input`.
    async fn exec_with_stdin(&self, args: &[&str], input: &[u8]) -> Result<Output>;
}

/// Opens a command channel to a resolved target.
pub trait RemoteConnector {
    type Shell: ShellExecutor;

    /// Builds the executor for `host`. No command is issued until the
    /// executor is used.
    fn connect(&self, host: &TargetHost) -> Self::Shell;
}

// ── Operator Environment Port ─────────────────────────────────────────────────

/// Read access to the operator machine: environment variables and the
/// deployment output file.
pub trait OperatorEnvironment {
    /// Value of an environment variable, `None` when unset or not unicode.
    fn var(&self, name: &str) -> Option<String>;
    /// Contents of a local file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable.
    fn read_file(&self, path: &Path) -> Result<String>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait; no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, returning defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<DeployConfig>;
    /// Persist the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &DeployConfig) -> Result<()>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if no location can be determined.
    fn path(&self) -> Result<PathBuf>;
}
