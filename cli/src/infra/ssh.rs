//! Infrastructure implementation of the remote execution ports over OpenSSH.
//!
//! `SshTransport<R>` runs every remote command through the local `ssh`
//! client via a `CommandRunner`. Arguments are shell-quoted so they reach
//! the remote program unchanged.

use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, RemoteConnector, ShellExecutor};
use crate::domain::config::SshConfig;
use crate::domain::target::TargetHost;
use crate::infra::command_runner::TokioCommandRunner;

/// Quotes `arg` for a POSIX shell. Plain words pass through.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if plain {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Client options, the `--` separator, then the destination.
#[must_use]
pub fn ssh_args(config: &SshConfig, host: &TargetHost) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=accept-new".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", config.connect_timeout_secs),
        "-p".to_string(),
        config.port.to_string(),
    ];
    if let Some(identity) = &config.identity_file {
        args.push("-i".to_string());
        args.push(identity.display().to_string());
    }
    args.push("--".to_string());
    args.push(match &config.user {
        Some(user) => format!("{user}@{}", host.as_str()),
        None => host.as_str().to_string(),
    });
    args
}

/// A command channel to one target.
pub struct SshTransport<R: CommandRunner> {
    runner: R,
    args: Vec<String>,
}

impl<R: CommandRunner> SshTransport<R> {
    /// Create a transport with an explicit runner.
    pub fn new(runner: R, config: &SshConfig, host: &TargetHost) -> Self {
        Self {
            runner,
            args: ssh_args(config, host),
        }
    }

    fn command_line(&self, args: &[&str]) -> Vec<String> {
        let remote = args
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ");
        let mut full = self.args.clone();
        full.push(remote);
        full
    }
}

impl<R: CommandRunner> ShellExecutor for SshTransport<R> {
    async fn exec(&self, args: &[&str]) -> Result<Output> {
        let full = self.command_line(args);
        let refs: Vec<&str> = full.iter().map(String::as_str).collect();
        tracing::trace!(command = %args.join(" "), "ssh exec");
        self.runner.run("ssh", &refs).await.context("ssh exec")
    }

    async fn exec_with_stdin(&self, args: &[&str], input: &[u8]) -> Result<Output> {
        let full = self.command_line(args);
        let refs: Vec<&str> = full.iter().map(String::as_str).collect();
        tracing::trace!(command = %args.join(" "), bytes = input.len(), "ssh exec with stdin");
        self.runner
            .run_with_stdin("ssh", &refs, input)
            .await
            .context("ssh exec")
    }
}

/// Production `RemoteConnector` using the operator's `ssh` client.
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    #[must_use]
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

impl RemoteConnector for SshConnector {
    type Shell = SshTransport<TokioCommandRunner>;

    fn connect(&self, host: &TargetHost) -> Self::Shell {
        let runner = TokioCommandRunner::new(Duration::from_secs(self.config.command_timeout_secs));
        SshTransport::new(runner, &self.config, host)
    }
}
