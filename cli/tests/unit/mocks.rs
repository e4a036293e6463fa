//! Shared mock infrastructure for unit tests.
//!
//! [`MockShell`] records every remote command and answers from a table of
//! scripted responses keyed by command prefix. Unmatched commands exit 1.

#![allow(dead_code, clippy::expect_used)]

use std::process::Output;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use ducklake_provision::application::ports::{RemoteConnector, ShellExecutor};
use ducklake_provision::domain::target::TargetHost;

use crate::helpers::{err_output, ok_output};

/// One recorded remote command.
#[derive(Debug, Clone)]
pub struct Call {
    pub argv: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

impl Call {
    pub fn line(&self) -> String {
        self.argv.join(" ")
    }

    pub fn stdin_text(&self) -> String {
        String::from_utf8_lossy(self.stdin.as_deref().unwrap_or_default()).into_owned()
    }
}

struct Rule {
    prefix: String,
    stdin_contains: Option<String>,
    output: Output,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    calls: Vec<Call>,
}

/// Recording `ShellExecutor`. Clones share state.
#[derive(Clone, Default)]
pub struct MockShell {
    state: Arc<Mutex<State>>,
}

impl MockShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose joined argv starts with `prefix`. Later
    /// registrations win.
    pub fn respond(self, prefix: &str, output: Output) -> Self {
        self.push(prefix, None, output)
    }

    /// Like [`respond`](Self::respond), but only when stdin contains
    /// `needle`.
    pub fn respond_stdin(self, prefix: &str, needle: &str, output: Output) -> Self {
        self.push(prefix, Some(needle.to_string()), output)
    }

    fn push(self, prefix: &str, stdin_contains: Option<String>, output: Output) -> Self {
        self.state.lock().expect("lock").rules.push(Rule {
            prefix: prefix.to_string(),
            stdin_contains,
            output,
        });
        self
    }

    /// Shorthand for a successful response with `stdout`.
    pub fn ok(self, prefix: &str, stdout: &str) -> Self {
        self.respond(prefix, ok_output(stdout.as_bytes()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().expect("lock").calls.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(Call::line).collect()
    }

    fn answer(&self, args: &[&str], stdin: Option<&[u8]>) -> Output {
        let mut state = self.state.lock().expect("lock");
        let line = args.join(" ");
        state.calls.push(Call {
            argv: args.iter().map(|a| (*a).to_string()).collect(),
            stdin: stdin.map(<[u8]>::to_vec),
        });
        let input = String::from_utf8_lossy(stdin.unwrap_or_default()).into_owned();
        state
            .rules
            .iter()
            .rev()
            .find(|rule| {
                line.starts_with(rule.prefix.as_str())
                    && rule
                        .stdin_contains
                        .as_ref()
                        .is_none_or(|needle| input.contains(needle.as_str()))
            })
            .map_or_else(|| err_output(1, b""), |rule| rule.output.clone())
    }
}

impl ShellExecutor for MockShell {
    async fn exec(&self, args: &[&str]) -> Result<Output> {
        Ok(self.answer(args, None))
    }

    async fn exec_with_stdin(&self, args: &[&str], input: &[u8]) -> Result<Output> {
        Ok(self.answer(args, Some(input)))
    }
}

/// Hands out clones of one `MockShell` and records each connection.
#[derive(Default)]
pub struct MockConnector {
    pub shell: MockShell,
    pub connections: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(shell: MockShell) -> Self {
        Self {
            shell,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().expect("lock").len()
    }
}

impl RemoteConnector for MockConnector {
    type Shell = MockShell;

    fn connect(&self, host: &TargetHost) -> MockShell {
        self.connections
            .lock()
            .expect("lock")
            .push(host.as_str().to_string());
        self.shell.clone()
    }
}

// ── Canned hosts ─────────────────────────────────────────────────────────────

pub const UBUNTU_OS_RELEASE: &str =
    "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"24.04\"\nVERSION_CODENAME=noble\n";
pub const ORACLE_OS_RELEASE: &str =
    "NAME=\"Oracle Linux Server\"\nID=\"ol\"\nID_LIKE=\"fedora\"\nVERSION_ID=\"9.4\"\n";

/// A fresh Ubuntu host with passwordless sudo and nothing installed.
pub fn fresh_ubuntu() -> MockShell {
    MockShell::new()
        .ok("cat /etc/os-release", UBUNTU_OS_RELEASE)
        .ok("uname -m", "x86_64\n")
        .ok("sudo -n true", "")
        .ok("dpkg-query", "installed openssh-server\ninstalled sudo\n")
        .ok("systemctl list-unit-files", "ssh.service enabled enabled\n")
        .ok("systemctl list-units", "ssh.service loaded active running OpenBSD Secure Shell server\n")
        .ok("locale -a", "C\nC.utf8\nPOSIX\n")
        .ok("sudo -n iptables -S", "-P INPUT ACCEPT\n-P FORWARD ACCEPT\n-P OUTPUT ACCEPT\n")
}

/// A fresh Oracle Linux 9 host with firewalld installed and running.
pub fn fresh_oracle_with_firewalld() -> MockShell {
    MockShell::new()
        .ok("cat /etc/os-release", ORACLE_OS_RELEASE)
        .ok("uname -m", "aarch64\n")
        .ok("sudo -n true", "")
        .ok("rpm -qa", "firewalld\nopenssh-server\n")
        .ok("systemctl list-unit-files", "firewalld.service enabled disabled\nsshd.service enabled disabled\n")
        .ok("systemctl list-units", "firewalld.service loaded active running\nsshd.service loaded active running\n")
        .ok("locale -a", "C\nC.utf8\nen_US.utf8\n")
        .ok("sudo -n firewall-cmd --state", "running\n")
        .ok("sudo -n firewall-cmd --permanent --list-services", "cockpit dhcpv6-client ssh\n")
        .ok("sudo -n firewall-cmd --permanent --list-ports", "\n")
}
