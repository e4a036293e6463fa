//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use std::path::Path;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use crate::application::services::executor::ExecutionReport;
use crate::domain::config::DeployConfig;
use crate::domain::plan::Plan;
use crate::domain::runbook::FirewallMode;
use crate::domain::snapshot::HostSnapshot;
use crate::domain::target::{TargetHost, TargetSource};

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Renderer for the active output mode.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn version(&self, version: &str) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_version(version);
                Ok(())
            }
            Self::Json(_) => JsonRenderer::render_version(version),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn target(&self, host: &TargetHost, source: &TargetSource) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_target(host, source);
                Ok(())
            }
            Self::Json(_) => JsonRenderer::render_target(host, source),
        }
    }

    /// Renders a plan. In human mode the report is rendered separately
    /// after execution.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn plan(
        &self,
        host: &TargetHost,
        backend: FirewallMode,
        plan: &Plan,
        report: Option<&ExecutionReport>,
    ) -> Result<()> {
        match self {
            Self::Human(r) => {
                match report {
                    Some(report) => r.render_report(host, report),
                    None => r.render_plan(host, backend, plan),
                }
                Ok(())
            }
            Self::Json(_) => JsonRenderer::render_plan(host, backend, plan, report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn facts(&self, host: &TargetHost, snapshot: &HostSnapshot) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_facts(host, snapshot);
                Ok(())
            }
            Self::Json(_) => JsonRenderer::render_facts(host, snapshot),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn config(&self, config: &DeployConfig, path: &Path) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_config(config, path);
                Ok(())
            }
            Self::Json(_) => JsonRenderer::render_config(config, path),
        }
    }
}
