//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed object on
//! stdout. Failures use the error object from [`format_error`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::services::executor::ExecutionReport;
use crate::domain::config::DeployConfig;
use crate::domain::plan::Plan;
use crate::domain::runbook::FirewallMode;
use crate::domain::snapshot::HostSnapshot;
use crate::domain::target::{TargetHost, TargetSource};

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    target: &'a TargetHost,
    backend: String,
    applied: bool,
    plan: &'a Plan,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ExecutionReport>,
}

/// Renders domain types as JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    fn print(value: &impl Serialize) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("JSON serialization failed")?
        );
        Ok(())
    }

    /// Render the CLI version information.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_version(version: &str) -> Result<()> {
        Self::print(&serde_json::json!({ "version": version }))
    }

    /// Render the resolved target.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_target(host: &TargetHost, source: &TargetSource) -> Result<()> {
        Self::print(&serde_json::json!({ "target": host, "source": source.to_string() }))
    }

    /// Render a plan, with the execution report when it was applied.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_plan(
        host: &TargetHost,
        backend: FirewallMode,
        plan: &Plan,
        report: Option<&ExecutionReport>,
    ) -> Result<()> {
        Self::print(&PlanOutput {
            target: host,
            backend: backend.to_string(),
            applied: report.is_some(),
            plan,
            report,
        })
    }

    /// Render gathered facts.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_facts(host: &TargetHost, snapshot: &HostSnapshot) -> Result<()> {
        Self::print(&serde_json::json!({ "target": host, "facts": snapshot }))
    }

    /// Render the current configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(config: &DeployConfig, path: &Path) -> Result<()> {
        Self::print(&serde_json::json!({ "path": path, "config": config }))
    }
}
