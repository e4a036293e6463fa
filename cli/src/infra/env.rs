//! Operator-side environment and snapshot files.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::OperatorEnvironment;
use crate::domain::snapshot::HostSnapshot;

/// Production `OperatorEnvironment` reading the process environment and the
/// local filesystem.
pub struct ProcessEnvironment;

impl OperatorEnvironment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
    }
}

/// Reads a snapshot written by `facts --output`.
///
/// # Errors
///
/// Returns an error if the file is unreadable or not a snapshot.
pub fn read_snapshot(path: &Path) -> Result<HostSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
}

/// Writes `snapshot` as pretty JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_snapshot(path: &Path, snapshot: &HostSnapshot) -> Result<()> {
    let content = serde_json::to_string_pretty(snapshot).context("cannot serialize snapshot")?;
    std::fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))
}
