//! Platform detection from `/etc/os-release` and per-family package tooling.
//!
//! Detection happens once per run; every planner then dispatches on the
//! resulting [`Platform`] instead of trying one family's commands and falling
//! back to the other's.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::PlatformError;

const DEBIAN_IDS: &[&str] = &["debian", "ubuntu", "raspbian", "linuxmint", "pop"];
const RHEL_IDS: &[&str] = &["rhel", "centos", "ol", "rocky", "almalinux"];
/// Distributions that resemble a supported family but have no matching
/// PGDG repository layout. Checked on `ID` before `ID_LIKE`.
const UNSUPPORTED_IDS: &[&str] = &["fedora", "amzn"];

/// Linux distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Debian,
    Rhel,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debian => f.write_str("debian"),
            Self::Rhel => f.write_str("rhel"),
        }
    }
}

/// Facts about the operating system of the target host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub platform: Platform,
    /// `ID` from os-release, e.g. `ol`, `ubuntu`.
    pub os_id: String,
    /// Major part of `VERSION_ID`, e.g. `8` or `24`.
    pub major_version: String,
    /// Machine architecture as reported by `uname -m`.
    pub arch: String,
    /// Release codename, e.g. `bookworm` or `noble`. Empty on RHEL hosts.
    #[serde(default)]
    pub codename: String,
}

impl PlatformInfo {
    /// Oracle Linux ships its own EPEL release package.
    #[must_use]
    pub fn is_oracle_linux(&self) -> bool {
        self.os_id == "ol"
    }

    /// Package that enables EPEL on RHEL-family hosts.
    #[must_use]
    pub fn epel_package(&self) -> String {
        if self.is_oracle_linux() {
            format!("oracle-epel-release-el{}", self.major_version)
        } else {
            "epel-release".to_string()
        }
    }

    /// Argument vector installing `packages` non-interactively.
    #[must_use]
    pub fn install_command(&self, packages: &[&str]) -> Vec<String> {
        let mut argv: Vec<String> = match self.platform {
            Platform::Debian => ["env", "DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            Platform::Rhel => ["dnf", "install", "-y"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        };
        argv.extend(packages.iter().map(ToString::to_string));
        argv
    }

    /// Argument vector refreshing the package index, if the family needs it.
    #[must_use]
    pub fn refresh_index_command(&self) -> Option<Vec<String>> {
        match self.platform {
            Platform::Debian => Some(vec!["apt-get".to_string(), "update".to_string()]),
            Platform::Rhel => None,
        }
    }
}

/// Parses os-release `KEY=value` lines, unquoting values.
#[must_use]
pub fn parse_os_release(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Detects the platform from os-release contents and `uname -m` output.
///
/// # Errors
///
/// Returns `PlatformError::MissingOsRelease` for empty input and
/// `PlatformError::Unsupported` when `ID` is a known unsupported
/// distribution or neither `ID` nor `ID_LIKE` names a supported family.
pub fn detect(os_release: &str, arch: &str) -> Result<PlatformInfo, PlatformError> {
    let fields = parse_os_release(os_release);
    let id = fields.get("ID").cloned().ok_or(PlatformError::MissingOsRelease)?;
    let id_like = fields.get("ID_LIKE").cloned().unwrap_or_default();

    if UNSUPPORTED_IDS.contains(&id.as_str()) {
        return Err(PlatformError::Unsupported { id, id_like });
    }

    let candidates = std::iter::once(id.as_str()).chain(id_like.split_whitespace());
    let mut platform = None;
    for candidate in candidates {
        if DEBIAN_IDS.contains(&candidate) {
            platform = Some(Platform::Debian);
            break;
        }
        if RHEL_IDS.contains(&candidate) {
            platform = Some(Platform::Rhel);
            break;
        }
    }
    let platform = platform.ok_or_else(|| PlatformError::Unsupported {
        id: id.clone(),
        id_like: id_like.clone(),
    })?;

    let major_version = fields
        .get("VERSION_ID")
        .and_then(|v| v.split('.').next())
        .unwrap_or_default()
        .to_string();
    let codename = fields
        .get("VERSION_CODENAME")
        .or_else(|| fields.get("UBUNTU_CODENAME"))
        .cloned()
        .unwrap_or_default();

    Ok(PlatformInfo {
        platform,
        os_id: id,
        major_version,
        arch: arch.trim().to_string(),
        codename,
    })
}
