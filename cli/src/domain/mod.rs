//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod credential;
pub mod error;
pub mod firewall;
pub mod plan;
pub mod platform;
pub mod postgres;
pub mod runbook;
pub mod snapshot;
pub mod target;

pub use config::{DeployConfig, FirewallBackend};
pub use credential::DbPassword;
pub use error::{
    ConfigError, CredentialError, ExecutionError, PlanError, PlatformError, ProvisionError,
    TargetError,
};
pub use plan::{Action, Component, FileEdit, Plan, Step};
pub use platform::{Platform, PlatformInfo};
pub use snapshot::{Effect, HostSnapshot};
pub use target::{TargetHost, TargetSource};
