//! ducklake-provision - PostgreSQL catalog hosts for DuckLake

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ducklake_provision::cli::Cli;
use ducklake_provision::output::json::format_error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let json = cli.json;
    if let Err(e) = cli.run().await {
        tracing::debug!(error = ?e, "command failed");
        match json.then(|| format_error(&format!("{e:#}"), error_code(&e))) {
            Some(Ok(obj)) => println!("{obj}"),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

/// Stable code for the JSON error object.
fn error_code(e: &anyhow::Error) -> &'static str {
    use ducklake_provision::domain::error::{
        ConfigError, CredentialError, ExecutionError, PlanError, PlatformError, ProvisionError,
        TargetError,
    };
    if e.downcast_ref::<TargetError>().is_some() {
        "target"
    } else if e.downcast_ref::<CredentialError>().is_some() {
        "credential"
    } else if e.downcast_ref::<PlatformError>().is_some() {
        "platform"
    } else if e.downcast_ref::<ProvisionError>().is_some() {
        "provision"
    } else if e.downcast_ref::<PlanError>().is_some() {
        "lockout"
    } else if e.downcast_ref::<ExecutionError>().is_some() {
        "partial_application"
    } else if e.downcast_ref::<ConfigError>().is_some() {
        "config"
    } else {
        "error"
    }
}
