//! `ducklake-provision target`: resolve and print the target address.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::target::resolve_target;
use crate::commands::{TargetArgs, load_config};
use crate::infra::env::ProcessEnvironment;

/// Run `ducklake-provision target`.
///
/// # Errors
///
/// Returns an error if no target can be resolved.
pub fn run(app: &AppContext, args: &TargetArgs) -> Result<()> {
    let config = load_config(app, args)?;
    let (host, source) = resolve_target(&ProcessEnvironment, &args.request(), &config.target)?;
    app.renderer().target(&host, &source)
}
