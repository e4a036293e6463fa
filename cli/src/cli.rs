//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::application::services::provision::Procedure;
use crate::commands;

/// Provision a PostgreSQL host as a DuckLake catalog over SSH
#[derive(Parser)]
#[command(
    name = "ducklake-provision",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file (default: $DUCKLAKE_CONFIG or ~/.config/ducklake/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Log progress at info level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install PostgreSQL, lock down the firewall, and enable fail2ban
    Deploy(commands::deploy::ApplyArgs),

    /// Configure and persist the firewall only
    Firewall(commands::deploy::ApplyArgs),

    /// Show what deploy would change without changing anything
    Plan(commands::plan::PlanArgs),

    /// Gather and print the host snapshot
    Facts(commands::facts::FactsArgs),

    /// Resolve and print the target address
    Target(commands::TargetArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            config,
            json,
            quiet,
            no_color,
            yes,
            verbose: _,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes, config },
        });

        match command {
            Command::Deploy(args) => commands::deploy::run(&app, &args, Procedure::Deploy).await,
            Command::Firewall(args) => {
                commands::deploy::run(&app, &args, Procedure::Firewall).await
            }
            Command::Plan(args) => commands::plan::run(&app, &args).await,
            Command::Facts(args) => commands::facts::run(&app, &args).await,
            Command::Target(args) => commands::target::run(&app, &args),
            Command::Config(cmd) => commands::config::run(&app, &cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
