//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// CI Compose - Resolve and merge externally included CI configuration
#[derive(Parser, Debug)]
#[command(name = "ci-compose")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a configuration's includes and print the merged result
    Resolve(commands::resolve::ResolveArgs),
    /// Resolve a configuration and report whether it is valid
    Check(commands::check::CheckArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .init();

        match self.command {
            Commands::Resolve(args) => commands::resolve::execute(args),
            Commands::Check(args) => commands::check::execute(args),
        }
    }
}
