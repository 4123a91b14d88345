//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Beaver - Build Kubernetes manifests from layered configuration
#[derive(Parser, Debug)]
#[command(name = "beaver")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Log filter (error, warn, info, debug, trace or env_logger directives)
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        env = "BEAVER_LOG",
        default_value = "info"
    )]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the manifests of a configuration directory
    Build(commands::build::BuildArgs),

    /// Print the engine version
    Version(commands::version::VersionArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Build(args) => commands::build::execute(args),
            Commands::Version(args) => commands::version::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

fn init_logging(filters: &str) {
    // stdout carries manifests when streaming, so logs go to stderr
    let _ = env_logger::Builder::new()
        .parse_filters(filters)
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .try_init();
}
