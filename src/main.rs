//! # Beaver CLI
//!
//! Binary entry point for the `beaver` command-line tool. It parses the
//! arguments, sets up logging and dispatches to the command implementations;
//! the build logic itself lives in the library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
