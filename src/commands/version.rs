//! # Version Command Implementation
//!
//! Prints the engine version. Configurations pinning `beaverversion` must
//! match it exactly.

use anyhow::Result;
use clap::Args;

use beaver::version::engine_version;

/// Print the engine version
#[derive(Args, Debug)]
pub struct VersionArgs {}

/// The line printed by `beaver version`.
pub fn version_line() -> String {
    format!("beaver {}", engine_version())
}

/// Execute the `version` command.
pub fn execute(_args: VersionArgs) -> Result<()> {
    println!("{}", version_line());
    Ok(())
}
