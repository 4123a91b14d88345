//! Engine version control
//!
//! A layer may pin the engine version it was written for with
//! `beaverversion`. The pin must match the running engine exactly; range
//! compatibility is deliberately not offered.

use semver::Version;

use crate::error::{Error, Result};

/// The version of the running engine.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Parse a version leniently.
///
/// Accepts an optional leading `v` and missing minor/patch components, so
/// `v1`, `1.2` and `1.2.0` are all understood.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);

    // Pad the numeric core only; pre-release and build suffixes stay intact.
    let split_at = stripped.find(['-', '+']).unwrap_or(stripped.len());
    let (core, suffix) = stripped.split_at(split_at);
    let padded = match core.matches('.').count() {
        0 if !core.is_empty() => format!("{}.0.0{}", core, suffix),
        1 => format!("{}.0{}", core, suffix),
        _ => stripped.to_string(),
    };

    Ok(Version::parse(&padded)?)
}

/// Require `desired` and `actual` to be the same version.
pub fn control_versions(desired: &str, actual: &str) -> Result<()> {
    let wanted = parse_version(desired)?;
    let running = parse_version(actual)?;
    if wanted != running {
        return Err(Error::VersionMismatch {
            desired: wanted.to_string(),
            actual: running.to_string(),
        });
    }
    Ok(())
}
