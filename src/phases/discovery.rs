//! Layer discovery
//!
//! This is the first phase of a build. It walks the directory-based
//! inheritance graph starting at the requested directory and returns the
//! layers to merge, most general ancestor first.
//!
//! ## Process
//!
//! 1.  **Breadth-first walk**: every directory's `beaver.yaml` names its
//!     parents (`inherits` entries, then `inherit`), resolved relative to
//!     that directory. Parents of one level are visited before their own
//!     parents.
//!
//! 2.  **Missing configurations**: the requested directory must hold a
//!     configuration. An ancestor without one is skipped.
//!
//! 3.  **Cycle detection**: reaching a directory a second time aborts the
//!     walk with the list of visited directories, so a loop of any length
//!     (including a directory inheriting itself) fails instead of spinning.
//!
//! 4.  **Version control**: each layer pinning `beaverversion` is checked
//!     against the running engine as soon as it is loaded.
//!
//! The collected layers are reversed before returning so that merging them
//! in order lets specific layers override general ones.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::{self, ParsedConfig};
use crate::error::{Error, Result};
use crate::path::normalize;
use crate::version::control_versions;

/// One directory contributing a configuration to the build.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Absolute, normalized directory of the layer.
    pub dir: PathBuf,
    pub config: ParsedConfig,
}

/// Resolve the layers of the build rooted at `start`.
///
/// `engine_version` is the running engine's version; layers pinning a
/// different `beaverversion` are rejected. Pass `None` to skip the check.
pub fn resolve_layers(start: &Path, engine_version: Option<&str>) -> Result<Vec<Layer>> {
    let start = normalize(&std::path::absolute(start)?);

    let mut visited: Vec<PathBuf> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut layers = Vec::new();
    let mut frontier = vec![start.clone()];

    while !frontier.is_empty() {
        let mut next_level = Vec::new();

        for dir in frontier {
            if !seen.insert(dir.clone()) {
                return Err(cycle_error(&visited, &dir));
            }
            visited.push(dir.clone());

            let Some(config) = config::load(&dir)? else {
                if dir == start {
                    return Err(Error::ConfigNotFound {
                        dir: dir.display().to_string(),
                    });
                }
                debug!("no configuration in {}, skipping", dir.display());
                continue;
            };

            if let (Some(desired), Some(actual)) = (config.beaver_version.as_deref(), engine_version)
            {
                control_versions(desired, actual)?;
            }

            next_level.extend(config.parents(&dir));
            debug!("loaded layer {}", dir.display());
            layers.push(Layer { dir, config });
        }

        frontier = next_level;
    }

    layers.reverse();
    Ok(layers)
}

fn cycle_error(visited: &[PathBuf], offending: &Path) -> Error {
    let cycle = visited
        .iter()
        .map(|p| p.display().to_string())
        .chain(std::iter::once(offending.display().to_string()))
        .collect::<Vec<_>>()
        .join(" -> ");
    Error::CycleDetected {
        cycle: format!("dirs {}", cycle),
    }
}
