//! Final hydration and output
//!
//! The last phase of a build. It takes the partitioned first-pass resources
//! from the scratch directory, hydrates them once more with every hash
//! resolved, and delivers them.
//!
//! ## Process
//!
//! 1.  **List**: every file of the pre-build directory, sorted by name.
//!
//! 2.  **Hydrate**: both the file name and the content go through the
//!     hydration engine, so a resource name may itself contain a tag.
//!
//! 3.  **Deliver**: either the output directory is removed, recreated and
//!     filled, or every file is streamed to a writer (standard output) in
//!     name order without touching any directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_yaml::Value;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::hydrate::{hydrate, interpolate};

/// A finished resource file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub content: String,
}

/// Files directly inside `dir`, sorted by name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("Failed to list '{}': {}", dir.display(), e),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Read every pre-build file and hydrate its name and content with `vars`.
/// With `vars` set to `None` the files are taken as they are.
pub fn hydrate_outputs(prebuild: &Path, vars: Option<&Value>) -> Result<Vec<OutputFile>> {
    let mut outputs = Vec::new();
    for path in list_files(prebuild)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = fs::read_to_string(&path)?;
        let file = match vars {
            Some(vars) => OutputFile {
                name: interpolate(&name, vars)?,
                content: hydrate(&content, vars)?,
            },
            None => OutputFile { name, content },
        };
        outputs.push(file);
    }
    outputs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(outputs)
}

/// Replace the content of `dir` with `files`.
pub fn write_dir(files: &[OutputFile], dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| Error::Filesystem {
            message: format!("Failed to clean output directory '{}': {}", dir.display(), e),
        })?;
    }
    fs::create_dir_all(dir).map_err(|e| Error::Filesystem {
        message: format!("Failed to create output directory '{}': {}", dir.display(), e),
    })?;

    for file in files {
        let path = dir.join(&file.name);
        fs::write(&path, &file.content).map_err(|e| Error::Filesystem {
            message: format!("Failed to write file '{}': {}", path.display(), e),
        })?;
        debug!("wrote {}", path.display());
    }
    info!("wrote {} resources to {}", files.len(), dir.display());
    Ok(())
}

/// Stream `files` to `out`, one after the other.
pub fn write_stream(files: &[OutputFile], out: &mut dyn Write) -> Result<()> {
    for file in files {
        out.write_all(file.content.as_bytes())?;
        if !file.content.ends_with('\n') {
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;
    Ok(())
}
