//! Scratch directory management
//!
//! Every intermediate file of a build (hydrated copies of value files,
//! captured tool output, the pre-build partition) lives in one scratch
//! directory. Files are created with exclusive-create temporary names, so
//! concurrent workers never collide and need no locking.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::TempDir;

use crate::error::{Error, Result};

/// The scratch directory of one build.
#[derive(Debug)]
pub enum Scratch {
    /// Created by the engine under the system temp directory.
    Owned(TempDir),
    /// Supplied by the caller; never removed.
    Provided(PathBuf),
}

impl Scratch {
    /// Use `dir` when given (creating it if needed), otherwise create a
    /// fresh `beaver-*` directory.
    pub fn new(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| Error::Filesystem {
                    message: format!("cannot create scratch directory {}: {}", dir.display(), e),
                })?;
                Ok(Scratch::Provided(dir.to_path_buf()))
            }
            None => {
                let dir = tempfile::Builder::new().prefix("beaver-").tempdir()?;
                debug!("created scratch directory {}", dir.path().display());
                Ok(Scratch::Owned(dir))
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Scratch::Owned(dir) => dir.path(),
            Scratch::Provided(dir) => dir,
        }
    }

    /// Release the scratch directory: an engine-created directory is removed
    /// unless `keep` is set. Returns the path when it is left on disk.
    pub fn finish(self, keep: bool) -> Result<Option<PathBuf>> {
        match self {
            Scratch::Owned(dir) if keep => {
                let path = dir.keep();
                info!("keeping temporary files in {}", path.display());
                Ok(Some(path))
            }
            Scratch::Owned(dir) => {
                let path = dir.path().to_path_buf();
                dir.close()?;
                debug!("removed scratch directory {}", path.display());
                Ok(None)
            }
            Scratch::Provided(path) => Ok(Some(path)),
        }
    }
}

/// Write `contents` to a new file `<prefix>*<suffix>` inside `dir` and keep
/// it on disk.
pub fn write_temp_file(dir: &Path, prefix: &str, suffix: &str, contents: &[u8]) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)?;
    file.write_all(contents)?;
    let (_, path) = file.keep().map_err(|e| Error::Io(e.error))?;
    Ok(path)
}
