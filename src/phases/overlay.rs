//! Overlay passes over the rendered charts
//!
//! The ytt pass always runs when there is anything to overlay: every
//! rendered file goes in as plain YAML (so templating markers inside chart
//! output are left alone), followed by the overlay fragments of every layer.
//! The optional kustomize pass runs afterwards against the kustomization of
//! the most specific layer that has one.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_yaml::{Mapping, Value};

use super::compose::kustomization_file;
use crate::defaults::KUSTOMIZE_BUILD_VARIABLE;
use crate::error::{Error, Result};
use crate::hydrate::hydrate;
use crate::path::relative_to;
use crate::scratch::write_temp_file;
use crate::tools::{run_reported, CommandRunner, ToolCommand};

/// Arguments of the overlay invocation: rendered files first, each marked
/// as plain YAML, then the overlay fragments.
pub fn overlay_args(compiled: &[PathBuf], fragments: &[PathBuf]) -> Vec<String> {
    let mut args = Vec::with_capacity(compiled.len() * 3 + fragments.len() * 2);
    for file in compiled {
        args.push("-f".to_string());
        args.push(file.display().to_string());
        let base = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        args.push(format!("--file-mark={}:type=yaml-plain", base));
    }
    for fragment in fragments {
        args.push("-f".to_string());
        args.push(fragment.display().to_string());
    }
    args
}

/// Arguments of the kustomize invocation.
pub fn kustomize_args(dir: &Path) -> Vec<String> {
    vec![
        "build".to_string(),
        dir.display().to_string(),
        "--load-restrictor=LoadRestrictionsNone".to_string(),
    ]
}

/// Run the overlay tool and store its output as `fully-compiled-*.yaml`.
///
/// With neither rendered files nor fragments the tool is not invoked and
/// the stream is empty.
pub fn run_ytt(
    runner: &dyn CommandRunner,
    ytt: &str,
    compiled: &[PathBuf],
    fragments: &[PathBuf],
    scratch: &Path,
) -> Result<PathBuf> {
    let stdout = if compiled.is_empty() && fragments.is_empty() {
        info!("nothing to overlay, skipping ytt");
        Vec::new()
    } else {
        let command = ToolCommand::new(ytt, overlay_args(compiled, fragments));
        info!("overlaying command={}", command);
        run_reported(runner, &command)?.stdout
    };
    let path = write_temp_file(scratch, "fully-compiled-", ".yaml", &stdout)?;
    debug!("fully compiled output={}", path.display());
    Ok(path)
}

/// Run kustomize in `dir` over the fully compiled stream and store its
/// output as `kustomized-*.yaml`.
///
/// The kustomization is hydrated in place with `vars` plus
/// `beaver.build`, the location of `compiled` relative to `dir`. The
/// original file is put back whatever the outcome.
pub fn run_kustomize(
    runner: &dyn CommandRunner,
    kustomize: &str,
    dir: &Path,
    compiled: &Path,
    vars: &Value,
    scratch: &Path,
) -> Result<PathBuf> {
    let file = kustomization_file(dir).ok_or_else(|| Error::Filesystem {
        message: format!("no kustomization file in {}", dir.display()),
    })?;
    let original = fs::read_to_string(&file)?;
    let _restore = Restore {
        path: &file,
        original: &original,
    };

    let vars = with_build_path(vars, &relative_to(compiled, dir));
    fs::write(&file, hydrate(&original, &vars)?)?;

    let command = ToolCommand::new(kustomize, kustomize_args(dir));
    info!("kustomizing command={}", command);
    let output = run_reported(runner, &command)?;

    let path = write_temp_file(scratch, "kustomized-", ".yaml", &output.stdout)?;
    debug!("kustomized output={}", path.display());
    Ok(path)
}

fn with_build_path(vars: &Value, build: &Path) -> Value {
    let mut extra = Mapping::new();
    extra.insert(
        Value::String("build".to_string()),
        Value::String(build.display().to_string()),
    );

    let mut vars = match vars {
        Value::Mapping(map) => map.clone(),
        _ => Mapping::new(),
    };
    vars.insert(
        Value::String(KUSTOMIZE_BUILD_VARIABLE.to_string()),
        Value::Mapping(extra),
    );
    Value::Mapping(vars)
}

/// Writes the original kustomization back when dropped.
struct Restore<'a> {
    path: &'a Path,
    original: &'a str,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::write(self.path, self.original) {
            warn!("could not restore {}: {}", self.path.display(), e);
        }
    }
}
