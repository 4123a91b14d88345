//! Chart and resource rendering
//!
//! Turns the merged configuration into tool invocations and runs them.
//!
//! ## Process
//!
//! 1.  **Plan**: every enabled helm chart becomes
//!     `helm template <release> <path> --namespace <ns> (-f <values>)*`,
//!     every enabled ytt chart becomes `ytt -f <path> (-f <values>)*` and
//!     every resource-creation declaration becomes
//!     `kubectl -n <ns> create <type> <name> --dry-run=client -o yaml (<flag> <value>)*`
//!     run from the directory of the layer that declared it.
//!
//! 2.  **Render**: the jobs run in parallel, one per command. Each job
//!     writes the captured standard output to its own `compiled-<job>-*.yaml`
//!     file in the scratch directory. The first failure aborts the render and
//!     the results of the other jobs are dropped.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};
use rayon::prelude::*;

use super::compose::{BuildConfig, ChartSpec, CreateKey, CreateSpec};
use crate::config::ChartType;
use crate::error::{Error, Result};
use crate::scratch::write_temp_file;
use crate::tools::{run_reported, CommandRunner, ToolCommand, Tools};

/// One independent render command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// Chart key, or `<type>-<name>` for a resource creation.
    pub name: String,
    pub command: ToolCommand,
}

/// Arguments of a `helm template` invocation.
pub fn helm_args(release: &str, path: &Path, namespace: &str, value_files: &[PathBuf]) -> Vec<String> {
    let mut args = vec![
        "template".to_string(),
        release.to_string(),
        path.display().to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
    ];
    push_files(&mut args, value_files);
    args
}

/// Arguments of a ytt chart invocation.
pub fn ytt_chart_args(path: &Path, value_files: &[PathBuf]) -> Vec<String> {
    let mut args = vec!["-f".to_string(), path.display().to_string()];
    push_files(&mut args, value_files);
    args
}

/// Arguments of a `kubectl create` invocation.
///
/// An argument with an empty value contributes only its flag.
pub fn create_args(namespace: &str, key: &CreateKey, spec: &CreateSpec) -> Vec<String> {
    let mut args: Vec<String> = [
        "-n",
        namespace,
        "create",
        key.kind.as_str(),
        key.name.as_str(),
        "--dry-run=client",
        "-o",
        "yaml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for arg in &spec.args {
        args.push(arg.flag.clone());
        if !arg.value.is_empty() {
            args.push(arg.value.clone());
        }
    }
    args
}

fn push_files(args: &mut Vec<String>, files: &[PathBuf]) {
    for file in files {
        args.push("-f".to_string());
        args.push(file.display().to_string());
    }
}

/// Build the render jobs for every enabled chart and every resource
/// creation, charts first.
pub fn plan(config: &BuildConfig, tools: &Tools) -> Result<Vec<RenderJob>> {
    let mut jobs = Vec::new();

    for (key, chart) in config.enabled_charts()? {
        jobs.push(RenderJob {
            name: key.to_string(),
            command: chart_command(config, tools, key, chart),
        });
    }

    for (key, spec) in &config.creates {
        jobs.push(RenderJob {
            name: format!("{}-{}", key.kind, key.name),
            command: ToolCommand::new(&tools.kubectl, create_args(&config.namespace, key, spec))
                .in_dir(&spec.dir),
        });
    }

    debug!("planned {} render jobs", jobs.len());
    Ok(jobs)
}

fn chart_command(config: &BuildConfig, tools: &Tools, key: &str, chart: &ChartSpec) -> ToolCommand {
    match chart.chart_type {
        ChartType::Helm => {
            let namespace = if chart.namespace.is_empty() {
                &config.namespace
            } else {
                &chart.namespace
            };
            ToolCommand::new(
                &tools.helm,
                helm_args(chart.release_name(key), &chart.path, namespace, &chart.value_files),
            )
        }
        ChartType::Ytt => ToolCommand::new(&tools.ytt, ytt_chart_args(&chart.path, &chart.value_files)),
    }
}

/// Run every job in parallel and return the output files in job order.
///
/// # Errors
///
/// Returns the first failure observed; outputs of the other jobs are
/// discarded.
pub fn render_all(jobs: &[RenderJob], runner: &dyn CommandRunner, scratch: &Path) -> Result<Vec<PathBuf>> {
    let rendered: Mutex<Vec<(usize, PathBuf)>> = Mutex::new(Vec::with_capacity(jobs.len()));
    let errors: Mutex<Vec<Error>> = Mutex::new(Vec::new());

    jobs.par_iter().enumerate().for_each(|(index, job)| {
        match render_one(job, runner, scratch) {
            Ok(path) => {
                if let Ok(mut rendered) = rendered.lock() {
                    rendered.push((index, path));
                }
            }
            Err(e) => {
                if let Ok(mut errors) = errors.lock() {
                    errors.push(e);
                }
            }
        }
    });

    let errors = errors.into_inner().map_err(|_| Error::LockPoisoned {
        context: "render errors".to_string(),
    })?;
    if let Some(first_error) = errors.into_iter().next() {
        return Err(first_error);
    }

    let mut rendered = rendered.into_inner().map_err(|_| Error::LockPoisoned {
        context: "render results".to_string(),
    })?;
    rendered.sort_by_key(|(index, _)| *index);
    Ok(rendered.into_iter().map(|(_, path)| path).collect())
}

fn render_one(job: &RenderJob, runner: &dyn CommandRunner, scratch: &Path) -> Result<PathBuf> {
    info!("rendering job={} command={}", job.name, job.command);
    let output = run_reported(runner, &job.command)?;
    let path = write_temp_file(
        scratch,
        &format!("compiled-{}-", job.name),
        ".yaml",
        &output.stdout,
    )?;
    debug!("job={} output={}", job.name, path.display());
    Ok(path)
}
