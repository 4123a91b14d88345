//! Helm chart dependency builds
//!
//! Charts that pull local subcharts through `file://` repositories need
//! `helm dependency build` before they can be rendered. The subcharts may
//! have local dependencies of their own, so the charts are ordered
//! dependencies first and each path is built once.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::defaults::YAML_EXTENSIONS;
use crate::error::{Error, Result};
use crate::path::absolutize;
use crate::tools::{run_reported, CommandRunner, ToolCommand};

const LOCAL_REPOSITORY: &str = "file://";

#[derive(Debug, Default, Deserialize)]
struct ChartManifest {
    #[serde(default)]
    dependencies: Option<Vec<Dependency>>,
}

#[derive(Debug, Deserialize)]
struct Dependency {
    #[serde(default)]
    repository: String,
}

fn manifest_file(chart: &Path) -> Option<PathBuf> {
    YAML_EXTENSIONS
        .iter()
        .map(|ext| chart.join(format!("Chart.{}", ext)))
        .find(|path| path.is_file())
}

/// Directories of the `file://` dependencies declared by the chart at
/// `chart`. A directory without a chart manifest has none.
pub fn local_dependencies(chart: &Path) -> Result<Vec<PathBuf>> {
    let Some(manifest) = manifest_file(chart) else {
        return Ok(Vec::new());
    };
    let content = fs::read_to_string(&manifest)?;
    let parsed: ChartManifest = serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
        path: manifest.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(parsed
        .dependencies
        .unwrap_or_default()
        .into_iter()
        .filter_map(|dep| {
            dep.repository
                .strip_prefix(LOCAL_REPOSITORY)
                .map(|local| absolutize(chart, Path::new(local)))
        })
        .collect())
}

/// Every chart in `charts` plus their local dependencies, transitively,
/// each dependency before the charts that use it.
pub fn dependency_order(charts: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut order = Vec::new();
    let mut done = HashSet::new();
    let mut visiting = Vec::new();
    for chart in charts {
        visit(chart, &mut visiting, &mut done, &mut order)?;
    }
    Ok(order)
}

fn visit(
    chart: &Path,
    visiting: &mut Vec<PathBuf>,
    done: &mut HashSet<PathBuf>,
    order: &mut Vec<PathBuf>,
) -> Result<()> {
    if done.contains(chart) {
        return Ok(());
    }
    if visiting.iter().any(|p| p == chart) {
        let mut cycle: Vec<String> = visiting.iter().map(|p| p.display().to_string()).collect();
        cycle.push(chart.display().to_string());
        return Err(Error::CycleDetected {
            cycle: format!("charts {}", cycle.join(" -> ")),
        });
    }

    visiting.push(chart.to_path_buf());
    for dependency in local_dependencies(chart)? {
        visit(&dependency, visiting, done, order)?;
    }
    visiting.pop();

    done.insert(chart.to_path_buf());
    order.push(chart.to_path_buf());
    Ok(())
}

/// `helm dependency build` commands for `charts`, dependencies first.
pub fn dependency_commands(helm: &str, charts: &[PathBuf]) -> Result<Vec<ToolCommand>> {
    Ok(dependency_order(charts)?
        .into_iter()
        .map(|chart| {
            ToolCommand::new(
                helm,
                ["dependency".to_string(), "build".to_string(), chart.display().to_string()],
            )
        })
        .collect())
}

/// Run the dependency builds one after the other.
pub fn build_dependencies(runner: &dyn CommandRunner, commands: &[ToolCommand]) -> Result<()> {
    for command in commands {
        info!("building chart dependencies command={}", command);
        let output = run_reported(runner, command)?;
        debug!("{}", String::from_utf8_lossy(&output.stdout).trim_end());
    }
    Ok(())
}
