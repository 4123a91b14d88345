//! Merged build configuration
//!
//! Folds the resolved layers, oldest ancestor first, into one
//! [`BuildConfig`] and attaches the files each layer contributes on disk.
//!
//! ## Process
//!
//! 1.  **Fold**: variables are overlaid layer by layer; chart declarations
//!     are replaced by key; resource-creation declarations are replaced by
//!     `{type, name}` and remember the directory that declared them; hash
//!     declarations are replaced by key.
//!
//! 2.  **Namespace**: the caller's override wins, otherwise the most
//!     specific layer with a non-empty namespace.
//!
//! 3.  **File discovery**: for every chart, `<layer>/<chart>.yaml` and
//!     `<layer>/<chart>.yml` in every layer become value-override files;
//!     every layer's `ytt/` directory and `ytt.yaml`/`ytt.yml` become overlay
//!     fragments; the last layer with a `kustomize/` directory provides the
//!     kustomization.
//!
//! 4.  **First hydration pass** ([`BuildConfig::prepare`]): the namespace,
//!     each chart's `disabled` and `namespace` fields and every discovered
//!     file are hydrated with hash tags left as placeholders.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_yaml::{Mapping, Value};

use super::discovery::{resolve_layers, Layer};
use crate::config::{parse_bool, Arg, ChartType};
use crate::defaults::{
    default_output_dir, KUSTOMIZATION_FILE_NAMES, KUSTOMIZE_DIR, STDOUT_TARGET, YAML_EXTENSIONS,
    YTT_FRAGMENT,
};
use crate::error::{Error, Result};
use crate::hydrate::{hydrate_files, interpolate, TAG_END, TAG_START};
use crate::path::{absolutize, normalize};
use crate::variables::Variables;
use crate::version::engine_version;

/// Which values hash tags resolve to while preparing variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashPass {
    /// Hash tags render as their own text (`<[sha.KEY]>`).
    Placeholder,
    /// Hash tags render as the computed digests.
    Resolved,
}

/// Where the final resources go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Streamed to standard output.
    Stdout,
    /// One file per resource in this directory.
    Dir(PathBuf),
}

impl OutputTarget {
    /// Interpret a user supplied target; relative directories resolve
    /// against `base`.
    pub fn parse(raw: &str, base: &Path) -> Self {
        if raw == STDOUT_TARGET {
            OutputTarget::Stdout
        } else {
            OutputTarget::Dir(absolutize(base, Path::new(raw)))
        }
    }
}

/// Build flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub dry_run: bool,
    pub keep_tmp: bool,
    /// Output target; `<root>/build/<namespace>` when `None`.
    pub output: Option<OutputTarget>,
    pub namespace: Option<String>,
    /// Use value files as they are and skip the hash pass.
    pub skip_hydrate: bool,
    /// Run `helm dependency build` before rendering.
    pub build_dependencies: bool,
}

/// A chart with the value-override files discovered for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub path: PathBuf,
    pub name: String,
    pub namespace: String,
    pub disabled: String,
    pub value_files: Vec<PathBuf>,
}

impl ChartSpec {
    /// Release name: the declared name, or the chart key.
    pub fn release_name<'a>(&'a self, key: &'a str) -> &'a str {
        if self.name.is_empty() {
            key
        } else {
            &self.name
        }
    }
}

/// Identity of a resource-creation declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreateKey {
    pub kind: String,
    pub name: String,
}

/// A resource-creation declaration and the layer directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpec {
    pub dir: PathBuf,
    pub args: Vec<Arg>,
}

/// A hash declaration; `digest` is filled in after the first render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSpec {
    pub key: String,
    pub resource: String,
    pub digest: Option<String>,
}

/// Everything a build needs, merged from all layers.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub root_dir: PathBuf,
    /// Layer directories, most general first.
    pub layers: Vec<PathBuf>,
    pub namespace: String,
    pub variables: Variables,
    pub charts: BTreeMap<String, ChartSpec>,
    pub creates: BTreeMap<CreateKey, CreateSpec>,
    pub hashes: Vec<HashSpec>,
    /// Overlay fragments (files and directories), in layer order.
    pub ytt: Vec<PathBuf>,
    /// Directory holding the kustomization to apply, if any.
    pub kustomize: Option<PathBuf>,
    pub options: BuildOptions,
}

impl BuildConfig {
    /// Resolve the layers of `config_dir` (relative to `root_dir`) and merge
    /// them.
    pub fn load(root_dir: &Path, config_dir: &Path, options: BuildOptions) -> Result<Self> {
        let root_dir = normalize(&std::path::absolute(root_dir)?);
        let start = absolutize(&root_dir, config_dir);
        let layers = resolve_layers(&start, Some(engine_version()))?;
        Self::from_layers(&root_dir, layers, options)
    }

    /// Merge already resolved layers.
    pub fn from_layers(root_dir: &Path, layers: Vec<Layer>, options: BuildOptions) -> Result<Self> {
        let mut variables = Variables::new();
        let mut charts: BTreeMap<String, ChartSpec> = BTreeMap::new();
        let mut creates = BTreeMap::new();
        let mut hashes: Vec<HashSpec> = Vec::new();
        let mut layer_namespace = String::new();
        let mut dirs = Vec::with_capacity(layers.len());

        for Layer { dir, config } in layers {
            variables.overlay(config.variables)?;

            if !config.namespace.is_empty() {
                layer_namespace = config.namespace;
            }

            for (key, chart) in config.charts {
                charts.insert(
                    key,
                    ChartSpec {
                        chart_type: chart.chart_type,
                        path: chart.path,
                        name: chart.name,
                        namespace: chart.namespace,
                        disabled: chart.disabled,
                        value_files: Vec::new(),
                    },
                );
            }

            for create in config.creates {
                creates.insert(
                    CreateKey {
                        kind: create.kind,
                        name: create.name,
                    },
                    CreateSpec {
                        dir: dir.clone(),
                        args: create.args,
                    },
                );
            }

            for sha in config.sha {
                let spec = HashSpec {
                    key: sha.key,
                    resource: sha.resource,
                    digest: None,
                };
                match hashes.iter_mut().find(|h| h.key == spec.key) {
                    Some(existing) => *existing = spec,
                    None => hashes.push(spec),
                }
            }

            dirs.push(dir);
        }

        let namespace = options.namespace.clone().unwrap_or(layer_namespace);

        for (key, chart) in charts.iter_mut() {
            chart.value_files = value_files(&dirs, key);
        }

        let config = BuildConfig {
            root_dir: root_dir.to_path_buf(),
            ytt: ytt_fragments(&dirs),
            kustomize: kustomize_dir(&dirs),
            layers: dirs,
            namespace,
            variables,
            charts,
            creates,
            hashes,
            options,
        };
        debug!(
            "merged {} layers: {} charts, {} creates, {} hashes, {} overlay fragments",
            config.layers.len(),
            config.charts.len(),
            config.creates.len(),
            config.hashes.len(),
            config.ytt.len()
        );
        Ok(config)
    }

    /// The variables exposed to hydration: every variable, plus `namespace`
    /// and a `sha` mapping of hash keys.
    ///
    /// # Errors
    ///
    /// In the resolved pass, a hash declaration without a digest is
    /// `Error::MissingHash`.
    pub fn prepare_variables(&self, pass: HashPass) -> Result<Value> {
        let mut vars = self.variables.to_mapping();
        vars.insert(
            Value::String("namespace".to_string()),
            Value::String(self.namespace.clone()),
        );

        let mut sha = Mapping::new();
        for hash in &self.hashes {
            let value = match pass {
                HashPass::Placeholder => format!("{}sha.{}{}", TAG_START, hash.key, TAG_END),
                HashPass::Resolved => hash.digest.clone().ok_or_else(|| Error::MissingHash {
                    key: hash.key.clone(),
                })?,
            };
            sha.insert(Value::String(hash.key.clone()), Value::String(value));
        }
        vars.insert(Value::String("sha".to_string()), Value::Mapping(sha));

        Ok(Value::Mapping(vars))
    }

    /// First hydration pass.
    ///
    /// Resolves the namespace and the charts' `disabled` and `namespace`
    /// fields, then replaces every value-override file and overlay fragment
    /// with a hydrated copy inside `scratch`.
    pub fn prepare(&mut self, scratch: &Path) -> Result<()> {
        let vars = self.prepare_variables(HashPass::Placeholder)?;
        self.namespace = interpolate(&self.namespace, &vars)?;
        info!("namespace={}", self.namespace);

        let vars = self.prepare_variables(HashPass::Placeholder)?;
        for chart in self.charts.values_mut() {
            chart.disabled = interpolate(&chart.disabled, &vars)?;
            chart.namespace = interpolate(&chart.namespace, &vars)?;
        }

        if self.options.skip_hydrate {
            debug!("skipping hydration of value files");
            return Ok(());
        }

        let mut charts = BTreeMap::new();
        for (key, mut chart) in std::mem::take(&mut self.charts) {
            chart.value_files = hydrate_files(scratch, &vars, &chart.value_files)?;
            charts.insert(key, chart);
        }
        self.charts = charts;
        self.ytt = hydrate_files(scratch, &vars, &self.ytt)?;
        Ok(())
    }

    /// Charts to render, with `disabled` evaluated.
    pub fn enabled_charts(&self) -> Result<Vec<(&str, &ChartSpec)>> {
        let mut enabled = Vec::new();
        for (key, chart) in &self.charts {
            if parse_bool(&format!("charts.{}.disabled", key), &chart.disabled)? {
                info!("chart={} disabled, skipping", key);
                continue;
            }
            enabled.push((key.as_str(), chart));
        }
        Ok(enabled)
    }

    /// The output target, defaulting to `<root>/build/<namespace>`.
    pub fn output_target(&self) -> OutputTarget {
        self.options
            .output
            .clone()
            .unwrap_or_else(|| OutputTarget::Dir(default_output_dir(&self.root_dir, &self.namespace)))
    }
}

/// `<layer>/<chart>.yaml` and `<layer>/<chart>.yml` for every layer.
pub fn value_files(layers: &[PathBuf], chart: &str) -> Vec<PathBuf> {
    layers
        .iter()
        .flat_map(|layer| {
            YAML_EXTENSIONS
                .iter()
                .map(move |ext| layer.join(format!("{}.{}", chart, ext)))
        })
        .filter(|path| path.is_file())
        .collect()
}

/// `<layer>/ytt/`, `<layer>/ytt.yaml` and `<layer>/ytt.yml` for every layer.
pub fn ytt_fragments(layers: &[PathBuf]) -> Vec<PathBuf> {
    let mut fragments = Vec::new();
    for layer in layers {
        let dir = layer.join(YTT_FRAGMENT);
        if dir.is_dir() {
            fragments.push(dir);
        }
        for ext in YAML_EXTENSIONS {
            let file = layer.join(format!("{}.{}", YTT_FRAGMENT, ext));
            if file.is_file() {
                fragments.push(file);
            }
        }
    }
    fragments
}

/// The `kustomize/` directory of the most specific layer that has one with
/// a kustomization file.
pub fn kustomize_dir(layers: &[PathBuf]) -> Option<PathBuf> {
    layers
        .iter()
        .rev()
        .map(|layer| layer.join(KUSTOMIZE_DIR))
        .find(|dir| kustomization_file(dir).is_some())
}

/// The kustomization file inside `dir`.
pub fn kustomization_file(dir: &Path) -> Option<PathBuf> {
    KUSTOMIZATION_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}
