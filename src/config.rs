//! # Configuration Schema
//!
//! Every layer directory holds one `beaver.yaml` (or `beaver.yml`). This
//! module defines its schema and the loader that turns it into a
//! [`ParsedConfig`] with every path made absolute against the layer
//! directory.
//!
//! ```yaml
//! inherit: ../base
//! namespace: demo
//! beaverversion: 2.0.0
//! variables:
//!   replicas: 2
//! sha:
//!   - key: cfg
//!     resource: ConfigMap.v1.demo.app-config.yaml
//! charts:
//!   web:
//!     type: helm
//!     path: ../charts/web
//!     disabled: <[features.web_off]>
//!   overlays:
//!     type: ytt
//!     path: ./ytt-lib
//! create:
//!   - type: configmap
//!     name: app-config
//!     args:
//!       - flag: --from-file
//!         value: config/app.properties
//! ```
//!
//! All fields are optional and an explicit `null` is treated like an
//! omitted field.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

use crate::defaults::CONFIG_FILE_NAMES;
use crate::error::{Error, Result};
use crate::path::absolutize;
use crate::variables::Variables;

/// The tool that renders a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    /// Rendered with `helm template`.
    Helm,
    /// Passed to the overlay tool as a plain input.
    Ytt,
}

/// A chart declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chart {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    #[serde(default)]
    pub path: PathBuf,
    /// Release name override; the chart key is used when empty.
    #[serde(default, deserialize_with = "stringish")]
    pub name: String,
    /// Namespace override for this chart only.
    #[serde(default, deserialize_with = "stringish")]
    pub namespace: String,
    /// Boolean literal or tag, evaluated after the first hydration pass.
    #[serde(default, deserialize_with = "stringish")]
    pub disabled: String,
}

/// A hash declaration: expose the digest of a rendered resource file as
/// `sha.<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sha {
    pub key: String,
    pub resource: String,
}

/// A single `flag value` pair appended to a create command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Arg {
    pub flag: String,
    #[serde(default, deserialize_with = "stringish")]
    pub value: String,
}

/// A resource-creation declaration, rendered with `kubectl create`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Create {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Vec<Arg>,
}

/// The content of one layer's configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParsedConfig {
    #[serde(default)]
    pub inherit: Option<PathBuf>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inherits: Vec<PathBuf>,
    #[serde(default, deserialize_with = "stringish")]
    pub namespace: String,
    #[serde(default, rename = "beaverversion", deserialize_with = "optional_stringish")]
    pub beaver_version: Option<String>,
    #[serde(default)]
    pub variables: Variables,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sha: Vec<Sha>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub charts: BTreeMap<String, Chart>,
    #[serde(default, rename = "create", deserialize_with = "null_as_default")]
    pub creates: Vec<Create>,
}

impl ParsedConfig {
    /// Make every chart path absolute against `dir`.
    pub fn resolve_paths(&mut self, dir: &Path) {
        for chart in self.charts.values_mut() {
            chart.path = absolutize(dir, &chart.path);
        }
    }

    /// Parent directories of the layer at `dir`: `inherits` entries first,
    /// then `inherit`.
    pub fn parents(&self, dir: &Path) -> Vec<PathBuf> {
        self.inherits
            .iter()
            .chain(self.inherit.iter())
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| absolutize(dir, p))
            .collect()
    }
}

/// Parse a configuration document.
///
/// An empty document (or one holding only comments) is an empty
/// configuration.
pub fn parse(yaml_content: &str) -> Result<ParsedConfig> {
    let value: Value = serde_yaml::from_str(yaml_content)?;
    if value.is_null() {
        return Ok(ParsedConfig::default());
    }
    Ok(serde_yaml::from_value(value)?)
}

/// The configuration file of `dir`, if there is one.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Load the configuration of the layer at `dir`.
///
/// Returns `Ok(None)` when the directory has no configuration file.
pub fn load(dir: &Path) -> Result<Option<ParsedConfig>> {
    let Some(path) = find_config_file(dir) else {
        return Ok(None);
    };
    let content = fs::read_to_string(&path)?;
    let mut config = parse(&content).map_err(|e| Error::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    config.resolve_paths(dir);
    Ok(Some(config))
}

/// Interpret a boolean-like literal.
///
/// Accepts `1 t T TRUE true True 0 f F FALSE false False`; the empty
/// string is `false`.
pub fn parse_bool(field: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "" | "0" | "f" | "F" | "false" | "False" | "FALSE" => Ok(false),
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Ok(true),
        other => Err(Error::InvalidBool {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn stringish<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_stringish(deserializer)?.unwrap_or_default())
}

/// Accept strings, numbers and booleans where a string is expected, so
/// `disabled: true` and `beaverversion: 2.1` read naturally.
fn optional_stringish<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a string, number or boolean, got {:?}",
            other
        ))),
    }
}
