//! Resource partitioning and content hashes
//!
//! Splits a multi-document stream into one file per resource, named
//! `{Kind}.{apiVersion}[.{namespace}].{name}.yaml` with `/` in the API
//! version replaced by `_`. The namespace segment appears only when the
//! resource declares one.

use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_yaml::Value;
use sha2::{Digest, Sha256};

use super::compose::HashSpec;
use crate::error::{Error, Result};

/// File name of a resource document.
pub fn resource_file_name(resource: &Value) -> Result<String> {
    let kind = required(resource, &["kind"])?;
    let api_version = required(resource, &["apiVersion"])?.replace('/', "_");
    let name = required(resource, &["metadata", "name"])?;

    let mut parts = vec![kind, api_version];
    if let Some(namespace) = field(resource, &["metadata", "namespace"]) {
        if !namespace.is_empty() {
            parts.push(namespace);
        }
    }
    parts.push(name);
    Ok(format!("{}.yaml", parts.join(".")))
}

fn field(resource: &Value, path: &[&str]) -> Option<String> {
    let mut current = resource;
    for key in path {
        current = current.get(*key)?;
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required(resource: &Value, path: &[&str]) -> Result<String> {
    field(resource, path)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Resource {
            message: format!("missing {} in resource {}", path.join("."), describe(resource)),
        })
}

fn describe(resource: &Value) -> String {
    let text = serde_yaml::to_string(resource).unwrap_or_default();
    let line: String = text.lines().take(3).collect::<Vec<_>>().join(" ");
    format!("{:?}", line)
}

/// Write every resource of `stream` to its own file in `dir` and return the
/// file names in stream order.
///
/// Empty documents are skipped. A later resource with the same name
/// replaces an earlier one.
pub fn partition(stream: &str, dir: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(dir)?;
    let mut names = Vec::new();
    for document in serde_yaml::Deserializer::from_str(stream) {
        let resource = Value::deserialize(document)?;
        if resource.is_null() {
            continue;
        }
        let name = resource_file_name(&resource)?;
        let content = format!("---\n{}", serde_yaml::to_string(&resource)?);
        fs::write(dir.join(&name), content)?;
        debug!("partitioned resource={}", name);
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Lower-case hex SHA-256 of a file's bytes.
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fill in the digest of every hash declaration from the partitioned
/// resources in `dir`.
pub fn compute_hashes(hashes: &mut [HashSpec], dir: &Path) -> Result<()> {
    for hash in hashes.iter_mut() {
        let target = dir.join(&hash.resource);
        if !target.is_file() {
            return Err(Error::HashTarget {
                key: hash.key.clone(),
                resource: hash.resource.clone(),
            });
        }
        let digest = file_digest(&target)?;
        debug!("sha key={} resource={} digest={}", hash.key, hash.resource, digest);
        hash.digest = Some(digest);
    }
    Ok(())
}
