//! # Beaver
//!
//! Beaver builds Kubernetes manifests from layered directories. Every layer
//! holds a `beaver.yaml` that may inherit from other layers; the merged
//! configuration names charts to render, resources to create and variables
//! to substitute into everything on the way.
//!
//! ## Quick Example
//!
//! ```
//! use beaver::hydrate::hydrate;
//!
//! let vars: serde_yaml::Value = serde_yaml::from_str("replicas: 3\nenv: prod").unwrap();
//! let out = hydrate("replicas: <[replicas]>\nname: web-<[env]>\n", &vars).unwrap();
//! assert_eq!(out, "replicas: 3\nname: web-prod\n");
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: the schema of one layer's `beaver.yaml`.
//! - **Variables (`variables`)**: an ordered store of named values with
//!   dotted-path lookup and overlay.
//! - **Hydration (`hydrate`)**: substitution of `<[path]>` tags in raw text
//!   and, format-preserving, in YAML documents.
//! - **Phases (`phases`)**: layer discovery, merging, rendering with the
//!   external tools, partitioning and the final hash-aware hydration.
//! - **Tools (`tools`, `helm`)**: construction and execution of the external
//!   tool invocations.
//!
//! ## Execution Flow
//!
//! 1.  **Discovery**: walk the inheritance graph from the requested layer.
//! 2.  **Composition**: merge the layers and find value files, overlay
//!     fragments and the kustomization on disk.
//! 3.  **Rendering**: run every chart and resource creation in parallel,
//!     then the overlay tool and kustomize.
//! 4.  **Partitioning**: split the stream into one file per resource and hash
//!     the files named by hash declarations.
//! 5.  **Output**: hydrate again with the digests and write the output
//!     directory or standard output.

pub mod config;
pub mod defaults;
pub mod error;
pub mod helm;
pub mod hydrate;
pub mod path;
pub mod phases;
pub mod scratch;
pub mod tools;
pub mod variables;
pub mod version;

#[cfg(test)]
mod variables_proptest;
