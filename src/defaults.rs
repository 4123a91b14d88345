//! Default values for beaver configuration.
//!
//! This module provides centralized default values used across the library
//! and the CLI, ensuring consistency and avoiding duplication.

use std::path::{Path, PathBuf};

/// Configuration file names looked up in every layer directory, in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["beaver.yaml", "beaver.yml"];

/// Kustomization file names looked up in a layer's `kustomize/` directory.
pub const KUSTOMIZATION_FILE_NAMES: [&str; 3] =
    ["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// Name of the per-layer directory holding kustomize overlays.
pub const KUSTOMIZE_DIR: &str = "kustomize";

/// Name of the per-layer overlay fragment directory (and file stem).
pub const YTT_FRAGMENT: &str = "ytt";

/// Extensions tried for value-override files and fragment files.
pub const YAML_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Output target that streams resources to standard output.
pub const STDOUT_TARGET: &str = "stdout";

/// Variable under which the kustomization file sees the compiled input.
pub const KUSTOMIZE_BUILD_VARIABLE: &str = "beaver";

/// Default binary names for the external tools.
pub const HELM_BIN: &str = "helm";
pub const YTT_BIN: &str = "ytt";
pub const KUBECTL_BIN: &str = "kubectl";
pub const KUSTOMIZE_BIN: &str = "kustomize";

/// Returns the default output directory for a build.
///
/// Resources land in `<root>/build/<namespace>` unless the caller overrides
/// the output target.
pub fn default_output_dir(root: &Path, namespace: &str) -> PathBuf {
    root.join("build").join(namespace)
}
