//! Shared test utilities for integration and E2E tests.
//!
//! This module provides fixtures and fake tools so builds can run without
//! the real `helm`, `ytt`, `kubectl` and `kustomize` binaries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_file("app/beaver.yaml", configs::SINGLE_CHART);
//! let config = fixture.load("app", BuildOptions::default());
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;
use beaver::error::{Error, Result};
use beaver::phases::{BuildConfig, BuildOptions};
use beaver::tools::{CommandRunner, ToolCommand, ToolOutput};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::{CatRunner, TestFixture};
}

/// Configuration and manifest snippets.
#[allow(dead_code)]
pub mod configs {
    /// A layer declaring one helm chart.
    pub const SINGLE_CHART: &str = r#"
namespace: demo
variables:
  port: 8080
charts:
  web:
    type: helm
    path: ../charts/web
"#;

    /// Two charts, one hash: the deployment carries the digest of the
    /// rendered config map.
    pub const HASHED: &str = r#"
namespace: demo
variables:
  port: 8080
  image:
    repository: registry.example.com/web
    tag: "1.4.2"
sha:
  - key: settings
    resource: ConfigMap.v1.demo.settings.yaml
charts:
  settings:
    type: helm
    path: ../charts/settings
  web:
    type: helm
    path: ../charts/web
"#;

    pub const SETTINGS_VALUES: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
  namespace: <[namespace]>
data:
  listen: "0.0.0.0:<[port]>"
"#;

    pub const WEB_VALUES: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: <[namespace]>
spec:
  replicas: 2
  template:
    metadata:
      annotations:
        checksum/settings: <[sha.settings]>
    spec:
      containers:
        - name: web
          image: <[image.repository]>:<[image.tag]>
          ports:
            - containerPort: <[port]>
"#;

    /// Shell script standing in for `helm` and `ytt`: prints every file
    /// passed with `-f`, one document each.
    pub const CAT_TOOL: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  if [ "$1" = "-f" ]; then
    shift
    if [ -f "$1" ]; then
      cat "$1"
      printf '\n---\n'
    fi
  fi
  shift
done
"#;

    /// Shell script standing in for a tool that always fails.
    pub const FAILING_TOOL: &str = r#"#!/bin/sh
echo "Error: chart is broken" >&2
exit 1
"#;
}

/// A temporary project directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add an executable script (Unix only).
    #[allow(dead_code)]
    #[cfg(unix)]
    pub fn with_script(self, path: &str, content: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;
        let fixture = self.with_file(path, content);
        let full = fixture.path().join(path);
        std::fs::set_permissions(&full, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
        fixture
    }

    /// The project used by most pipeline tests: an `app` layer with a
    /// hashed config map and a deployment.
    #[allow(dead_code)]
    pub fn hashed_project() -> Self {
        Self::new()
            .with_file("app/beaver.yaml", configs::HASHED)
            .with_file("app/settings.yaml", configs::SETTINGS_VALUES)
            .with_file("app/web.yaml", configs::WEB_VALUES)
            .with_file("charts/settings/Chart.yaml", "name: settings\n")
            .with_file("charts/web/Chart.yaml", "name: web\n")
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Load the build configuration of `config_dir`.
    #[allow(dead_code)]
    pub fn load(&self, config_dir: &str, options: BuildOptions) -> BuildConfig {
        BuildConfig::load(self.path(), Path::new(config_dir), options)
            .expect("Failed to load build configuration")
    }

    /// Default output directory for `namespace`.
    #[allow(dead_code)]
    pub fn output_dir(&self, namespace: &str) -> PathBuf {
        self.path().join("build").join(namespace)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory stand-in for the external tools.
///
/// Every invocation prints the content of the files passed with `-f`
/// (value files for `helm`, inputs for `ytt`), so value files double as the
/// rendered manifests. Invocations are recorded; a command whose arguments
/// contain one of `fail_on` fails with a tool error.
#[derive(Clone, Default)]
pub struct CatRunner {
    pub calls: Arc<Mutex<Vec<ToolCommand>>>,
    pub fail_on: Vec<String>,
}

#[allow(dead_code)]
impl CatRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: vec![marker.to_string()],
            ..Self::default()
        }
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }
}

impl CommandRunner for CatRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(command.clone());

        if command.args.iter().any(|a| self.fail_on.contains(a)) {
            return Err(Error::ToolFailed {
                command: command.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Error: chart is broken\n".to_string(),
            });
        }

        let mut stdout = Vec::new();
        let mut args = command.args.iter();
        while let Some(arg) = args.next() {
            if arg != "-f" {
                continue;
            }
            if let Some(file) = args.next() {
                let path = Path::new(file);
                if path.is_file() {
                    stdout.extend(std::fs::read(path)?);
                    stdout.extend(b"\n---\n");
                }
            }
        }
        Ok(ToolOutput {
            stdout,
            stderr: Vec::new(),
        })
    }
}
