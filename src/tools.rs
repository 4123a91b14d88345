//! External tool invocation
//!
//! Builds are driven by four external binaries: a chart renderer (`helm`),
//! an overlay tool (`ytt`), a resource creator (`kubectl`) and a kustomize
//! overlay tool. The library only constructs their argument vectors and
//! consumes stdout, stderr and the exit status; the actual process
//! execution sits behind the [`CommandRunner`] trait so it can be replaced
//! in tests.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use log::{debug, error};

use crate::defaults::{HELM_BIN, KUBECTL_BIN, KUSTOMIZE_BIN, YTT_BIN};
use crate::error::{Error, Result};

/// A fully constructed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; the caller's when `None`.
    pub dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Trait for running external tools - allows mocking in tests
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion.
    ///
    /// A launch failure is `Error::ToolSpawn`; a non-zero exit is
    /// `Error::ToolFailed` carrying the tool's stderr.
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Runs tools as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let mut process = Command::new(&command.program);
        process.args(&command.args);
        if let Some(dir) = &command.dir {
            process.current_dir(dir);
        }

        debug!("running {}", command);
        let output = process.output().map_err(|e| Error::ToolSpawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(Error::ToolFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Binary names of the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub helm: String,
    pub ytt: String,
    pub kubectl: String,
    pub kustomize: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            helm: HELM_BIN.to_string(),
            ytt: YTT_BIN.to_string(),
            kubectl: KUBECTL_BIN.to_string(),
            kustomize: KUSTOMIZE_BIN.to_string(),
        }
    }
}

/// Run `command`, reporting a failure twice: the tool's stderr goes to the
/// user verbatim and a log entry records the command.
pub fn run_reported(runner: &dyn CommandRunner, command: &ToolCommand) -> Result<ToolOutput> {
    runner.run(command).inspect_err(|e| {
        match e {
            Error::ToolFailed { stderr, status, .. } => {
                if !stderr.trim().is_empty() {
                    eprintln!("\n{}\n", stderr.trim_end());
                }
                error!("command={} status={} failed", command, status);
            }
            other => error!("command={} error={}", command, other),
        }
    })
}
