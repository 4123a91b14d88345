//! # Error Handling
//!
//! This module defines the centralized error type for `beaver`. It uses the
//! `thiserror` library to describe every failure the resolver, the hydration
//! engine and the build runner can report.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors that can
//!   occur while building manifests. Each variant carries the path, tag or
//!   command that caused it so the message can be acted upon directly.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the library.
//!
//! The variants fall into four groups:
//!
//! - Configuration errors: a missing `beaver.yaml` at the requested layer,
//!   malformed YAML, an engine version mismatch, an inheritance cycle.
//! - Resolution errors: a tag referencing an undefined variable path, an
//!   overlay that addresses a location that cannot exist.
//! - External process errors: a tool that could not be spawned or exited
//!   with a non-zero status.
//! - Structural errors: a rendered resource missing required fields, a hash
//!   declaration whose target file was never produced.
//!
//! None of them is retried; every one aborts the build.

use thiserror::Error;

/// Main error type for beaver operations
#[derive(Error, Debug)]
pub enum Error {
    /// The requested (most specific) layer has no `beaver.yaml`/`beaver.yml`.
    #[error("Configuration not found: no beaver.yaml or beaver.yml in {dir}")]
    ConfigNotFound { dir: String },

    /// A `beaver.yaml` file could not be parsed or holds an invalid value.
    #[error("Configuration parsing error in {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// A layer was written for a different engine version.
    #[error("Version mismatch: configuration requires beaver {desired}, running {actual}")]
    VersionMismatch { desired: String, actual: String },

    /// A directory was reached twice while walking the inheritance graph.
    #[error("Recursive inherit loop detected: {cycle}")]
    CycleDetected { cycle: String },

    /// A hydration tag names a variable path that does not exist.
    #[error("Tag not found: <[{tag}]>")]
    TagNotFound { tag: String },

    /// A variable overlay addresses a location that cannot be created.
    #[error("Variable overlay error for {name}: {message}")]
    Variable { name: String, message: String },

    /// Hydration of a file or stream failed for a reason other than a
    /// missing tag.
    #[error("Hydration error in {context}: {message}")]
    Hydrate { context: String, message: String },

    /// An external tool could not be started.
    #[error("Failed to run {command}: {message}")]
    ToolSpawn { command: String, message: String },

    /// An external tool exited with a non-zero status.
    #[error("Command failed: {command} ({status}){}", if stderr.is_empty() { String::new() } else { format!("\n{}", stderr.trim_end()) })]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// A boolean-like field holds something other than a boolean literal.
    #[error("Invalid boolean value for {field}: {value:?}")]
    InvalidBool { field: String, value: String },

    /// A hash declaration was read before its digest was computed.
    #[error("SHA not found for key {key}")]
    MissingHash { key: String },

    /// A hash declaration points at a resource file that was not produced.
    #[error("Cannot compute SHA for key {key}: resource file {resource} not found")]
    HashTarget { key: String, resource: String },

    /// A rendered resource document is missing required fields.
    #[error("Malformed resource: {message}")]
    Resource { message: String },

    /// An error occurred while preparing or writing an output location.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
