//! # CLI Command Implementations
//!
//! Each subcommand of the `beaver` command-line tool lives in its own file
//! with an `Args` struct derived with `clap` and an `execute` function that
//! calls into the `beaver` library.

pub mod build;
pub mod completions;
pub mod version;
