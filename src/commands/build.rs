//! # Build Command Implementation
//!
//! This module implements the `build` subcommand: it resolves the layers of a
//! configuration directory, renders every chart and resource with the
//! external tools and writes one file per resource to the output directory
//! (or streams them to standard output).
//!
//! ## Scratch directory
//!
//! Intermediate files go to `--tmp-dir` when given, otherwise to a fresh
//! `beaver-*` directory under the system temp directory. The fresh directory
//! is removed after a successful build unless `--keep-tmp` is set, and always
//! kept after a failure so the intermediate files can be inspected.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use log::{error, info};

use beaver::phases::compose::{BuildConfig, BuildOptions, OutputTarget};
use beaver::phases::orchestrator::Runner;
use beaver::scratch::Scratch;
use beaver::tools::Tools;

/// Build the manifests of a configuration directory
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Configuration directory, relative to the root directory
    #[arg(value_name = "CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// Root directory of the project
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root_dir: PathBuf,

    /// Namespace override
    #[arg(short, long, value_name = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Log the commands that would run without running them
    #[arg(short, long)]
    pub dry_run: bool,

    /// Keep the scratch directory after a successful build
    #[arg(short, long)]
    pub keep_tmp: bool,

    /// Output directory relative to --root-dir, or `stdout` (defaults to <root>/build/<namespace>)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<String>,

    /// Scratch directory for intermediate files
    #[arg(long, value_name = "DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Take value files as they are and skip the hash pass
    #[arg(long)]
    pub skip_hydrate: bool,

    /// Run `helm dependency build` for helm charts before rendering
    #[arg(long)]
    pub build_deps: bool,

    /// Chart renderer binary
    #[arg(long, value_name = "BIN", env = "BEAVER_HELM", default_value = beaver::defaults::HELM_BIN)]
    pub helm_bin: String,

    /// Overlay tool binary
    #[arg(long, value_name = "BIN", env = "BEAVER_YTT", default_value = beaver::defaults::YTT_BIN)]
    pub ytt_bin: String,

    /// Resource creation binary
    #[arg(long, value_name = "BIN", env = "BEAVER_KUBECTL", default_value = beaver::defaults::KUBECTL_BIN)]
    pub kubectl_bin: String,

    /// Kustomize binary
    #[arg(long, value_name = "BIN", env = "BEAVER_KUSTOMIZE", default_value = beaver::defaults::KUSTOMIZE_BIN)]
    pub kustomize_bin: String,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        BuildOptions {
            dry_run: self.dry_run,
            keep_tmp: self.keep_tmp,
            output: self
                .output
                .as_deref()
                .map(|raw| OutputTarget::parse(raw, &self.root_dir)),
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
            skip_hydrate: self.skip_hydrate,
            build_dependencies: self.build_deps,
        }
    }

    fn tools(&self) -> Tools {
        Tools {
            helm: self.helm_bin.clone(),
            ytt: self.ytt_bin.clone(),
            kubectl: self.kubectl_bin.clone(),
            kustomize: self.kustomize_bin.clone(),
        }
    }
}

/// Execute the `build` command.
pub fn execute(args: BuildArgs) -> Result<()> {
    let options = args.options();
    let keep_tmp = options.keep_tmp;

    let config = BuildConfig::load(&args.root_dir, &args.config_dir, options).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.root_dir.join(&args.config_dir).display()
        )
    })?;

    let scratch = Scratch::new(args.tmp_dir.as_deref()).context("Failed to create scratch directory")?;
    let mut runner = Runner::new(config, args.tools());

    match runner.build(scratch.path()) {
        Ok(report) => {
            if let Some(OutputTarget::Dir(dir)) = &report.output {
                info!("built {} resources into {}", report.files.len(), dir.display());
            }
            scratch.finish(keep_tmp).context("Failed to clean up scratch directory")?;
            Ok(())
        }
        Err(e) => {
            let kept = scratch.finish(true).ok().flatten();
            if let Some(path) = kept {
                error!("build failed, temporary files kept in {}", path.display());
            }
            Err(e).context("Build failed")
        }
    }
}
