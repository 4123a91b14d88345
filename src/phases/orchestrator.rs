//! Build orchestration
//!
//! [`Runner`] drives one build of a merged [`BuildConfig`] through its
//! states and records how far it got.
//!
//! ```text
//! Prepared -> CommandsIssued -> RenderedOnce -> HashesComputed
//!          -> RenderedTwice -> OverlayApplied -> Partitioned
//! ```
//!
//! Any error moves the build to [`BuildState::Failed`]. In dry-run mode the
//! build stops after [`BuildState::CommandsIssued`]: the planned commands are
//! logged and returned, nothing is executed and nothing is written.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use log::{debug, info};

use super::compose::{BuildConfig, HashPass, OutputTarget};
use super::{overlay, render, split, write};
use crate::config::ChartType;
use crate::error::Result;
use crate::helm;
use crate::tools::{CommandRunner, SystemRunner, ToolCommand, Tools};

/// Progress of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Namespace, chart switches and input files hydrated with hash
    /// placeholders.
    Prepared,
    /// Every tool invocation constructed.
    CommandsIssued,
    /// Charts and resources rendered, overlays and kustomize applied.
    RenderedOnce,
    /// First-pass resources partitioned and their digests computed.
    HashesComputed,
    /// Resource names and contents hydrated with the digests.
    RenderedTwice,
    /// Resources delivered to the output target.
    OverlayApplied,
    /// Done.
    Partitioned,
    Failed,
}

/// What a build did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Tool invocations, in the order they were issued.
    pub commands: Vec<ToolCommand>,
    /// Names of the delivered resource files.
    pub files: Vec<String>,
    /// Where the resources went; `None` for a dry run.
    pub output: Option<OutputTarget>,
}

/// Runs builds of one merged configuration.
pub struct Runner {
    config: BuildConfig,
    tools: Tools,
    command_runner: Box<dyn CommandRunner>,
    state: Option<BuildState>,
}

impl Runner {
    /// Creates a runner that executes tools as child processes.
    pub fn new(config: BuildConfig, tools: Tools) -> Self {
        Self {
            config,
            tools,
            command_runner: Box::new(SystemRunner),
            state: None,
        }
    }

    /// Replace the process runner, e.g. with an in-memory one.
    pub fn with_command_runner(mut self, command_runner: Box<dyn CommandRunner>) -> Self {
        self.command_runner = command_runner;
        self
    }

    pub fn state(&self) -> Option<BuildState> {
        self.state
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build with `scratch` as the scratch directory, streaming to standard
    /// output when that is the output target.
    pub fn build(&mut self, scratch: &Path) -> Result<BuildReport> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.build_to(scratch, &mut out)
    }

    /// Build, streaming to `out` when the output target is standard output.
    pub fn build_to(&mut self, scratch: &Path, out: &mut dyn Write) -> Result<BuildReport> {
        let result = self.run(scratch, out);
        if let Err(e) = &result {
            debug!("build failed in state {:?}: {}", self.state, e);
            self.state = Some(BuildState::Failed);
        }
        result
    }

    fn advance(&mut self, state: BuildState) {
        debug!("state={:?}", state);
        self.state = Some(state);
    }

    fn run(&mut self, scratch: &Path, out: &mut dyn Write) -> Result<BuildReport> {
        self.config.prepare(scratch)?;
        self.advance(BuildState::Prepared);

        let dependency_commands = if self.config.options.build_dependencies {
            let charts: Vec<_> = self
                .config
                .enabled_charts()?
                .into_iter()
                .filter(|(_, chart)| chart.chart_type == ChartType::Helm)
                .map(|(_, chart)| chart.path.clone())
                .collect();
            helm::dependency_commands(&self.tools.helm, &charts)?
        } else {
            Vec::new()
        };
        let jobs = render::plan(&self.config, &self.tools)?;
        let mut report = BuildReport {
            commands: dependency_commands.clone(),
            ..Default::default()
        };
        report.commands.extend(jobs.iter().map(|job| job.command.clone()));
        self.advance(BuildState::CommandsIssued);

        if self.config.options.dry_run {
            let planned: Vec<_> = jobs
                .iter()
                .map(|job| scratch.join(format!("compiled-{}.yaml", job.name)))
                .collect();
            if !planned.is_empty() || !self.config.ytt.is_empty() {
                report.commands.push(ToolCommand::new(
                    &self.tools.ytt,
                    overlay::overlay_args(&planned, &self.config.ytt),
                ));
            }
            if let Some(dir) = &self.config.kustomize {
                report
                    .commands
                    .push(ToolCommand::new(&self.tools.kustomize, overlay::kustomize_args(dir)));
            }
            for command in &report.commands {
                info!("dry-run command={}", command);
            }
            return Ok(report);
        }

        let runner = self.command_runner.as_ref();
        helm::build_dependencies(runner, &dependency_commands)?;
        let compiled = render::render_all(&jobs, runner, scratch)?;
        let fully = overlay::run_ytt(runner, &self.tools.ytt, &compiled, &self.config.ytt, scratch)?;
        let stream_path = match &self.config.kustomize {
            Some(dir) => {
                let vars = self.config.prepare_variables(HashPass::Placeholder)?;
                overlay::run_kustomize(runner, &self.tools.kustomize, dir, &fully, &vars, scratch)?
            }
            None => fully,
        };
        self.advance(BuildState::RenderedOnce);

        let prebuild = tempfile::Builder::new()
            .prefix("prebuild-")
            .tempdir_in(scratch)?
            .keep();
        let stream = fs::read_to_string(&stream_path)?;
        let partitioned = split::partition(&stream, &prebuild)?;
        info!("partitioned {} resources into {}", partitioned.len(), prebuild.display());
        if !self.config.options.skip_hydrate {
            split::compute_hashes(&mut self.config.hashes, &prebuild)?;
        }
        self.advance(BuildState::HashesComputed);

        let vars = if self.config.options.skip_hydrate {
            None
        } else {
            Some(self.config.prepare_variables(HashPass::Resolved)?)
        };
        let files = write::hydrate_outputs(&prebuild, vars.as_ref())?;
        self.advance(BuildState::RenderedTwice);

        let target = self.config.output_target();
        match &target {
            OutputTarget::Stdout => write::write_stream(&files, out)?,
            OutputTarget::Dir(dir) => write::write_dir(&files, dir)?,
        }
        self.advance(BuildState::OverlayApplied);

        report.files = files.into_iter().map(|file| file.name).collect();
        report.output = Some(target);
        self.advance(BuildState::Partitioned);
        Ok(report)
    }
}
