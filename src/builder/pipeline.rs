//! Per-package pipeline: shared library, bindings, patch, link, package.
//!
//! Stages within a package always run in order. Packages are independent
//! and may run in parallel (`--jobs`); each buffers its output in a
//! [`PackageLog`] that is written as one block when the package finishes,
//! so lines from different packages never interleave. Once any package
//! fails, no further package is started.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::builder::bindings::BindingGenerator;
use crate::builder::context::BuildContext;
use crate::builder::errors::BuildError;
use crate::builder::events::BuildEvent;
use crate::builder::link::ExtensionLinker;
use crate::builder::package::{ArtifactPackager, BundleManifest};
use crate::builder::patch::{PatchOutcome, SymbolPatch};
use crate::builder::shared_lib::SharedLibraryBuilder;
use crate::core::artifact::{BuildArtifact, BuildOutcome, PackageState, RunOutcome, Stage};
use crate::core::package::PackageSpec;
use crate::core::workspace::Workspace;
use crate::util::diagnostic::Diagnostic;
use crate::util::process::ProcessOutput;
use crate::util::shell::{format_duration, Progress, Shell, Status};

/// Output of one package, held back until the package is done.
#[derive(Debug, Default)]
pub struct PackageLog {
    lines: Vec<(Status, String)>,
    events: Vec<BuildEvent>,
}

impl PackageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&mut self, status: Status, msg: impl Into<String>) {
        self.lines.push((status, msg.into()));
    }

    pub fn event(&mut self, event: BuildEvent) {
        self.events.push(event);
    }

    /// Write everything buffered as one uninterrupted block.
    pub fn flush(self, shell: &Shell) {
        if shell.is_json() {
            for event in &self.events {
                shell.json_event(&event.to_value());
            }
        } else {
            shell.status_block(&self.lines);
        }
    }
}

/// One package's progress through the pipeline.
#[derive(Debug)]
pub struct PackageRun {
    pub spec: PackageSpec,
    pub artifact: BuildArtifact,
    pub state: PackageState,
    /// Set when the package failed
    pub diagnostic: Option<Diagnostic>,
}

impl PackageRun {
    pub fn new(spec: PackageSpec, artifact: BuildArtifact) -> Self {
        PackageRun {
            spec,
            artifact,
            state: PackageState::Pending,
            diagnostic: None,
        }
    }

    fn advance(&mut self, next: PackageState, stage: Stage) -> Result<(), StageFailure> {
        self.state = self
            .state
            .advance(next)
            .map_err(|error| StageFailure { stage, error })?;
        Ok(())
    }

    fn fail(&mut self, failure: StageFailure) {
        let diagnostic = diagnostic_for(&failure.error).with_context(format!(
            "package `{}` failed at stage `{}`",
            self.spec.name, failure.stage
        ));

        match self.state.fail(failure.stage, diagnostic.message.clone()) {
            Ok(state) => self.state = state,
            Err(e) => tracing::error!("{:#}", e),
        }
        self.diagnostic = Some(diagnostic);
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, PackageState::Failed { .. })
    }

    /// The outcome reported for this package.
    pub fn outcome(&self) -> BuildOutcome {
        match &self.state {
            PackageState::Failed { stage, diagnostic } => {
                BuildOutcome::failed(&self.spec.name, *stage, diagnostic)
            }
            _ => BuildOutcome::ok(&self.spec.name),
        }
    }
}

/// A stage error tagged with the stage it came from.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: anyhow::Error,
}

impl StageFailure {
    fn at(stage: Stage) -> impl FnOnce(anyhow::Error) -> StageFailure {
        move |error| StageFailure { stage, error }
    }
}

/// Render any stage error for the user.
pub fn diagnostic_for(err: &anyhow::Error) -> Diagnostic {
    match err.downcast_ref::<BuildError>() {
        Some(build_err) => build_err.to_diagnostic(),
        None => Diagnostic::error(format!("{:#}", err)),
    }
}

/// Result of running the pipeline over a set of packages.
#[derive(Debug)]
pub struct PipelineReport {
    /// Packages that were started, in package order
    pub runs: Vec<PackageRun>,
    /// Packages skipped because an earlier package failed
    pub not_started: Vec<String>,
}

impl PipelineReport {
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            outcomes: self.runs.iter().map(PackageRun::outcome).collect(),
            not_started: self.not_started.clone(),
        }
    }

    pub fn all_linked(&self) -> bool {
        self.not_started.is_empty()
            && self
                .runs
                .iter()
                .all(|r| r.state == PackageState::Linked)
    }
}

/// Drives packages through the build stages.
pub struct Pipeline<'a> {
    ctx: &'a BuildContext,
    shell: Arc<Shell>,
    jobs: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(ctx: &'a BuildContext, shell: Arc<Shell>) -> Self {
        Pipeline {
            ctx,
            shell,
            jobs: 1,
        }
    }

    /// Number of packages built at once; 1 is sequential.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Build every package up to `Linked`.
    pub fn build(&self, ws: &Workspace, packages: &[PackageSpec]) -> Result<PipelineReport> {
        let progress = self.shell.progress(packages.len() as u64, "Building");
        let failed = AtomicBool::new(false);

        let build = |spec: &PackageSpec| -> Option<PackageRun> {
            if failed.load(Ordering::SeqCst) {
                return None;
            }
            let run = self.build_package(spec, ws.package_dir(&spec.name), &progress);
            if run.is_failed() {
                failed.store(true, Ordering::SeqCst);
            }
            progress.inc(1);
            Some(run)
        };

        let results: Vec<Option<PackageRun>> = if self.jobs > 1 && packages.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .context("failed to create build thread pool")?;
            pool.install(|| packages.par_iter().map(build).collect())
        } else {
            let mut results = Vec::with_capacity(packages.len());
            for spec in packages {
                results.push(build(spec));
            }
            results
        };
        progress.finish();

        let mut report = PipelineReport {
            runs: Vec::new(),
            not_started: Vec::new(),
        };
        for (spec, result) in packages.iter().zip(results) {
            match result {
                Some(run) => report.runs.push(run),
                None => report.not_started.push(spec.name.clone()),
            }
        }
        Ok(report)
    }

    fn build_package(
        &self,
        spec: &PackageSpec,
        package_dir: PathBuf,
        progress: &Progress,
    ) -> PackageRun {
        let artifact = BuildArtifact::plan(spec, &package_dir, &self.ctx.profile);
        let mut run = PackageRun::new(spec.clone(), artifact);
        let mut log = PackageLog::new();

        if let Err(failure) = self.run_stages(&mut run, &mut log) {
            let stage = failure.stage;
            run.fail(failure);
            log.status(
                Status::Error,
                format!("{} failed at stage `{}`", spec.name, stage),
            );
        }
        log.event(BuildEvent::package(run.outcome()));

        progress.suspend(|| log.flush(&self.shell));
        run
    }

    fn run_stages(&self, run: &mut PackageRun, log: &mut PackageLog) -> Result<(), StageFailure> {
        let name = run.spec.name.clone();

        log.status(Status::Compiling, format!("{} ({})", name, run.spec.source));
        let output = SharedLibraryBuilder::new(self.ctx)
            .build(&run.spec, &mut run.artifact)
            .map_err(StageFailure::at(Stage::BuildLibrary))?;
        run.advance(PackageState::LibraryBuilt, Stage::BuildLibrary)?;
        let mut produced = vec![run.artifact.shared_library_path.clone()];
        produced.extend(run.artifact.import_descriptor_path.iter().cloned());
        self.stage_done(log, &name, Stage::BuildLibrary, produced, Some(&output));

        log.status(Status::Generating, format!("{} bindings", name));
        let output = BindingGenerator::new(self.ctx)
            .generate(&run.spec, &run.artifact)
            .map_err(StageFailure::at(Stage::GenerateBindings))?;
        run.advance(PackageState::GlueGenerated, Stage::GenerateBindings)?;
        let glue = run.artifact.glue_source_path.clone();
        self.stage_done(log, &name, Stage::GenerateBindings, vec![glue.clone()], Some(&output));

        if !self.ctx.profile.exports_entry_points_by_default() {
            let outcome = SymbolPatch::default()
                .apply(&glue)
                .map_err(StageFailure::at(Stage::Patch))?;
            run.advance(PackageState::Patched, Stage::Patch)?;
            let msg = match outcome {
                PatchOutcome::Applied { inserted } => {
                    format!("{} ({} export marker(s) inserted)", name, inserted)
                }
                PatchOutcome::AlreadyPatched => format!("{} (already patched)", name),
            };
            log.status(Status::Patching, msg);
            self.stage_done(log, &name, Stage::Patch, vec![glue], None);
        }

        log.status(Status::Linking, format!("{} extension module", name));
        let output = ExtensionLinker::new(self.ctx)
            .link(&mut run.artifact)
            .map_err(StageFailure::at(Stage::Link))?;
        run.advance(PackageState::Linked, Stage::Link)?;
        let module: Vec<PathBuf> = run.artifact.compiled_module_path.iter().cloned().collect();
        self.stage_done(log, &name, Stage::Link, module, Some(&output));

        Ok(())
    }

    fn stage_done(
        &self,
        log: &mut PackageLog,
        package: &str,
        stage: Stage,
        filenames: Vec<PathBuf>,
        output: Option<&ProcessOutput>,
    ) {
        if let (true, Some(output)) = (self.shell.is_verbose(), output) {
            log.status(
                Status::Info,
                format!("{} {} took {}", package, stage, format_duration(output.elapsed)),
            );
        }
        let duration_ms = output.map(|o| o.elapsed.as_millis() as u64);
        log.event(BuildEvent::stage(package, stage, filenames, duration_ms));
    }

    /// Assemble every linked package into `<dist>/<bundle>/<package>/`.
    ///
    /// Returns the bundle manifest only when every package was packaged.
    /// Stops at the first package that fails.
    pub fn package(
        &self,
        ws: &Workspace,
        report: &mut PipelineReport,
        dist_dir: &Path,
    ) -> Option<BundleManifest> {
        let packager = ArtifactPackager::new(&self.ctx.profile, ws.manifest().include_patterns());
        let mut manifest = BundleManifest::new(ws.bundle_name(), &self.ctx.profile);

        for run in &mut report.runs {
            let mut log = PackageLog::new();
            let dest = ws.bundle_package_dir(dist_dir, &run.spec.name);

            let result = packager.declare(&run.artifact).and_then(|files| {
                packager.assemble_package(&run.artifact, &files, &dest, dist_dir)
            });

            let packaged = result
                .map_err(StageFailure::at(Stage::Package))
                .and_then(|entry| {
                    run.advance(PackageState::Packaged, Stage::Package)?;
                    Ok(entry)
                });

            match packaged {
                Ok(entry) => {
                    log.status(
                        Status::Packaging,
                        format!("{} ({} files)", run.spec.name, entry.files.len()),
                    );
                    log.event(BuildEvent::stage(
                        &run.spec.name,
                        Stage::Package,
                        vec![dest],
                        None,
                    ));
                    manifest.packages.push(entry);
                    log.flush(&self.shell);
                }
                Err(failure) => {
                    run.fail(failure);
                    log.status(
                        Status::Error,
                        format!("{} failed at stage `package`", run.spec.name),
                    );
                    log.event(BuildEvent::package(run.outcome()));
                    log.flush(&self.shell);
                    return None;
                }
            }
        }

        Some(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::BuildStatus;
    use crate::core::platform::{Os, PlatformProfile};

    fn run(name: &str) -> PackageRun {
        let spec = PackageSpec::new(name, format!("./{}", name));
        let artifact = BuildArtifact::plan(
            &spec,
            Path::new(name),
            &PlatformProfile::for_os(Os::Linux),
        );
        PackageRun::new(spec, artifact)
    }

    #[test]
    fn test_failure_records_stage_and_diagnostic() {
        let mut ta = run("ta");
        ta.advance(PackageState::LibraryBuilt, Stage::BuildLibrary).unwrap();
        ta.fail(StageFailure {
            stage: Stage::GenerateBindings,
            error: BuildError::ToolchainInvocation {
                command: "python3 banbta/ta/build.py".to_string(),
                reason: "failed with exit code 1".to_string(),
                stdout: String::new(),
                stderr: "ModuleNotFoundError: No module named 'pybindgen'".to_string(),
            }
            .into(),
        });

        let outcome = ta.outcome();
        assert_eq!(outcome.status, BuildStatus::Failed);
        assert_eq!(outcome.failed_stage, Some(Stage::GenerateBindings));

        let rendered = ta.diagnostic.unwrap().format(false);
        assert!(rendered.contains("No module named 'pybindgen'"));
        assert!(rendered.contains("failed at stage `generate-bindings`"));
    }

    #[test]
    fn test_out_of_order_transition_is_stage_failure() {
        let mut ta = run("ta");
        let err = ta.advance(PackageState::Linked, Stage::Link).unwrap_err();
        assert_eq!(err.stage, Stage::Link);
        assert_eq!(ta.state, PackageState::Pending);
    }

    #[test]
    fn test_report_outcome_counts_skipped_packages() {
        let mut ta = run("ta");
        ta.state = PackageState::Linked;
        let report = PipelineReport {
            runs: vec![ta],
            not_started: vec!["tav".to_string()],
        };

        assert!(!report.all_linked());
        assert!(!report.outcome().is_ok());
    }

    #[test]
    fn test_package_log_buffers_until_flush() {
        let mut log = PackageLog::new();
        log.status(Status::Compiling, "ta");
        log.event(BuildEvent::package(BuildOutcome::ok("ta")));
        assert_eq!(log.lines.len(), 1);
        assert_eq!(log.events.len(), 1);
        log.flush(&Shell::new(crate::util::shell::ShellMode::Json));
    }
}
