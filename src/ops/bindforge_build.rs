//! Implementation of `bindforge build`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};

use crate::builder::events::BuildEvent;
use crate::builder::{BuildContext, Pipeline};
use crate::core::artifact::RunOutcome;
use crate::core::package::PackageSpec;
use crate::core::platform::PlatformProfile;
use crate::core::Workspace;
use crate::util::config::Config;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::remove_file_if_exists;
use crate::util::shell::{format_duration, Shell, Status};

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Specific packages to build (empty = all)
    pub packages: Vec<String>,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Distribution directory, overriding `build.dist-dir`
    pub dist_dir: Option<PathBuf>,

    /// Stop after linking
    pub no_package: bool,
}

/// Result of a build run.
#[derive(Debug)]
pub struct BuildResult {
    /// Per-package outcomes in package order
    pub outcome: RunOutcome,

    /// Diagnostics of failed packages, first failure first
    pub diagnostics: Vec<Diagnostic>,

    /// The bundle manifest written by a fully successful run
    pub bundle_manifest: Option<PathBuf>,
}

impl BuildResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Select packages to build based on the filter.
///
/// If no packages are specified, returns every package in the manifest.
/// Errors if a specified package is not found in the workspace.
pub fn select_packages(ws: &Workspace, filter: &[String]) -> Result<Vec<PackageSpec>> {
    let all = ws.manifest().packages();
    if filter.is_empty() {
        return Ok(all.to_vec());
    }

    for name in filter {
        if !all.iter().any(|p| &p.name == name) {
            let names: Vec<&str> = all.iter().map(|p| p.name.as_str()).collect();
            bail!(
                "package `{}` not found in workspace\n\
                 available packages: {}\n\
                 {}",
                name,
                if names.is_empty() {
                    "(none)".to_string()
                } else {
                    names.join(", ")
                },
                suggestions::PACKAGE_NOT_FOUND
            );
        }
    }

    // Keep manifest order so runs are deterministic however the filter is spelled
    Ok(all
        .iter()
        .filter(|p| filter.contains(&p.name))
        .cloned()
        .collect())
}

/// Build the workspace.
pub fn build(
    ws: &Workspace,
    config: Config,
    shell: Arc<Shell>,
    opts: &BuildOptions,
) -> Result<BuildResult> {
    let start = Instant::now();
    let packages = select_packages(ws, &opts.packages)?;

    // The profile is resolved before any tool runs
    let profile = PlatformProfile::host()?;
    let jobs = opts.jobs.or(config.build.jobs).unwrap_or(1);
    let dist_dir = ws.dist_dir(opts.dist_dir.as_deref().or(config.build.dist_dir.as_deref()));
    if !opts.no_package {
        ws.check_dist_dir(&dist_dir)?;
    }
    let ctx = BuildContext::new(profile, config, ws.root())?;

    tracing::debug!("build context: {:?}", ctx);

    let manifest_path = ws.bundle_manifest_path(&dist_dir);
    if remove_file_if_exists(&manifest_path)? {
        tracing::debug!("removed stale {}", manifest_path.display());
    }

    if shell.is_json() {
        shell.json_event(
            &BuildEvent::started(ctx.profile.os.as_str(), packages.len() as u64).to_value(),
        );
    }

    let pipeline = Pipeline::new(&ctx, Arc::clone(&shell)).jobs(jobs);
    let mut report = pipeline.build(ws, &packages)?;

    let mut bundle_manifest = None;
    if report.all_linked() && !opts.no_package {
        if let Some(manifest) = pipeline.package(ws, &mut report, &dist_dir) {
            manifest.write(&manifest_path)?;
            bundle_manifest = Some(manifest_path);
        }
    }

    let outcome = report.outcome();
    let diagnostics: Vec<Diagnostic> = report
        .runs
        .iter()
        .filter_map(|run| run.diagnostic.clone())
        .collect();

    let elapsed = start.elapsed();
    if shell.is_json() {
        for diagnostic in &diagnostics {
            shell.json_event(
                &BuildEvent::from_diagnostic(diagnostic).to_value(),
            );
        }
        let finished = BuildEvent::finished(outcome.is_ok(), elapsed.as_millis() as u64)
            .with_bundle_manifest(bundle_manifest.clone());
        shell.json_event(&finished.to_value());
    } else if outcome.is_ok() {
        let what = if opts.no_package { "link" } else { "bundle" };
        shell.status(
            Status::Finished,
            format!(
                "{} {} for {} package(s) in {}",
                ws.bundle_name(),
                what,
                outcome.outcomes.len(),
                format_duration(elapsed)
            ),
        );
    }

    if !report.not_started.is_empty() {
        tracing::info!("not started: {}", report.not_started.join(", "));
    }

    Ok(BuildResult {
        outcome,
        diagnostics,
        bundle_manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::Manifest;
    use std::path::Path;

    fn workspace() -> Workspace {
        let manifest = Manifest::parse(
            r#"
[bundle]
name = "banbta"

[packages]
tav = "github.com/banbox/banta/python/tav"
ta = "github.com/banbox/banta/python/ta"
"#,
            Path::new("/work/Bindforge.toml"),
        )
        .unwrap();
        Workspace::new(Path::new("/work/Bindforge.toml"), manifest)
    }

    #[test]
    fn test_select_all_packages() {
        let ws = workspace();
        let selected = select_packages(&ws, &[]).unwrap();
        let names: Vec<_> = selected.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ta", "tav"]);
    }

    #[test]
    fn test_select_keeps_manifest_order() {
        let ws = workspace();
        let selected = select_packages(&ws, &["tav".to_string(), "ta".to_string()]).unwrap();
        let names: Vec<_> = selected.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ta", "tav"]);
    }

    #[test]
    fn test_select_unknown_package() {
        let ws = workspace();
        let err = select_packages(&ws, &["nope".to_string()]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("package `nope` not found"));
        assert!(msg.contains("available packages: ta, tav"));
    }
}
