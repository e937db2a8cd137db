//! Build artifacts, per-package state and run outcomes.
//!
//! Every path in a [`BuildArtifact`] is a pure function of the package
//! directory, the package name and the [`PlatformProfile`], so two runs with
//! the same inputs always agree on file names.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;

use crate::core::package::PackageSpec;
use crate::core::platform::PlatformProfile;

/// Files produced for one package in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildArtifact {
    pub package_name: String,
    /// Directory owned exclusively by this package's build
    pub package_dir: PathBuf,
    /// Shared library stem (`ta_go`)
    pub library_stem: String,
    pub shared_library_path: PathBuf,
    /// Set once the import descriptor is in place at its canonical path
    pub import_descriptor_path: Option<PathBuf>,
    pub glue_source_path: PathBuf,
    /// Set once the extension module has been linked
    pub compiled_module_path: Option<PathBuf>,
}

impl BuildArtifact {
    /// Plan the artifact paths for a package.
    pub fn plan(package: &PackageSpec, package_dir: &Path, profile: &PlatformProfile) -> Self {
        let stem = package.library_stem();
        BuildArtifact {
            package_name: package.name.clone(),
            package_dir: package_dir.to_path_buf(),
            shared_library_path: package_dir.join(profile.library_file_name(&stem)),
            library_stem: stem,
            import_descriptor_path: None,
            glue_source_path: package_dir.join(format!("{}.c", package.name)),
            compiled_module_path: None,
        }
    }

    /// Header emitted by the Go toolchain next to the shared library.
    pub fn header_path(&self) -> PathBuf {
        self.shared_library_path.with_extension("h")
    }

    /// Link-time descriptor as emitted by the Go toolchain (`ta_go.dll.a`).
    pub fn emitted_descriptor_path(&self) -> PathBuf {
        let mut name = self.shared_library_path.as_os_str().to_os_string();
        name.push(".a");
        PathBuf::from(name)
    }

    /// Canonical import descriptor path, on platforms that use one.
    pub fn canonical_descriptor_path(&self, profile: &PlatformProfile) -> Option<PathBuf> {
        profile
            .import_descriptor_file_name(&self.library_stem)
            .map(|name| self.package_dir.join(name))
    }

    /// Extension module path for a host module suffix.
    pub fn module_path(&self, module_suffix: &str) -> PathBuf {
        self.package_dir
            .join(format!("_{}{}", self.package_name, module_suffix))
    }
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    BuildLibrary,
    GenerateBindings,
    Patch,
    Link,
    Package,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BuildLibrary => "build-library",
            Stage::GenerateBindings => "generate-bindings",
            Stage::Patch => "patch",
            Stage::Link => "link",
            Stage::Package => "package",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a package is in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageState {
    Pending,
    LibraryBuilt,
    GlueGenerated,
    Patched,
    Linked,
    Packaged,
    Failed { stage: Stage, diagnostic: String },
}

impl PackageState {
    /// Move to the next state, rejecting out-of-order transitions.
    pub fn advance(&self, next: PackageState) -> Result<PackageState> {
        use PackageState::*;

        let allowed = matches!(
            (self, &next),
            (Pending, LibraryBuilt)
                | (LibraryBuilt, GlueGenerated)
                | (GlueGenerated, Patched)
                | (GlueGenerated, Linked)
                | (Patched, Linked)
                | (Linked, Packaged)
        ) || (matches!(next, Failed { .. }) && !self.is_terminal());

        if !allowed {
            bail!("invalid package state transition: {} -> {}", self, next);
        }
        Ok(next)
    }

    /// Record a failure at `stage`.
    pub fn fail(&self, stage: Stage, diagnostic: impl Into<String>) -> Result<PackageState> {
        self.advance(PackageState::Failed {
            stage,
            diagnostic: diagnostic.into(),
        })
    }

    /// `Packaged` and `Failed` have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PackageState::Packaged | PackageState::Failed { .. })
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageState::Pending => f.write_str("pending"),
            PackageState::LibraryBuilt => f.write_str("library-built"),
            PackageState::GlueGenerated => f.write_str("glue-generated"),
            PackageState::Patched => f.write_str("patched"),
            PackageState::Linked => f.write_str("linked"),
            PackageState::Packaged => f.write_str("packaged"),
            PackageState::Failed { stage, .. } => write!(f, "failed({})", stage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Ok,
    Failed,
}

/// Result of building one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildOutcome {
    pub package_name: String,
    pub status: BuildStatus,
    pub failed_stage: Option<Stage>,
    pub diagnostic: Option<String>,
}

impl BuildOutcome {
    pub fn ok(package_name: impl Into<String>) -> Self {
        BuildOutcome {
            package_name: package_name.into(),
            status: BuildStatus::Ok,
            failed_stage: None,
            diagnostic: None,
        }
    }

    pub fn failed(
        package_name: impl Into<String>,
        stage: Stage,
        diagnostic: impl Into<String>,
    ) -> Self {
        BuildOutcome {
            package_name: package_name.into(),
            status: BuildStatus::Failed,
            failed_stage: Some(stage),
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == BuildStatus::Ok
    }
}

/// Aggregated result of a run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunOutcome {
    /// Outcomes of every package that was started, in package order
    pub outcomes: Vec<BuildOutcome>,
    /// Packages never started because an earlier package failed
    pub not_started: Vec<String>,
}

impl RunOutcome {
    /// A run is ok only if every package was built and every outcome is ok.
    pub fn is_ok(&self) -> bool {
        self.not_started.is_empty() && self.outcomes.iter().all(BuildOutcome::is_ok)
    }

    /// The first failed package, in package order.
    pub fn first_failure(&self) -> Option<&BuildOutcome> {
        self.outcomes.iter().find(|o| !o.is_ok())
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }
}
