//! Artifact packaging.
//!
//! Declares which files of each package directory ship in the bundle and
//! assembles them under `<dist>/<bundle>/<package>/`. Shared libraries are
//! selected by the platform's pattern only; another platform's library
//! extension is never declared, even when a previous build left one behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::artifact::BuildArtifact;
use crate::core::platform::PlatformProfile;
use crate::util::fs::{
    ensure_dir, glob_files, relative_path, remove_dir_all_if_exists, write_atomic,
};
use crate::util::hash::sha256_file;

/// Declares and assembles per-package artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPackager<'a> {
    profile: &'a PlatformProfile,
    include: Vec<String>,
}

/// One file in the bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the dist directory, `/`-separated
    pub path: String,
    pub sha256: String,
}

/// One package in the bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub name: String,
    pub files: Vec<FileEntry>,
}

/// Contents of `bundle.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub bundle: String,
    pub platform: String,
    pub packages: Vec<PackageEntry>,
}

impl<'a> ArtifactPackager<'a> {
    /// Create a packager; `include` lists extra patterns shipped per package.
    pub fn new(profile: &'a PlatformProfile, include: Vec<String>) -> Self {
        ArtifactPackager { profile, include }
    }

    /// The files of one package that belong in the bundle, sorted.
    pub fn declare(&self, artifact: &BuildArtifact) -> Result<Vec<PathBuf>> {
        let foreign = self.profile.foreign_library_extensions();
        let is_foreign = |path: &Path| {
            path.extension()
                .map(|ext| foreign.iter().any(|f| ext == *f))
                .unwrap_or(false)
        };

        let mut patterns = vec![self.profile.library_glob()];
        patterns.extend(self.include.iter().cloned());

        let mut files: Vec<PathBuf> = glob_files(&artifact.package_dir, &patterns)?
            .into_iter()
            .filter(|p| !is_foreign(p))
            .collect();

        // Added by name: macOS modules end in `.so`
        files.extend(artifact.compiled_module_path.iter().cloned());
        files.extend(artifact.import_descriptor_path.iter().cloned());

        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Copy declared files into `dest`, replacing whatever was there.
    ///
    /// Digests are recorded with paths relative to `dist_dir`.
    pub fn assemble_package(
        &self,
        artifact: &BuildArtifact,
        files: &[PathBuf],
        dest: &Path,
        dist_dir: &Path,
    ) -> Result<PackageEntry> {
        remove_dir_all_if_exists(dest)?;
        ensure_dir(dest)?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let name = file
                .file_name()
                .with_context(|| format!("not a file: {}", file.display()))?;
            let target = dest.join(name);
            fs::copy(file, &target).with_context(|| {
                format!("failed to copy {} to {}", file.display(), target.display())
            })?;

            entries.push(FileEntry {
                path: relative_path(dist_dir, &target)
                    .to_string_lossy()
                    .replace('\\', "/"),
                sha256: sha256_file(&target)?,
            });
        }

        Ok(PackageEntry {
            name: artifact.package_name.clone(),
            files: entries,
        })
    }
}

impl BundleManifest {
    pub fn new(bundle: impl Into<String>, profile: &PlatformProfile) -> Self {
        BundleManifest {
            bundle: bundle.into(),
            platform: profile.os.to_string(),
            packages: Vec::new(),
        }
    }

    /// Write the manifest as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut json =
            serde_json::to_string_pretty(self).context("failed to serialize bundle manifest")?;
        json.push('\n');
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        write_atomic(path, json.as_bytes())
    }
}
