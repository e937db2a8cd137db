//! Workspace - the manifest and the paths derived from it.
//!
//! Per-package build directories live under the bundle's output directory
//! (`<root>/<out-dir>/<package>/`), which is also where the binding
//! generator's `build.py` scripts are expected.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::manifest::{Manifest, ManifestError};
use crate::util::fs::normalize_path;

/// Name of the distributable bundle manifest written into the dist dir.
pub const BUNDLE_MANIFEST_NAME: &str = "bundle.json";

/// A loaded manifest and its root directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: Manifest,
    bundle_name: String,
    out_dir: PathBuf,
}

impl Workspace {
    /// Load the workspace rooted at a manifest path.
    pub fn load(manifest_path: &Path) -> Result<Self, ManifestError> {
        let manifest = Manifest::load(manifest_path)?;
        Ok(Self::new(manifest_path, manifest))
    }

    /// Create a workspace from an already parsed manifest.
    pub fn new(manifest_path: &Path, manifest: Manifest) -> Self {
        let root = manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let bundle_name = manifest
            .bundle
            .name
            .clone()
            .or_else(|| {
                root.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "bundle".to_string());

        let out_dir = root.join(
            manifest
                .bundle
                .out_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&bundle_name)),
        );

        Workspace {
            root,
            manifest_path: manifest_path.to_path_buf(),
            manifest,
            bundle_name,
            out_dir,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Distributable package name.
    pub fn bundle_name(&self) -> &str {
        &self.bundle_name
    }

    /// Directory holding the per-package build directories.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Directory owned by one package's build.
    pub fn package_dir(&self, package: &str) -> PathBuf {
        self.out_dir.join(package)
    }

    /// Resolve the dist directory: an explicit value wins, relative paths
    /// are taken from the workspace root.
    pub fn dist_dir(&self, configured: Option<&Path>) -> PathBuf {
        match configured {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => self.root.join(dir),
            None => self.root.join("dist"),
        }
    }

    /// Where a package is assembled inside the dist directory.
    pub fn bundle_package_dir(&self, dist_dir: &Path, package: &str) -> PathBuf {
        dist_dir.join(&self.bundle_name).join(package)
    }

    /// Path of the bundle manifest inside the dist directory.
    pub fn bundle_manifest_path(&self, dist_dir: &Path) -> PathBuf {
        dist_dir.join(BUNDLE_MANIFEST_NAME)
    }

    /// Check that the bundle layout under `dist_dir` stays clear of the
    /// build's own directories.
    ///
    /// Assembly replaces `<dist>/<bundle>/<package>/` wholesale and
    /// `clean --dist` removes `<dist>/<bundle>/`. Neither may contain the
    /// root, the out dir or a package dir, nor sit inside a package dir.
    pub fn check_dist_dir(&self, dist_dir: &Path) -> Result<()> {
        let package_dirs: Vec<PathBuf> = self
            .manifest
            .packages()
            .iter()
            .map(|p| normalize_path(&self.package_dir(&p.name)))
            .collect();
        let mut protected = vec![normalize_path(&self.root), normalize_path(&self.out_dir)];
        protected.extend(package_dirs.iter().cloned());

        let mut targets = vec![dist_dir.join(&self.bundle_name)];
        targets.extend(
            self.manifest
                .packages()
                .iter()
                .map(|p| self.bundle_package_dir(dist_dir, &p.name)),
        );

        for target in targets {
            let target = normalize_path(&target);
            let contained = protected.iter().find(|p| p.starts_with(&target));
            let enclosing = package_dirs.iter().find(|p| target.starts_with(p));
            if let Some(owned) = contained.or(enclosing) {
                bail!(
                    "dist directory `{}` overlaps build output `{}`\n\
                     help: choose a dist directory outside `{}`",
                    dist_dir.display(),
                    owned.display(),
                    self.out_dir.display()
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(manifest: &str) -> Workspace {
        let path = Path::new("/work/banta/Bindforge.toml");
        Workspace::new(path, Manifest::parse(manifest, path).unwrap())
    }

    #[test]
    fn test_defaults_from_root_dir() {
        let ws = workspace("[packages]\nta = \"./ta\"\n");
        assert_eq!(ws.bundle_name(), "banta");
        assert_eq!(ws.out_dir(), Path::new("/work/banta/banta"));
        assert_eq!(ws.package_dir("ta"), Path::new("/work/banta/banta/ta"));
        assert_eq!(ws.dist_dir(None), Path::new("/work/banta/dist"));
    }

    #[test]
    fn test_bundle_section_overrides() {
        let ws = workspace(
            "[bundle]\nname = \"banbta\"\nout-dir = \"python/banbta\"\n[packages]\nta = \"./ta\"\n",
        );
        assert_eq!(ws.bundle_name(), "banbta");
        assert_eq!(ws.package_dir("ta"), Path::new("/work/banta/python/banbta/ta"));

        let dist = ws.dist_dir(Some(Path::new("out")));
        assert_eq!(dist, Path::new("/work/banta/out"));
        assert_eq!(
            ws.bundle_package_dir(&dist, "ta"),
            Path::new("/work/banta/out/banbta/ta")
        );
        assert_eq!(
            ws.bundle_manifest_path(&dist),
            Path::new("/work/banta/out/bundle.json")
        );
    }

    fn workspace_in(root: &Path) -> Workspace {
        let path = root.join("Bindforge.toml");
        let manifest =
            Manifest::parse("[bundle]\nname = \"banbta\"\n[packages]\nta = \"./ta\"\n", &path)
                .unwrap();
        Workspace::new(&path, manifest)
    }

    #[test]
    fn test_dist_dir_default_is_clear() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ws = workspace_in(tmp.path());
        ws.check_dist_dir(&ws.dist_dir(None)).unwrap();
        ws.check_dist_dir(&ws.dist_dir(Some(Path::new("banbta")))).unwrap();
    }

    #[test]
    fn test_dist_dir_at_root_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ws = workspace_in(tmp.path());
        std::fs::create_dir_all(ws.package_dir("ta")).unwrap();

        // <root>/banbta/ta is the package's own build directory
        let err = ws.check_dist_dir(&ws.dist_dir(Some(Path::new(".")))).unwrap_err();
        assert!(err.to_string().contains("overlaps build output"));
    }

    #[test]
    fn test_dist_dir_inside_package_dir_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ws = workspace_in(tmp.path());

        let dist = ws.dist_dir(Some(Path::new("banbta/ta/dist")));
        assert!(ws.check_dist_dir(&dist).is_err());
    }
}
