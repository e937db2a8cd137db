//! Bindforge.toml manifest parsing and schema.
//!
//! The manifest holds the static package-name to source-location map and
//! the name of the distributable bundle:
//!
//! ```toml
//! [bundle]
//! name = "banbta"
//!
//! [packages]
//! ta = "github.com/banbox/banta/python/ta"
//! tav = "github.com/banbox/banta/python/tav"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::core::package::{is_valid_package_name, PackageSpec};

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Bindforge.toml";

/// Errors raised while locating or reading the manifest.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ManifestError {
    #[error("could not find `Bindforge.toml` in `{}` or any parent directory", .dir.display())]
    #[diagnostic(
        code(bindforge::manifest::not_found),
        help("Create a Bindforge.toml with a [packages] table")
    )]
    NotFound { dir: PathBuf },

    #[error("failed to read `{}`", .path.display())]
    #[diagnostic(code(bindforge::manifest::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse `{}`: {message}", .path.display())]
    #[diagnostic(code(bindforge::manifest::parse))]
    Parse { path: PathBuf, message: String },

    #[error("`{}` declares no packages", .path.display())]
    #[diagnostic(
        code(bindforge::manifest::empty),
        help("Add entries like `ta = \"github.com/you/project/ta\"` under [packages]")
    )]
    NoPackages { path: PathBuf },

    #[error("invalid package name `{name}`")]
    #[diagnostic(
        code(bindforge::manifest::invalid_name),
        help("Package names become module names: letters, digits and `_`, no leading digit")
    )]
    InvalidPackageName { name: String },

    #[error("package `{name}` has an empty source location")]
    #[diagnostic(code(bindforge::manifest::empty_source))]
    EmptySource { name: String },
}

/// The `[bundle]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BundleSection {
    /// Distributable package name (defaults to the manifest directory name)
    pub name: Option<String>,

    /// Directory holding per-package build output, relative to the manifest
    pub out_dir: Option<PathBuf>,

    /// Extra file patterns shipped with each package
    pub include: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    bundle: BundleSection,

    #[serde(default)]
    packages: BTreeMap<String, String>,
}

/// A parsed and validated manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// The `[bundle]` section
    pub bundle: BundleSection,

    /// Packages in name order
    packages: Vec<PackageSpec>,
}

/// Default extra patterns: the generated Python wrappers.
const DEFAULT_INCLUDE: &[&str] = &["*.py"];

impl Manifest {
    /// Load and validate a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Parse and validate manifest text. `path` is only used in errors.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(contents).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;

        if raw.packages.is_empty() {
            return Err(ManifestError::NoPackages {
                path: path.to_path_buf(),
            });
        }

        let mut packages = Vec::with_capacity(raw.packages.len());
        for (name, source) in raw.packages {
            if !is_valid_package_name(&name) {
                return Err(ManifestError::InvalidPackageName { name });
            }
            if source.trim().is_empty() {
                return Err(ManifestError::EmptySource { name });
            }
            packages.push(PackageSpec::new(name, source.trim()));
        }

        Ok(Manifest {
            bundle: raw.bundle,
            packages,
        })
    }

    /// All packages, sorted by name.
    pub fn packages(&self) -> &[PackageSpec] {
        &self.packages
    }

    /// Extra patterns shipped with each package.
    pub fn include_patterns(&self) -> Vec<String> {
        match &self.bundle.include {
            Some(patterns) => patterns.clone(),
            None => DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Find the manifest in a directory (no upward search).
pub fn find_manifest(dir: &Path) -> Result<PathBuf, ManifestError> {
    let path = dir.join(MANIFEST_NAME);
    if path.is_file() {
        Ok(path)
    } else {
        Err(ManifestError::NotFound {
            dir: dir.to_path_buf(),
        })
    }
}
