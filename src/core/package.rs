//! Package specifications.

use std::fmt;

use serde::Serialize;

/// One source package to turn into an extension module.
///
/// Defined statically in the manifest and never mutated during a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageSpec {
    /// Module name; also names the package's output directory
    pub name: String,
    /// Go import path or filesystem path handed to `go build`
    pub source: String,
}

impl PackageSpec {
    /// Create a new package spec.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        PackageSpec {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Stem of the shared library built from this package (`ta` -> `ta_go`).
    pub fn library_stem(&self) -> String {
        format!("{}_go", self.name)
    }

    /// Name of the importable extension module (`ta` -> `_ta`).
    pub fn module_name(&self) -> String {
        format!("_{}", self.name)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.source)
    }
}

/// Check that a package name is usable as a module name and directory.
pub fn is_valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names() {
        let spec = PackageSpec::new("tav", "github.com/banbox/banta/python/tav");
        assert_eq!(spec.library_stem(), "tav_go");
        assert_eq!(spec.module_name(), "_tav");
    }

    #[test]
    fn test_valid_package_names() {
        assert!(is_valid_package_name("ta"));
        assert!(is_valid_package_name("_private"));
        assert!(is_valid_package_name("ta2"));
        assert!(!is_valid_package_name(""));
        assert!(!is_valid_package_name("2ta"));
        assert!(!is_valid_package_name("ta-v"));
        assert!(!is_valid_package_name("../ta"));
    }
}
