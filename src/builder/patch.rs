//! Export-visibility patching of generated glue source.
//!
//! MSVC does not export a DLL's module initializer unless it is marked
//! `__declspec(dllexport)`. The patch inserts that marker before every
//! initializer declaration that does not already carry it, so applying it
//! to patched source changes nothing.

use std::path::Path;

use anyhow::Result;

use crate::builder::errors::BuildError;
use crate::util::fs::{read_to_string, write_atomic};

/// Text that introduces the module initializer (`PyObject* PyInit__ta(void)`).
pub const INIT_PATTERN: &str = " PyInit_";

/// Visibility marker inserted before [`INIT_PATTERN`].
pub const EXPORT_MARKER: &str = " __declspec(dllexport)";

/// What a patch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Markers were inserted before this many occurrences.
    Applied { inserted: usize },
    /// Every occurrence already carried the marker.
    AlreadyPatched,
}

/// A textual insertion keyed on a pattern.
#[derive(Debug, Clone, Copy)]
pub struct SymbolPatch {
    pub pattern: &'static str,
    pub marker: &'static str,
}

impl Default for SymbolPatch {
    fn default() -> Self {
        SymbolPatch {
            pattern: INIT_PATTERN,
            marker: EXPORT_MARKER,
        }
    }
}

impl SymbolPatch {
    /// Patch source text.
    ///
    /// Returns `None` when the pattern does not occur at all.
    pub fn apply_to_str(&self, source: &str) -> Option<(String, PatchOutcome)> {
        let mut out = String::with_capacity(source.len() + self.marker.len());
        let mut inserted = 0;
        let mut found = false;
        let mut last = 0;

        for (idx, _) in source.match_indices(self.pattern) {
            found = true;
            out.push_str(&source[last..idx]);
            if !source[..idx].ends_with(self.marker) {
                out.push_str(self.marker);
                inserted += 1;
            }
            last = idx;
        }

        if !found {
            return None;
        }
        out.push_str(&source[last..]);

        if inserted == 0 {
            Some((source.to_string(), PatchOutcome::AlreadyPatched))
        } else {
            Some((out, PatchOutcome::Applied { inserted }))
        }
    }

    /// Patch a file in place. The file is only rewritten when something was
    /// inserted.
    pub fn apply(&self, path: &Path) -> Result<PatchOutcome> {
        let source = read_to_string(path)?;

        let Some((patched, outcome)) = self.apply_to_str(&source) else {
            return Err(BuildError::PatchApplication {
                path: path.to_path_buf(),
                pattern: self.pattern.to_string(),
            }
            .into());
        };

        if let PatchOutcome::Applied { inserted } = outcome {
            write_atomic(path, patched.as_bytes())?;
            tracing::debug!("inserted {} export marker(s) in {}", inserted, path.display());
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const GLUE: &str = "#include <Python.h>\n\
        PyMODINIT_FUNC\n\
        #if PY_VERSION_HEX >= 0x03000000\n\
        PyObject* PyInit__ta(void)\n\
        #else\n\
        void init_ta(void)\n\
        #endif\n\
        {\n    return PyModule_Create(&ta_moduledef);\n}\n";

    #[test]
    fn test_patch_inserts_marker_before_each_occurrence() {
        let source = "PyObject* PyInit__ta(void);\nPyObject* PyInit__ta(void)\n{\n}\n";
        let (patched, outcome) = SymbolPatch::default().apply_to_str(source).unwrap();

        assert_eq!(outcome, PatchOutcome::Applied { inserted: 2 });
        assert_eq!(
            patched,
            "PyObject* __declspec(dllexport) PyInit__ta(void);\n\
             PyObject* __declspec(dllexport) PyInit__ta(void)\n{\n}\n"
        );
        assert_eq!(patched.matches(EXPORT_MARKER).count(), 2);
    }

    #[test]
    fn test_patch_is_idempotent() {
        let patch = SymbolPatch::default();
        let (once, _) = patch.apply_to_str(GLUE).unwrap();
        let (twice, outcome) = patch.apply_to_str(&once).unwrap();

        assert_eq!(outcome, PatchOutcome::AlreadyPatched);
        assert_eq!(once, twice);
        assert_eq!(once.matches(EXPORT_MARKER).count(), 1);
    }

    #[test]
    fn test_partially_patched_source_is_completed() {
        let source = "PyObject* __declspec(dllexport) PyInit__ta(void);\nPyObject* PyInit__ta(void)\n";
        let (patched, outcome) = SymbolPatch::default().apply_to_str(source).unwrap();

        assert_eq!(outcome, PatchOutcome::Applied { inserted: 1 });
        assert_eq!(patched.matches(EXPORT_MARKER).count(), 2);
    }

    #[test]
    fn test_apply_patches_file_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ta.c");
        fs::write(&path, GLUE).unwrap();

        let patch = SymbolPatch::default();
        assert_eq!(patch.apply(&path).unwrap(), PatchOutcome::Applied { inserted: 1 });
        let first = fs::read(&path).unwrap();

        assert_eq!(patch.apply(&path).unwrap(), PatchOutcome::AlreadyPatched);
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_already_patched_file_is_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ta.c");
        let patched = GLUE.replace(" PyInit_", " __declspec(dllexport) PyInit_");
        fs::write(&path, &patched).unwrap();
        let before = fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(
            SymbolPatch::default().apply(&path).unwrap(),
            PatchOutcome::AlreadyPatched
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), patched);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_missing_pattern_is_patch_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ta.c");
        fs::write(&path, "int main(void) { return 0; }\n").unwrap();

        let err = SymbolPatch::default().apply(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::PatchApplication { pattern, .. }) if pattern == INIT_PATTERN
        ));
    }
}
