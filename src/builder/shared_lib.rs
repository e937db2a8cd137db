//! Shared library stage: `go build -buildmode=c-shared`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::builder::context::BuildContext;
use crate::builder::errors::BuildError;
use crate::core::artifact::BuildArtifact;
use crate::core::package::PackageSpec;
use crate::util::fs::{ensure_dir, is_nonempty_file, remove_file_if_exists};
use crate::util::process::ProcessOutput;

/// Builds one platform shared library per package.
pub struct SharedLibraryBuilder<'a> {
    ctx: &'a BuildContext,
}

impl<'a> SharedLibraryBuilder<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        SharedLibraryBuilder { ctx }
    }

    /// Build the shared library and, where the platform needs one, move the
    /// emitted link-time descriptor to its canonical path.
    pub fn build(
        &self,
        package: &PackageSpec,
        artifact: &mut BuildArtifact,
    ) -> Result<ProcessOutput> {
        ensure_dir(&artifact.package_dir)?;
        // Outputs of an earlier run must not pass the output check
        remove_file_if_exists(&artifact.shared_library_path)?;
        remove_file_if_exists(&artifact.emitted_descriptor_path())?;

        let spec = self
            .ctx
            .go
            .shared_library_command(&artifact.shared_library_path, &package.source);
        let cmd = self.ctx.command(spec).cwd(&self.ctx.workspace_root);
        let output = cmd.exec_and_check()?;

        if !is_nonempty_file(&artifact.shared_library_path) {
            return Err(
                BuildError::missing_output(&cmd, &output, &artifact.shared_library_path).into(),
            );
        }

        if let Some(canonical) = artifact.canonical_descriptor_path(&self.ctx.profile) {
            let emitted = artifact.emitted_descriptor_path();
            if promote_import_descriptor(&emitted, &canonical)? {
                tracing::debug!("import descriptor at {}", canonical.display());
            } else if canonical.is_file() {
                tracing::warn!(
                    "{}: no import descriptor emitted, keeping existing {}",
                    package.name,
                    canonical.display()
                );
            } else {
                tracing::debug!("{}: no import descriptor emitted", package.name);
            }
            artifact.import_descriptor_path = canonical.is_file().then_some(canonical);
        }

        Ok(output)
    }
}

/// Move `emitted` to `canonical`, replacing any previous descriptor.
///
/// Returns `false` without touching anything when `emitted` does not exist.
pub fn promote_import_descriptor(emitted: &Path, canonical: &Path) -> Result<bool> {
    if !emitted.is_file() {
        return Ok(false);
    }

    remove_file_if_exists(canonical)?;
    fs::rename(emitted, canonical).with_context(|| {
        format!(
            "failed to rename {} to {}",
            emitted.display(),
            canonical.display()
        )
    })?;
    Ok(true)
}
