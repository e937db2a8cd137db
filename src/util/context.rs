//! Global context for bindforge operations.
//!
//! Provides centralized access to the working directory, configuration
//! paths and manifest discovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::{find_manifest as dir_find_manifest, ManifestError};
use crate::util::config::{global_config_dir, load_config, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global bindforge data (~/.bindforge/)
    home: PathBuf,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let home = global_config_dir().unwrap_or_else(|| PathBuf::from(".bindforge"));
        GlobalContext { cwd, home }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the bindforge home directory (~/.bindforge/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the project configuration file path for a workspace root.
    pub fn project_config_path(&self, root: &Path) -> PathBuf {
        root.join(".bindforge").join("config.toml")
    }

    /// Load the merged global + project configuration for a workspace root.
    pub fn load_config(&self, root: &Path) -> Config {
        load_config(&self.config_path(), &self.project_config_path(root))
    }

    /// Find the manifest file (Bindforge.toml) starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestError> {
        let mut current = self.cwd.clone();
        loop {
            match dir_find_manifest(&current) {
                Ok(path) => return Ok(path),
                Err(ManifestError::NotFound { .. }) => {
                    if !current.pop() {
                        return Err(ManifestError::NotFound {
                            dir: self.cwd.clone(),
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_manifest_walks_upward() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join("Bindforge.toml");
        std::fs::write(&manifest, "[packages]\nta = \"./ta\"\n").unwrap();
        let nested = tmp.path().join("python").join("ta");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested);
        assert_eq!(ctx.find_manifest().ok(), Some(manifest));
    }

    #[test]
    fn test_find_manifest_not_found() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf());

        // A manifest further up the real filesystem would make this flaky,
        // so only assert on the error variant when nothing was found.
        if let Err(e) = ctx.find_manifest() {
            assert!(matches!(e, ManifestError::NotFound { .. }));
        }
    }

    #[test]
    fn test_config_paths() {
        let ctx = GlobalContext {
            cwd: PathBuf::from("/work"),
            home: PathBuf::from("/home/u/.bindforge"),
        };

        assert_eq!(ctx.config_path(), PathBuf::from("/home/u/.bindforge/config.toml"));
        assert_eq!(
            ctx.project_config_path(Path::new("/work")),
            PathBuf::from("/work/.bindforge/config.toml")
        );
    }
}
