//! Configuration file support for bindforge.
//!
//! bindforge reads two configuration files:
//! - Global: `~/.bindforge/config.toml` - User-wide defaults
//! - Project: `.bindforge/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config; CLI flags take
//! precedence over both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// bindforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// External tool overrides
    pub toolchain: ToolchainSettings,

    /// Binding generator command
    pub generator: GeneratorConfig,

    /// Host runtime (Python) settings
    pub host: HostConfig,

    /// Extra environment variables passed to every tool
    pub env: BTreeMap<String, String>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Number of packages built in parallel (None = sequential)
    pub jobs: Option<usize>,

    /// Where the distributable layout is assembled
    pub dist_dir: Option<PathBuf>,
}

/// Tool locations and flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolchainSettings {
    /// Path to the Go toolchain (default: `go`)
    pub go: Option<PathBuf>,

    /// Path to the C compiler driver (default: `cc`, `cl` on Windows)
    pub cc: Option<PathBuf>,

    /// Additional `go build` flags
    pub go_flags: Vec<String>,

    /// Additional C compiler flags for the glue source
    pub cflags: Vec<String>,

    /// Additional linker flags for the extension module
    pub ldflags: Vec<String>,

    /// Directories appended to PATH for every tool invocation
    pub search_paths: Vec<PathBuf>,
}

/// Binding generator command.
///
/// `args` may contain the placeholders `{package}`, `{source}`, `{out_dir}`
/// and `{library}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GeneratorConfig {
    /// Generator program (default: the host Python interpreter)
    pub program: Option<PathBuf>,

    /// Generator arguments (default: `{out_dir}/build.py`)
    pub args: Option<Vec<String>>,
}

/// Host runtime settings.
///
/// When `module-suffix` is unset, the remaining values are probed from the
/// interpreter the first time a module is linked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HostConfig {
    /// Python interpreter (default: `python3`, `python` on Windows)
    pub python: Option<PathBuf>,

    /// Extension module file suffix (e.g. `.cpython-312-x86_64-linux-gnu.so`)
    pub module_suffix: Option<String>,

    /// Host runtime header directories
    pub include_dirs: Vec<PathBuf>,

    /// Host runtime library directories
    pub lib_dirs: Vec<PathBuf>,

    /// Host runtime libraries to link
    pub libs: Vec<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.dist_dir.is_some() {
            self.build.dist_dir = other.build.dist_dir;
        }

        if other.toolchain.go.is_some() {
            self.toolchain.go = other.toolchain.go;
        }
        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if !other.toolchain.go_flags.is_empty() {
            self.toolchain.go_flags = other.toolchain.go_flags;
        }
        if !other.toolchain.cflags.is_empty() {
            self.toolchain.cflags = other.toolchain.cflags;
        }
        if !other.toolchain.ldflags.is_empty() {
            self.toolchain.ldflags = other.toolchain.ldflags;
        }
        // Search paths accumulate: global entries first, then project entries
        self.toolchain
            .search_paths
            .extend(other.toolchain.search_paths);

        if other.generator.program.is_some() {
            self.generator.program = other.generator.program;
        }
        if other.generator.args.is_some() {
            self.generator.args = other.generator.args;
        }

        if other.host.python.is_some() {
            self.host.python = other.host.python;
        }
        if other.host.module_suffix.is_some() {
            self.host.module_suffix = other.host.module_suffix;
        }
        if !other.host.include_dirs.is_empty() {
            self.host.include_dirs = other.host.include_dirs;
        }
        if !other.host.lib_dirs.is_empty() {
            self.host.lib_dirs = other.host.lib_dirs;
        }
        if !other.host.libs.is_empty() {
            self.host.libs = other.host.libs;
        }

        self.env.extend(other.env);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.bindforge/config.toml)
/// 2. Global config (~/.bindforge/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global bindforge config directory (~/.bindforge).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".bindforge"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.build.jobs.is_none());
        assert!(config.toolchain.go.is_none());
        assert!(config.generator.args.is_none());
        assert!(config.host.module_suffix.is_none());
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[build]
jobs = 4
dist-dir = "wheelhouse"

[toolchain]
go = "/usr/local/go/bin/go"
go-flags = ["-trimpath"]
search-paths = ["/opt/mingw/bin"]

[generator]
program = "gopy"
args = ["gen", "-output={out_dir}", "{source}"]

[host]
module-suffix = ".cpython-312-x86_64-linux-gnu.so"
include-dirs = ["/usr/include/python3.12"]

[env]
GOFLAGS = "-mod=mod"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.build.jobs, Some(4));
        assert_eq!(config.build.dist_dir, Some(PathBuf::from("wheelhouse")));
        assert_eq!(config.toolchain.go, Some(PathBuf::from("/usr/local/go/bin/go")));
        assert_eq!(config.toolchain.go_flags, vec!["-trimpath"]);
        assert_eq!(config.generator.program, Some(PathBuf::from("gopy")));
        assert_eq!(config.generator.args.as_ref().map(|a| a.len()), Some(3));
        assert_eq!(
            config.host.module_suffix.as_deref(),
            Some(".cpython-312-x86_64-linux-gnu.so")
        );
        assert_eq!(config.env.get("GOFLAGS").map(String::as_str), Some("-mod=mod"));
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.build.jobs = Some(2);
        base.toolchain.go = Some(PathBuf::from("go"));
        base.toolchain.search_paths = vec![PathBuf::from("/global/bin")];
        base.env.insert("A".into(), "global".into());

        let mut project = Config::default();
        project.toolchain.go = Some(PathBuf::from("/opt/go/bin/go"));
        project.toolchain.search_paths = vec![PathBuf::from("/project/bin")];
        project.env.insert("A".into(), "project".into());

        base.merge(project);

        assert_eq!(base.build.jobs, Some(2)); // Not overridden
        assert_eq!(base.toolchain.go, Some(PathBuf::from("/opt/go/bin/go")));
        assert_eq!(
            base.toolchain.search_paths,
            vec![PathBuf::from("/global/bin"), PathBuf::from("/project/bin")]
        );
        assert_eq!(base.env["A"], "project");
    }

    #[test]
    fn test_load_config_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");
        std::fs::write(&global, "[toolchain]\ncc = \"gcc\"\n[build]\njobs = 8\n").unwrap();
        std::fs::write(&project, "[toolchain]\ncc = \"clang\"\n").unwrap();

        let config = load_config(&global, &project);
        assert_eq!(config.toolchain.cc, Some(PathBuf::from("clang")));
        assert_eq!(config.build.jobs, Some(8));
    }

    #[test]
    fn test_invalid_config_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[build]\njobs = \"many\"\n").unwrap();

        let config = Config::load_or_default(&path);
        assert!(config.build.jobs.is_none());
    }
}
