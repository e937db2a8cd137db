//! Build context - platform profile, tools, environment and host runtime.
//!
//! Everything a stage needs is reached through the [`BuildContext`]; no stage
//! reads the process environment, the working directory or the host OS on
//! its own.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::builder::errors::BuildError;
use crate::builder::host::HostRuntime;
use crate::builder::toolchain::{select_toolchain, CommandSpec, GoToolchain, Toolchain};
use crate::core::platform::{Os, PlatformProfile};
use crate::util::config::Config;
use crate::util::process::ProcessBuilder;

/// Environment overrides applied to every external command.
///
/// Built once per run; the caller's own environment passes through
/// untouched apart from these variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    /// Build the environment from config and a snapshot of the inherited PATH.
    pub fn new(config: &Config, inherited_path: Option<OsString>) -> Result<Self> {
        let mut vars = BTreeMap::new();
        vars.insert("CGO_ENABLED".to_string(), "1".to_string());
        vars.insert("CGO_LDFLAGS_ALLOW".to_string(), ".*".to_string());

        if !config.toolchain.search_paths.is_empty() {
            let mut entries: Vec<PathBuf> = inherited_path
                .as_deref()
                .map(|p| std::env::split_paths(p).collect())
                .unwrap_or_default();
            entries.extend(config.toolchain.search_paths.iter().cloned());

            let joined = std::env::join_paths(entries)
                .context("toolchain.search-paths contains an invalid PATH entry")?;
            vars.insert("PATH".to_string(), joined.to_string_lossy().into_owned());
        }

        for (key, value) in &config.env {
            vars.insert(key.clone(), value.clone());
        }

        Ok(BuildEnv { vars })
    }

    /// Build the environment from config and the current process PATH.
    pub fn from_process(config: &Config) -> Result<Self> {
        Self::new(config, std::env::var_os("PATH"))
    }

    /// The overrides, sorted by name.
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Apply the overrides to a command.
    pub fn apply(&self, pb: ProcessBuilder) -> ProcessBuilder {
        pb.envs(self.vars.iter())
    }
}

/// Build context shared by every package of a run.
pub struct BuildContext {
    /// Platform conventions, resolved once
    pub profile: PlatformProfile,

    /// Environment for every external command
    pub env: BuildEnv,

    /// Go toolchain
    pub go: GoToolchain,

    /// C compiler driver for the extension link
    pub toolchain: Arc<dyn Toolchain>,

    /// Merged configuration
    pub config: Config,

    /// Working directory for the binding generator
    pub workspace_root: PathBuf,

    /// Host runtime, resolved at the first link
    host: Mutex<Option<HostRuntime>>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("profile", &self.profile)
            .field("env", &self.env)
            .field("go", &self.go)
            .field("toolchain", &self.toolchain.platform())
            .field("workspace_root", &self.workspace_root)
            .finish()
    }
}

impl BuildContext {
    /// Create a build context for a resolved platform.
    pub fn new(profile: PlatformProfile, config: Config, workspace_root: &Path) -> Result<Self> {
        let env = BuildEnv::from_process(&config)?;
        Ok(Self::with_env(profile, config, env, workspace_root))
    }

    /// Create a build context with an explicit environment.
    pub fn with_env(
        profile: PlatformProfile,
        config: Config,
        env: BuildEnv,
        workspace_root: &Path,
    ) -> Self {
        let go = GoToolchain::new(
            config.toolchain.go.as_deref(),
            config.toolchain.go_flags.clone(),
        );
        let toolchain: Arc<dyn Toolchain> =
            Arc::from(select_toolchain(config.toolchain.cc.as_deref(), &profile));
        let host = HostRuntime::from_config(&config.host);

        BuildContext {
            profile,
            env,
            go,
            toolchain,
            config,
            workspace_root: workspace_root.to_path_buf(),
            host: Mutex::new(host),
        }
    }

    /// Get the active C toolchain.
    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    /// The host interpreter used for probing and as the default generator.
    pub fn python(&self) -> PathBuf {
        self.config
            .host
            .python
            .clone()
            .unwrap_or_else(|| default_python(&self.profile))
    }

    /// A process builder for a toolchain command, with the build environment.
    pub fn command(&self, spec: CommandSpec) -> ProcessBuilder {
        self.env.apply(ProcessBuilder::from_spec(spec))
    }

    /// The host runtime, probing the interpreter on first use.
    ///
    /// Concurrent callers wait for a single probe.
    pub fn host_runtime(&self) -> Result<HostRuntime, BuildError> {
        let mut guard = self.host.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(runtime) = guard.as_ref() {
            return Ok(runtime.clone());
        }

        let runtime = HostRuntime::probe(&self.python(), &self.config.host, &self.env)?;
        *guard = Some(runtime.clone());
        Ok(runtime)
    }
}

/// Default host interpreter name for a platform.
pub fn default_python(profile: &PlatformProfile) -> PathBuf {
    match profile.os {
        Os::Windows => PathBuf::from("python"),
        Os::Linux | Os::MacOs => PathBuf::from("python3"),
    }
}
