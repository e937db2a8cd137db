//! Host runtime (CPython) discovery.
//!
//! The extension linker needs the interpreter's headers, the library
//! directory on Windows, and the module file suffix. They come from the
//! `[host]` config section when `module-suffix` is set there, otherwise the
//! interpreter is asked once through `sysconfig`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::builder::context::BuildEnv;
use crate::builder::errors::BuildError;
use crate::util::config::HostConfig;
use crate::util::process::ProcessBuilder;

const PROBE_SCRIPT: &str = r#"import json, os, sys, sysconfig
paths = sysconfig.get_paths()
include_dirs = [paths["include"]]
if paths.get("platinclude") and paths["platinclude"] not in include_dirs:
    include_dirs.append(paths["platinclude"])
lib_dirs = [os.path.join(sys.prefix, "libs")] if os.name == "nt" else []
print(json.dumps({
    "include_dirs": include_dirs,
    "lib_dirs": lib_dirs,
    "module_suffix": sysconfig.get_config_var("EXT_SUFFIX"),
}))
"#;

/// Build settings of the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostRuntime {
    /// Header directories (`Python.h`)
    pub include_dirs: Vec<PathBuf>,
    /// Library directories
    #[serde(default)]
    pub lib_dirs: Vec<PathBuf>,
    /// Libraries to link
    #[serde(default)]
    pub libs: Vec<String>,
    /// Extension module suffix (`.cpython-312-x86_64-linux-gnu.so`)
    pub module_suffix: String,
}

impl HostRuntime {
    /// Fully configured host runtime, if config pins the module suffix.
    pub fn from_config(config: &HostConfig) -> Option<Self> {
        config.module_suffix.as_ref().map(|suffix| HostRuntime {
            include_dirs: config.include_dirs.clone(),
            lib_dirs: config.lib_dirs.clone(),
            libs: config.libs.clone(),
            module_suffix: suffix.clone(),
        })
    }

    /// Ask the interpreter for its build settings.
    ///
    /// Values set in `config` override the probed ones.
    pub fn probe(python: &Path, config: &HostConfig, env: &BuildEnv) -> Result<Self, BuildError> {
        let cmd = env.apply(ProcessBuilder::new(python).arg("-c").arg(PROBE_SCRIPT));
        let output = cmd.exec_and_check()?;

        let mut runtime = Self::parse_probe(&output.stdout_lossy())
            .map_err(|e| BuildError::invalid_output(&cmd, &output, e))?;

        if !config.include_dirs.is_empty() {
            runtime.include_dirs = config.include_dirs.clone();
        }
        if !config.lib_dirs.is_empty() {
            runtime.lib_dirs = config.lib_dirs.clone();
        }
        if !config.libs.is_empty() {
            runtime.libs = config.libs.clone();
        }

        tracing::debug!(
            "host runtime: suffix {} includes {:?}",
            runtime.module_suffix,
            runtime.include_dirs
        );
        Ok(runtime)
    }

    /// Parse the probe's JSON line.
    fn parse_probe(stdout: &str) -> Result<Self, String> {
        let line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| "no output".to_string())?;

        let runtime: HostRuntime = serde_json::from_str(line.trim()).map_err(|e| e.to_string())?;
        if runtime.module_suffix.is_empty() {
            return Err("empty module suffix".to_string());
        }
        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let runtime = HostRuntime::parse_probe(
            "{\"include_dirs\": [\"/usr/include/python3.12\"], \"lib_dirs\": [], \"module_suffix\": \".cpython-312-x86_64-linux-gnu.so\"}\n",
        )
        .unwrap();

        assert_eq!(runtime.include_dirs, vec![PathBuf::from("/usr/include/python3.12")]);
        assert!(runtime.libs.is_empty());
        assert_eq!(runtime.module_suffix, ".cpython-312-x86_64-linux-gnu.so");
    }

    #[test]
    fn test_parse_probe_rejects_garbage() {
        assert!(HostRuntime::parse_probe("").is_err());
        assert!(HostRuntime::parse_probe("Python 3.12.1").is_err());
        assert!(HostRuntime::parse_probe(
            "{\"include_dirs\": [], \"module_suffix\": null}"
        )
        .is_err());
    }

    #[test]
    fn test_from_config_requires_suffix() {
        let mut config = HostConfig::default();
        assert_eq!(HostRuntime::from_config(&config), None);

        config.module_suffix = Some(".so".to_string());
        config.include_dirs = vec![PathBuf::from("/opt/py/include")];
        let runtime = HostRuntime::from_config(&config).unwrap();
        assert_eq!(runtime.module_suffix, ".so");
        assert_eq!(runtime.include_dirs, vec![PathBuf::from("/opt/py/include")]);
    }

    #[test]
    fn test_missing_interpreter_is_toolchain_error() {
        let env = BuildEnv::default();
        let err = HostRuntime::probe(
            Path::new("bindforge-no-such-python"),
            &HostConfig::default(),
            &env,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::ToolchainInvocation { .. }));
    }
}
