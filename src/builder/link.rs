//! Extension module link stage.

use anyhow::Result;

use crate::builder::context::BuildContext;
use crate::builder::errors::BuildError;
use crate::builder::host::HostRuntime;
use crate::builder::toolchain::ExtensionLinkInput;
use crate::core::artifact::BuildArtifact;
use crate::util::fs::{is_nonempty_file, remove_file_if_exists};
use crate::util::process::ProcessOutput;

/// Compiles and links glue source against the package's shared library.
pub struct ExtensionLinker<'a> {
    ctx: &'a BuildContext,
}

impl<'a> ExtensionLinker<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        ExtensionLinker { ctx }
    }

    /// The link input for a package, with host runtime settings resolved.
    pub fn link_input(&self, artifact: &BuildArtifact) -> Result<ExtensionLinkInput, BuildError> {
        let host = self.ctx.host_runtime()?;
        Ok(self.link_input_for(artifact, &host))
    }

    /// The link input for a package against a known host runtime.
    pub fn link_input_for(
        &self,
        artifact: &BuildArtifact,
        host: &HostRuntime,
    ) -> ExtensionLinkInput {
        let settings = &self.ctx.config.toolchain;

        let mut input = ExtensionLinkInput::new(
            artifact.glue_source_path.clone(),
            artifact.module_path(&host.module_suffix),
            artifact.package_dir.clone(),
            artifact.library_stem.clone(),
            &self.ctx.profile,
        );
        input.include_dirs = host.include_dirs.clone();
        input.lib_dirs = host.lib_dirs.clone();
        input.libs = host.libs.clone();
        input.cflags = settings.cflags.clone();
        input.ldflags = settings.ldflags.clone();
        input
    }

    /// Link the module and record its path on the artifact.
    pub fn link(&self, artifact: &mut BuildArtifact) -> Result<ProcessOutput> {
        let input = self.link_input(artifact)?;
        remove_file_if_exists(&input.output)?;

        let spec = self.ctx.toolchain().link_extension_command(&input);
        let cmd = self.ctx.command(spec).cwd(&artifact.package_dir);
        let output = cmd.exec_and_check()?;

        if !is_nonempty_file(&input.output) {
            return Err(BuildError::missing_output(&cmd, &output, &input.output).into());
        }

        artifact.compiled_module_path = Some(input.output);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::BuildEnv;
    use crate::core::package::PackageSpec;
    use crate::core::platform::{Os, PlatformProfile};
    use crate::util::config::Config;
    use std::path::{Path, PathBuf};

    fn context(os: Os) -> BuildContext {
        let mut config = Config::default();
        config.host.module_suffix = Some(".cpython-312-x86_64-linux-gnu.so".to_string());
        config.host.include_dirs = vec![PathBuf::from("/usr/include/python3.12")];
        config.toolchain.cflags = vec!["-O2".to_string()];
        BuildContext::with_env(
            PlatformProfile::for_os(os),
            config,
            BuildEnv::default(),
            Path::new("/work"),
        )
    }

    #[test]
    fn test_link_input_paths() {
        let ctx = context(Os::Linux);
        let spec = PackageSpec::new("ta", "./ta");
        let artifact = BuildArtifact::plan(&spec, Path::new("/work/banbta/ta"), &ctx.profile);

        let input = ExtensionLinker::new(&ctx).link_input(&artifact).unwrap();
        assert_eq!(
            input.output,
            Path::new("/work/banbta/ta/_ta.cpython-312-x86_64-linux-gnu.so")
        );
        assert_eq!(input.library_stem, "ta_go");
        assert_eq!(input.include_dirs, vec![PathBuf::from("/usr/include/python3.12")]);
        assert_eq!(input.cflags, vec!["-O2"]);
        assert_eq!(input.runtime_search_path_flag.as_deref(), Some("-Wl,-rpath,$ORIGIN"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_compiler_reports_diagnostics() {
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.host.module_suffix = Some(".so".to_string());
        config.toolchain.cc = Some(PathBuf::from("false"));
        let ctx = BuildContext::with_env(
            PlatformProfile::for_os(Os::Linux),
            config,
            BuildEnv::default(),
            tmp.path(),
        );

        let spec = PackageSpec::new("ta", "./ta");
        let mut artifact = BuildArtifact::plan(&spec, tmp.path(), &ctx.profile);
        let err = ExtensionLinker::new(&ctx).link(&mut artifact).unwrap_err();

        assert!(err.to_string().contains("-lta_go"));
        assert_eq!(artifact.compiled_module_path, None);
    }
}
