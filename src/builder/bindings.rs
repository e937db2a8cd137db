//! Binding generation stage.
//!
//! Runs the configured generator once per package. The generator inspects
//! the package's exported interface and writes `<pkgdir>/<name>.c`.
//!
//! Generator arguments may use these placeholders:
//!
//! | placeholder | value                                   |
//! |-------------|-----------------------------------------|
//! | `{package}` | package name                            |
//! | `{source}`  | source location from the manifest       |
//! | `{out_dir}` | the package's output directory          |
//! | `{library}` | the shared library just built           |

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::context::BuildContext;
use crate::builder::errors::BuildError;
use crate::builder::toolchain::CommandSpec;
use crate::core::artifact::BuildArtifact;
use crate::core::package::PackageSpec;
use crate::util::config::GeneratorConfig;
use crate::util::fs::{is_nonempty_file, remove_file_if_exists};
use crate::util::process::ProcessOutput;

const DEFAULT_GENERATOR_ARGS: &[&str] = &["{out_dir}/build.py"];

/// The generator program and its argument templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl GeneratorCommand {
    /// Resolve the generator from config, defaulting to `<python> {out_dir}/build.py`.
    pub fn from_config(config: &GeneratorConfig, python: PathBuf) -> Self {
        GeneratorCommand {
            program: config.program.clone().unwrap_or(python),
            args: config.args.clone().unwrap_or_else(|| {
                DEFAULT_GENERATOR_ARGS.iter().map(|s| s.to_string()).collect()
            }),
        }
    }

    /// The concrete command for one package.
    pub fn expand(&self, package: &PackageSpec, artifact: &BuildArtifact) -> CommandSpec {
        CommandSpec::new(&self.program).args(
            self.args
                .iter()
                .map(|arg| expand_placeholders(arg, package, artifact)),
        )
    }
}

fn expand_placeholders(template: &str, package: &PackageSpec, artifact: &BuildArtifact) -> String {
    template
        .replace("{package}", &package.name)
        .replace("{source}", &package.source)
        .replace("{out_dir}", &artifact.package_dir.display().to_string())
        .replace("{library}", &artifact.shared_library_path.display().to_string())
}

/// Generates the C glue source for each package.
pub struct BindingGenerator<'a> {
    ctx: &'a BuildContext,
    command: GeneratorCommand,
}

impl<'a> BindingGenerator<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        let command = GeneratorCommand::from_config(&ctx.config.generator, ctx.python());
        BindingGenerator { ctx, command }
    }

    /// Run the generator and check that it produced non-empty glue source.
    pub fn generate(
        &self,
        package: &PackageSpec,
        artifact: &BuildArtifact,
    ) -> Result<ProcessOutput> {
        // A stale file from an earlier run must not pass the output check
        remove_file_if_exists(&artifact.glue_source_path)?;

        let cmd = self
            .ctx
            .command(self.command.expand(package, artifact))
            .cwd(&self.ctx.workspace_root);
        let output = cmd.exec_and_check()?;

        if !is_nonempty_file(&artifact.glue_source_path) {
            let glue = &artifact.glue_source_path;
            return Err(BuildError::missing_output(&cmd, &output, glue).into());
        }

        Ok(output)
    }
}
