//! Implementation of `bindforge plan`.
//!
//! Shows what a build would do without running anything: the resolved
//! platform profile, every artifact path, the exact commands and where each
//! tool resolves on the build PATH.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::builder::bindings::GeneratorCommand;
use crate::builder::host::HostRuntime;
use crate::builder::toolchain::CommandSpec;
use crate::builder::{BuildContext, ExtensionLinker};
use crate::core::artifact::BuildArtifact;
use crate::core::platform::PlatformProfile;
use crate::core::Workspace;
use crate::ops::bindforge_build::select_packages;
use crate::util::config::Config;
use crate::util::process::{find_executable_in, ProcessBuilder};

/// Options for the plan command.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Specific packages to show (empty = all)
    pub packages: Vec<String>,

    /// Distribution directory, overriding `build.dist-dir`
    pub dist_dir: Option<PathBuf>,
}

/// A tool and where it resolves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolLocation {
    pub name: String,
    pub program: PathBuf,
    pub resolved: Option<PathBuf>,
}

/// Planned paths and commands for one package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackagePlan {
    pub name: String,
    pub source: String,
    pub artifact: BuildArtifact,
    /// Canonical import descriptor, on platforms that use one
    pub import_descriptor: Option<PathBuf>,
    /// `None` until the host module suffix is known
    pub module: Option<PathBuf>,
    pub patch: bool,
    pub commands: Vec<String>,
}

/// The full build plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildPlan {
    pub bundle: String,
    pub platform: PlatformProfile,
    pub out_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    pub tools: Vec<ToolLocation>,
    pub packages: Vec<PackagePlan>,
}

/// Resolve the build plan for the workspace.
pub fn plan(ws: &Workspace, config: Config, opts: &PlanOptions) -> Result<BuildPlan> {
    let packages = select_packages(ws, &opts.packages)?;
    let profile = PlatformProfile::host()?;
    let dist_dir = ws.dist_dir(opts.dist_dir.as_deref().or(config.build.dist_dir.as_deref()));
    let ctx = BuildContext::new(profile, config, ws.root())?;

    let generator = GeneratorCommand::from_config(&ctx.config.generator, ctx.python());
    // Only configured host settings; planning never runs the interpreter
    let host = HostRuntime::from_config(&ctx.config.host);
    let linker = ExtensionLinker::new(&ctx);
    let patch = !ctx.profile.exports_entry_points_by_default();

    let mut planned = Vec::with_capacity(packages.len());
    for spec in &packages {
        let mut artifact = BuildArtifact::plan(spec, &ws.package_dir(&spec.name), &ctx.profile);
        let import_descriptor = artifact.canonical_descriptor_path(&ctx.profile);

        let mut commands = vec![
            display(ctx.go.shared_library_command(&artifact.shared_library_path, &spec.source)),
            display(generator.expand(spec, &artifact)),
        ];

        let module = host.as_ref().map(|host| {
            let input = linker.link_input_for(&artifact, host);
            commands.push(display(ctx.toolchain().link_extension_command(&input)));
            input.output
        });
        artifact.compiled_module_path = module.clone();

        planned.push(PackagePlan {
            name: spec.name.clone(),
            source: spec.source.clone(),
            artifact,
            import_descriptor,
            module,
            patch,
            commands,
        });
    }

    let search_path = ctx.env.get("PATH");
    let tools = [
        ("go", ctx.go.go.clone()),
        ("generator", generator.program.clone()),
        ("cc", ctx.toolchain().compiler_path().to_path_buf()),
        ("python", ctx.python()),
    ]
    .into_iter()
    .map(|(name, program)| ToolLocation {
        name: name.to_string(),
        resolved: find_executable_in(&program, search_path, ws.root()),
        program,
    })
    .collect();

    Ok(BuildPlan {
        bundle: ws.bundle_name().to_string(),
        platform: ctx.profile.clone(),
        out_dir: ws.out_dir().to_path_buf(),
        dist_dir,
        env: ctx.env.vars().clone(),
        tools,
        packages: planned,
    })
}

fn display(spec: CommandSpec) -> String {
    ProcessBuilder::from_spec(spec).display_command()
}

/// Format the plan for display.
pub fn format_plan(plan: &BuildPlan) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Bundle `{}` for {}\n",
        plan.bundle,
        plan.platform.os.as_str()
    ));
    out.push_str(&format!("  out dir:  {}\n", plan.out_dir.display()));
    out.push_str(&format!("  dist dir: {}\n", plan.dist_dir.display()));

    out.push_str("\nTools:\n");
    for tool in &plan.tools {
        let location = match &tool.resolved {
            Some(path) => path.display().to_string(),
            None => "not found".to_string(),
        };
        out.push_str(&format!(
            "  {:<10} {} ({})\n",
            tool.name,
            tool.program.display(),
            location
        ));
    }

    out.push_str("\nEnvironment:\n");
    for (key, value) in &plan.env {
        out.push_str(&format!("  {}={}\n", key, value));
    }

    for package in &plan.packages {
        out.push_str(&format!("\nPackage `{}` ({})\n", package.name, package.source));
        out.push_str(&format!(
            "  library: {}\n",
            package.artifact.shared_library_path.display()
        ));
        if let Some(descriptor) = &package.import_descriptor {
            out.push_str(&format!("  import:  {}\n", descriptor.display()));
        }
        out.push_str(&format!(
            "  glue:    {}\n",
            package.artifact.glue_source_path.display()
        ));
        match &package.module {
            Some(module) => out.push_str(&format!("  module:  {}\n", module.display())),
            None => out.push_str("  module:  (suffix probed from the host at link time)\n"),
        }
        if package.patch {
            out.push_str("  patch:   export markers added to module entry points\n");
        }
        for (index, command) in package.commands.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", index + 1, command));
        }
    }

    if plan.packages.is_empty() {
        out.push_str("\n  (no packages)\n");
    }

    out
}
