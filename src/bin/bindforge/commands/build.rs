//! `bindforge build` command

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::BuildArgs;
use bindforge::core::Workspace;
use bindforge::ops::bindforge_build::{build, BuildOptions};
use bindforge::util::diagnostic::{emit, suggestions};
use bindforge::util::shell::{Shell, Status};
use bindforge::util::GlobalContext;

pub fn execute(args: BuildArgs, shell: Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let manifest_path = ctx.find_manifest()?;
    let ws = Workspace::load(&manifest_path)?;

    // Configuration (global + project); CLI flags override it in the op
    let config = ctx.load_config(ws.root());

    let opts = BuildOptions {
        packages: args.packages,
        jobs: args.jobs,
        dist_dir: args.dist,
        no_package: args.no_package,
    };

    let result = build(&ws, config, Arc::clone(&shell), &opts)?;

    if result.is_ok() {
        if let Some(path) = &result.bundle_manifest {
            shell.status(Status::Packaged, path.display());
        }
        return Ok(());
    }

    if !shell.is_json() {
        for diagnostic in &result.diagnostics {
            emit(diagnostic, shell.use_color());
        }
    }

    let failed = result.outcome.failed_count();
    match result.outcome.first_failure() {
        Some(first) => bail!(
            "could not build `{}`: {} package(s) failed, first `{}` at stage `{}`\n{}",
            ws.bundle_name(),
            failed,
            first.package_name,
            first
                .failed_stage
                .map(|s| s.as_str())
                .unwrap_or("unknown"),
            suggestions::BUILD_FAILED
        ),
        None => bail!("could not build `{}`", ws.bundle_name()),
    }
}
