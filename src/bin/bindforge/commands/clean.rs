//! `bindforge clean` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::CleanArgs;
use bindforge::core::Workspace;
use bindforge::ops::bindforge_clean::{clean, CleanOptions};
use bindforge::util::shell::{Shell, Status};
use bindforge::util::GlobalContext;

pub fn execute(args: CleanArgs, shell: Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let manifest_path = ctx.find_manifest()?;
    let ws = Workspace::load(&manifest_path)?;
    let config = ctx.load_config(ws.root());

    let opts = CleanOptions {
        packages: args.packages,
        dist: args.dist,
        dist_dir: args.dist_dir,
    };
    let result = clean(&ws, &config, &opts)?;

    for path in &result.removed {
        tracing::debug!("removed {}", path.display());
    }
    shell.status(
        Status::Removed,
        format!("{} generated item(s)", result.removed.len()),
    );

    Ok(())
}
