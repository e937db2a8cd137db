//! `bindforge plan` command

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::PlanArgs;
use bindforge::core::Workspace;
use bindforge::ops::bindforge_plan::{format_plan, plan, PlanOptions};
use bindforge::util::{GlobalContext, Shell};

pub fn execute(args: PlanArgs, shell: Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let manifest_path = ctx.find_manifest()?;
    let ws = Workspace::load(&manifest_path)?;
    let config = ctx.load_config(ws.root());

    let opts = PlanOptions {
        packages: args.packages,
        dist_dir: args.dist,
    };
    let plan = plan(&ws, config, &opts)?;

    if shell.is_json() {
        let json = serde_json::to_string_pretty(&plan).context("failed to serialize build plan")?;
        println!("{}", json);
    } else {
        print!("{}", format_plan(&plan));
    }

    Ok(())
}
