//! bindforge CLI - builds Go packages into Python extension modules

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bindforge::builder::BuildError;
use bindforge::core::ManifestError;
use bindforge::util::diagnostic::emit;
use bindforge::util::Shell;

mod cli;
mod commands;

use cli::{Cli, Commands, MessageFormat};

fn main() {
    let cli = Cli::parse();

    // Set up logging; stdout stays free for JSON and completions
    let filter = if cli.verbose {
        EnvFilter::new("bindforge=debug")
    } else {
        EnvFilter::new("bindforge=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Arc::new(Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    ));

    if let Err(e) = run(cli, Arc::clone(&shell)) {
        report(e, &shell);
        std::process::exit(1);
    }
}

fn run(cli: Cli, shell: Arc<Shell>) -> Result<()> {
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, shell),
        Commands::Plan(args) => commands::plan::execute(args, shell),
        Commands::Clean(args) => commands::clean::execute(args, shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

fn report(err: anyhow::Error, shell: &Shell) {
    if let Some(build_err) = err.downcast_ref::<BuildError>() {
        emit(&build_err.to_diagnostic(), shell.use_color());
        return;
    }

    match err.downcast::<ManifestError>() {
        Ok(manifest_err) => eprintln!("{:?}", miette::Report::new(manifest_err)),
        Err(err) => eprintln!("error: {:#}", err),
    }
}
