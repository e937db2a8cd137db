//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use bindforge::util::shell::ColorChoice;

/// bindforge - builds Go packages into importable Python extension modules
#[derive(Parser)]
#[command(name = "bindforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every package and assemble the bundle
    Build(BuildArgs),

    /// Show the resolved platform, artifact paths and commands
    Plan(PlanArgs),

    /// Remove generated artifacts
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Number of packages built in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Build only the named package (repeatable)
    #[arg(short, long = "package", value_name = "NAME")]
    pub packages: Vec<String>,

    /// Distribution directory for the bundle
    #[arg(long, value_name = "DIR")]
    pub dist: Option<PathBuf>,

    /// Stop after linking; do not assemble the bundle
    #[arg(long)]
    pub no_package: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Show only the named package (repeatable)
    #[arg(short, long = "package", value_name = "NAME")]
    pub packages: Vec<String>,

    /// Distribution directory for the bundle
    #[arg(long, value_name = "DIR")]
    pub dist: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Clean only the named package (repeatable)
    #[arg(short, long = "package", value_name = "NAME")]
    pub packages: Vec<String>,

    /// Also remove the bundle from the dist directory
    #[arg(long)]
    pub dist: bool,

    /// Distribution directory to clean
    #[arg(long, value_name = "DIR", requires = "dist")]
    pub dist_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}
