use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

/// Static port-connection analysis and flat wiring conversion
#[derive(Parser, Debug)]
#[command(name = "portwire", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (YAML). Defaults to portwire.yaml in the project root
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the component hierarchy and resolved port connections
    Analyze(AnalyzeArgs),
    /// Rewrite C++ sources to flat wiring from an exported analysis
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Root component class, e.g. PartitionCls
    pub root_class: String,

    /// Directory holding the *Pkg package directories
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// Write the analysis as JSON for `convert`
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Override the hop bound for forwarding and getter chains
    #[arg(long)]
    pub max_depth: Option<usize>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("mode").required(true).args(["dry_run", "apply"])))]
pub struct ConvertArgs {
    /// JSON file written by `analyze --export-json`
    pub json_file: PathBuf,

    /// Preview changes without modifying files
    #[arg(long)]
    pub dry_run: bool,

    /// Apply changes to the C++ files
    #[arg(long)]
    pub apply: bool,

    /// Do not keep .bak copies of modified files
    #[arg(long)]
    pub no_backup: bool,
}
