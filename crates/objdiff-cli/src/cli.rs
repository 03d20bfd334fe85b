use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "objdiff",
    about = "Diff and replay persisted object graph snapshots",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the objects and properties that changed between two snapshots
    Diff(DiffArgs),
    /// Show the changes as a tree below a root object
    Tree(TreeArgs),
    /// Replay the diff onto the old snapshot and check it yields the new one
    Replay(ReplayArgs),
    /// Rewrite a snapshot file in parent-before-child order
    Normalize(NormalizeArgs),
}

#[derive(Args)]
pub struct SnapshotPair {
    /// Snapshot file of the old revision
    pub old: PathBuf,
    /// Snapshot file of the new revision
    pub new: PathBuf,
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub snapshots: SnapshotPair,
    /// Drop the added workspace root, re-parenting its children onto this id
    #[arg(long, value_name = "WORKSPACE_ID")]
    pub omit_root: Option<String>,
    #[arg(long, requires = "omit_root")]
    pub new_root: Option<String>,
}

#[derive(Args)]
pub struct TreeArgs {
    #[command(flatten)]
    pub snapshots: SnapshotPair,
    /// Object to root the tree at; defaults to `root_id` from the config
    #[arg(short, long)]
    pub root: Option<String>,
}

#[derive(Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub snapshots: SnapshotPair,
    /// Send old values along with new ones so conflicts are detected
    #[arg(long)]
    pub conditional: bool,
    /// Print every persist call instead of applying them
    #[arg(long)]
    pub show_ops: bool,
}

#[derive(Args)]
pub struct NormalizeArgs {
    pub snapshot: PathBuf,
    /// Write here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
