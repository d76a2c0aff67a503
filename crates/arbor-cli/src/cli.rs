use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arbor",
    about = "Arbor: a content-addressed, versioned, mergeable tree store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store configuration file (defaults to ./arbor.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Trees are named by the hex key of their root node, or `empty`.
#[derive(Subcommand)]
pub enum Command {
    /// Set the contents at a path; prints the new root
    Put(PutArgs),
    /// Print the contents at a path
    Get(PathArgs),
    /// List the children of the node at a path
    Ls(PathArgs),
    /// Remove the subtree at a path; prints the new root
    Rm(PathArgs),
    /// Three-way merge of tree roots
    Merge(MergeArgs),
    /// Record a tree as a commit
    Commit(CommitArgs),
    /// Merge two commits through their common ancestor
    MergeCommits(MergeCommitsArgs),
    /// Show a commit and its ancestors
    Log(LogArgs),
    /// List every stored block
    Objects,
}

#[derive(Args)]
pub struct PutArgs {
    pub root: String,
    pub path: String,
    pub value: String,
}

#[derive(Args)]
pub struct PathArgs {
    pub root: String,
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Args)]
pub struct MergeArgs {
    pub ancestor: String,
    pub left: String,
    pub right: String,
}

#[derive(Args)]
pub struct CommitArgs {
    pub tree: String,
    #[arg(short, long = "parent")]
    pub parents: Vec<String>,
    #[arg(short, long, default_value = "")]
    pub message: String,
    #[arg(long)]
    pub author: Option<String>,
}

#[derive(Args)]
pub struct MergeCommitsArgs {
    pub left: String,
    pub right: String,
    #[arg(short, long)]
    pub message: Option<String>,
    #[arg(long)]
    pub author: Option<String>,
}

#[derive(Args)]
pub struct LogArgs {
    pub commit: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}
