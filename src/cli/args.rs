//! CLI argument structs for all subcommands.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Repository path (any directory inside the repository)
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Branches to show (comma-separated). Default: current branch and main
    #[arg(short, long)]
    pub branches: Option<String>,

    /// Show all branches
    #[arg(long)]
    pub all: bool,

    /// Maximum number of commits to fetch (0 = default cap)
    #[arg(long, default_value = "0")]
    pub max_commits: usize,

    /// Maximum number of commits to print (0 = no limit)
    #[arg(short = 'n', long, default_value = "0")]
    pub limit: usize,
}

#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Repository path
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Branches to show (comma-separated). Default: current branch and main
    #[arg(short, long)]
    pub branches: Option<String>,

    /// Maximum number of commits to fetch (0 = default cap)
    #[arg(long, default_value = "0")]
    pub max_commits: usize,

    /// Maximum number of commits to print per refresh (0 = no limit)
    #[arg(short = 'n', long, default_value = "30")]
    pub limit: usize,
}

#[derive(Parser, Debug)]
pub struct BranchesArgs {
    /// Repository path
    #[arg(short, long, default_value = ".")]
    pub dir: String,
}

#[derive(Parser, Debug)]
pub struct SetBranchArgs {
    /// Short id of the commit to override
    pub commit: String,

    /// Branch name to record for the commit
    pub name: String,

    /// Repository path
    #[arg(short, long, default_value = ".")]
    pub dir: String,
}

#[derive(Parser, Debug)]
pub struct MetadataArgs {
    #[command(subcommand)]
    pub action: MetadataAction,

    /// Repository path
    #[arg(short, long, default_value = ".")]
    pub dir: String,
}

#[derive(Subcommand, Debug)]
pub enum MetadataAction {
    /// Push the branch-name overrides to origin
    Push,
    /// Fetch overrides from origin and merge them into the local store
    Pull,
}
