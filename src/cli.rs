use std::path::PathBuf;

use clap::Parser;

/// Synchronize a local checkout with an upstream branch, preserving any
/// user-created or user-modified files under timestamped backup names.
#[derive(Debug, Parser)]
#[command(name = "gs", version)]
pub struct Cli {
    /// URL of the authoritative upstream repository
    pub repo_url: String,

    /// Upstream branch to converge on
    pub branch: String,

    /// Local checkout directory
    pub repo_dir: PathBuf,

    /// Enable debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print cumulative timings at the end of the run
    #[arg(short, long)]
    pub profile: bool,
}
