use clap::Parser;
use std::path::PathBuf;

use crate::types::ScanMode;

/// Resumable file inventory: one CSV row per file with size, digest, and text/image classification.
#[derive(Clone, Parser)]
#[command(name = "ledgerscan")]
#[command(about = "Inventory a directory tree; unchanged files are skipped on later runs.")]
pub struct Cli {
    /// Directory to inventory. Default: `root` from the config file, else the current directory.
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Base output CSV. Per-subtree files are named `<stem>_<subtree>.csv` next to it.
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// State database (fingerprints and finished subtrees).
    #[arg(long, short = 'd')]
    pub state_db: Option<PathBuf>,

    /// Config file. Default: `ledgerscan.toml` in the current directory, when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// One output per first-level directory, or one for the whole tree.
    #[arg(long, value_enum)]
    pub mode: Option<ScanMode>,

    /// Only these first-level directories, in this order.
    #[arg(long, short = 's', num_args = 1..)]
    pub subtrees: Vec<String>,

    /// Only inventory these extensions (case-insensitive, dot optional).
    #[arg(long, short = 'i', num_args = 1..)]
    pub include_ext: Vec<String>,

    /// Never inventory these extensions.
    #[arg(long, short = 'x', num_args = 1..)]
    pub exclude_ext: Vec<String>,

    /// Directory names to prune anywhere in the tree.
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude_dirs: Vec<String>,

    /// Extensions sent to the classifier. Default: pdf.
    #[arg(long, num_args = 1..)]
    pub classify_ext: Vec<String>,

    /// Classifier worker threads.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Leading pages the classifier inspects.
    #[arg(long, short = 'p')]
    pub page_limit: Option<usize>,

    /// Compute content digests.
    #[arg(long, short = 'c', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub hash: Option<bool>,

    /// Hash read block size in bytes.
    #[arg(long)]
    pub hash_block_size: Option<usize>,

    /// Rows between fingerprint flushes (0 disables; flushes still happen per subtree).
    #[arg(long)]
    pub checkpoint_every: Option<u64>,

    /// Rows between memory reclamation passes (0 disables).
    #[arg(long)]
    pub reclaim_every: Option<u64>,

    /// Output write attempts before giving up.
    #[arg(long)]
    pub write_attempts: Option<u32>,

    /// First write retry delay in milliseconds; doubles each attempt.
    #[arg(long)]
    pub write_delay_ms: Option<u64>,

    /// Drop all stored fingerprints and finished markers first.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub reset: Option<bool>,

    /// Ignore stored state for this run and rewrite outputs from scratch.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub fresh: Option<bool>,

    /// Clear the finished marker of these subtrees before scanning.
    #[arg(long, short = 'r', num_args = 1..)]
    pub rescan: Vec<String>,

    /// Walk finished subtrees anyway (unchanged files are still skipped).
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub revisit_finished: Option<bool>,

    /// Stop after this many files have been admitted for a row.
    #[arg(long, short = 'n')]
    pub limit: Option<u64>,

    /// Append a `subtree` column.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub subtree_column: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
