//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    state_filename: String,
    output_filename: String,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                state_filename: format!("{pkg}_state.sqlite"),
                output_filename: format!("{pkg}_inventory.csv"),
                config_filename: format!("{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Default state database filename (fingerprints + subtree progress).
    pub fn state_filename(&self) -> &str {
        &self.state_filename
    }

    /// Default base output filename. Per-subtree outputs derive their names from it.
    pub fn output_filename(&self) -> &str {
        &self.output_filename
    }

    /// Config file looked up in the current directory when `--config` is not given.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- Classifier pool ----

/// Worker limits for the classification pool.
#[derive(Clone, Copy, Debug)]
pub struct WorkerLimits;

impl WorkerLimits {
    /// Upper bound for the default worker count.
    pub const DEFAULT_MAX: usize = 8;
    /// Queue slots per worker before submission blocks.
    pub const QUEUE_PER_WORKER: usize = 5;

    /// `min(8, 2 × available threads)`, never below 1.
    pub fn default_workers() -> usize {
        (rayon::current_num_threads() * 2).clamp(1, Self::DEFAULT_MAX)
    }
}

/// Default number of leading pages the classifier inspects.
pub const DEFAULT_PAGE_LIMIT: usize = 5;

/// Extensions dispatched to the classifier when none are configured.
pub const DEFAULT_CLASSIFIABLE: &[&str] = &["pdf"];

// ---- Hashing ----

/// Hashing I/O sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// Block size for streaming reads (bytes). 8 MiB.
    pub const BLOCK_SIZE: usize = 8 * 1024 * 1024;
}

// ---- Retries ----

/// Bounded, jittered retry for metadata lookups and file opens.
pub struct StatRetry;

impl StatRetry {
    pub const MIN_DELAY_MS: u64 = 200;
    pub const MAX_DELAY_MS: u64 = 500;
}

/// Output write retries: delay doubles each attempt, starting at `BASE_DELAY`.
pub struct WriteRetry;

impl WriteRetry {
    pub const MAX_ATTEMPTS: u32 = 6;
    pub const BASE_DELAY: Duration = Duration::from_millis(500);
}

// ---- Checkpointing ----

/// Rows between fingerprint flushes.
pub const DEFAULT_CHECKPOINT_EVERY: u64 = 500;

/// Rows between memory reclamation passes.
pub const DEFAULT_RECLAIM_EVERY: u64 = 5000;

// ---- Database ----

/// Pending fingerprint count that forces a flush even between checkpoints.
pub const DB_INSERT_BATCH_SIZE: usize = 1000;
