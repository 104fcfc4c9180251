//! Public and internal types for the ledgerscan API and pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::utils::config::{
    DEFAULT_CHECKPOINT_EVERY, DEFAULT_CLASSIFIABLE, DEFAULT_PAGE_LIMIT, DEFAULT_RECLAIM_EVERY,
    HashingConsts, PackagePaths, WorkerLimits, WriteRetry,
};

/// One discovered file that passed the filters and the fingerprint check. Consumed once.
#[derive(Clone, Debug)]
pub struct FileTask {
    /// Canonical (normalized) path; key of the fingerprint table and the path used for I/O.
    pub key: String,
    /// Path relative to the scan root, `/`-separated.
    pub rel_path: String,
    /// File name without extension.
    pub name: String,
    /// Lowercased extension without the dot (empty if none).
    pub extension: String,
    pub size: u64,
    /// Modification time in nanoseconds since epoch.
    pub mtime_ns: i64,
    /// First-level directory the file lives under, if any.
    pub subtree: Option<String>,
}

impl FileTask {
    pub fn fs_path(&self) -> PathBuf {
        PathBuf::from(&self.key)
    }
}

/// Stored fingerprint row: canonical path, size, mtime, and when the row for it was written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerprintEntry {
    pub path: String,
    pub size: u64,
    pub mtime_ns: i64,
    /// Milliseconds since epoch.
    pub written_ms: i64,
}

/// Completion marker for a first-level directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtreeProgress {
    pub root: String,
    pub finished: bool,
    /// Seconds since epoch.
    pub finished_ts: Option<i64>,
}

/// Outcome of the classification capability for one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    HasText,
    ImageOnly,
    Unresolved,
}

impl Classification {
    /// Value of the `image_only` column: `1` image only, `0` has text, empty when unresolved.
    pub fn flag(self) -> &'static str {
        match self {
            Classification::ImageOnly => "1",
            Classification::HasText => "0",
            Classification::Unresolved => "",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassificationResult {
    pub kind: Classification,
    pub error: Option<String>,
}

impl ClassificationResult {
    pub fn has_text() -> Self {
        Self {
            kind: Classification::HasText,
            error: None,
        }
    }

    pub fn image_only() -> Self {
        Self {
            kind: Classification::ImageOnly,
            error: None,
        }
    }

    pub fn unresolved(error: impl Into<String>) -> Self {
        Self {
            kind: Classification::Unresolved,
            error: Some(error.into()),
        }
    }
}

/// Final record for one non-skipped file. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputRow {
    pub name: String,
    pub extension: String,
    /// `None` when metadata could not be read.
    pub size: Option<u64>,
    pub rel_path: String,
    pub subtree: Option<String>,
    pub classification: Option<Classification>,
    /// Hex digest, `None` when hashing is disabled or failed.
    pub digest: Option<String>,
    /// Merged, stage-tagged error text.
    pub errors: Option<String>,
}

/// How the tree is split into output files and completion units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// One output per first-level directory, with per-directory completion tracking.
    #[default]
    PerSubtree,
    /// One output for the whole tree.
    WholeTree,
}

/// What to clear in the state store before a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResetScope {
    /// Drop every fingerprint and every completion marker.
    All,
    /// Clear the completion markers of the named subtrees only.
    Subtrees(Vec<String>),
}

/// Counters for one subtree or a whole run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanTally {
    /// Rows written.
    pub processed: u64,
    /// Files whose fingerprint matched (no row).
    pub skipped: u64,
    /// Files dropped by extension filters (no row).
    pub filtered: u64,
    /// Rows carrying at least one error.
    pub errors: u64,
    pub has_text: u64,
    pub image_only: u64,
    pub unresolved: u64,
    /// Directories the walk could not read.
    pub walk_errors: u64,
}

impl ScanTally {
    pub fn merge(&mut self, other: &ScanTally) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.filtered += other.filtered;
        self.errors += other.errors;
        self.has_text += other.has_text;
        self.image_only += other.image_only;
        self.unresolved += other.unresolved;
        self.walk_errors += other.walk_errors;
    }

    /// Count a committed row.
    pub fn record_row(&mut self, row: &OutputRow) {
        self.processed += 1;
        if row.errors.is_some() {
            self.errors += 1;
        }
        match row.classification {
            Some(Classification::HasText) => self.has_text += 1,
            Some(Classification::ImageOnly) => self.image_only += 1,
            Some(Classification::Unresolved) => self.unresolved += 1,
            None => {}
        }
    }
}

/// Result of a run.
#[derive(Clone, Debug, Default)]
pub struct ScanSummary {
    pub total: ScanTally,
    /// Per subtree, in processing order. Empty in whole-tree mode.
    pub subtrees: Vec<(String, ScanTally)>,
    /// Subtrees skipped because they were already finished.
    pub finished_skipped: Vec<String>,
    pub elapsed: Duration,
    /// True when the row limit stopped the run early.
    pub limit_reached: bool,
    /// True when the run was interrupted; committed rows are durable.
    pub cancelled: bool,
}

/// Full run options (CLI, config file, and lib callers).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Directory to inventory.
    pub root: PathBuf,
    /// Base output path. In per-subtree mode, names of the per-subtree files derive from it.
    pub out: PathBuf,
    /// State database (fingerprints + subtree progress).
    pub state_db: PathBuf,
    pub scan_mode: ScanMode,
    /// Subtree allow-list, processed in this order. Empty means every first-level directory.
    pub subtrees: Vec<String>,
    /// When non-empty, only these extensions are inventoried.
    pub include_ext: Vec<String>,
    pub exclude_ext: Vec<String>,
    /// Directory names pruned anywhere in the tree.
    pub exclude_dirs: Vec<String>,
    /// Extensions dispatched to the classifier.
    pub classifiable_ext: Vec<String>,
    pub workers: usize,
    /// Leading pages the classifier may inspect.
    pub page_limit: usize,
    /// Compute content digests.
    pub hash: bool,
    pub hash_block_size: usize,
    /// Rows between fingerprint flushes.
    pub checkpoint_every: u64,
    /// Rows between memory reclamation passes.
    pub reclaim_every: u64,
    pub write_attempts: u32,
    pub write_base_delay: Duration,
    /// Drop all stored state before scanning.
    pub reset_state: bool,
    /// Ignore stored fingerprints and finished markers for this run (still records).
    pub fresh: bool,
    /// Finished subtrees whose markers are cleared before scanning.
    pub rescan: Vec<String>,
    /// Walk finished subtrees anyway; fingerprints still skip unchanged files.
    pub revisit_finished: bool,
    /// Stop after this many files have been admitted for a row.
    pub limit: Option<u64>,
    /// Append a `subtree` column to the output.
    pub subtree_column: bool,
    /// Show progress bar (verbose mode).
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        let paths = PackagePaths::get();
        Opts {
            root: PathBuf::from("."),
            out: PathBuf::from(paths.output_filename()),
            state_db: PathBuf::from(paths.state_filename()),
            scan_mode: ScanMode::default(),
            subtrees: Vec::new(),
            include_ext: Vec::new(),
            exclude_ext: Vec::new(),
            exclude_dirs: Vec::new(),
            classifiable_ext: DEFAULT_CLASSIFIABLE.iter().map(|s| s.to_string()).collect(),
            workers: WorkerLimits::default_workers(),
            page_limit: DEFAULT_PAGE_LIMIT,
            hash: true,
            hash_block_size: HashingConsts::BLOCK_SIZE,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            reclaim_every: DEFAULT_RECLAIM_EVERY,
            write_attempts: WriteRetry::MAX_ATTEMPTS,
            write_base_delay: WriteRetry::BASE_DELAY,
            reset_state: false,
            fresh: false,
            rescan: Vec::new(),
            revisit_finished: false,
            limit: None,
            subtree_column: false,
            verbose: false,
        }
    }
}
