//! Ledgerscan: resumable file inventory with content digests and text/image classification

pub mod classifier;
pub mod engine;
pub mod inventory;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use classifier::{Classifier, PdfMarkerProbe};

use log::debug;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Result alias used by public ledgerscan API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: inventory `opts.root` with the given classification capability.
///
/// Rows go to `opts.out` (or the per-subtree files derived from it); fingerprints and finished
/// subtrees go to `opts.state_db`. Per-file failures end up in the rows' `errors` column; the
/// returned `Err` is reserved for state-store failures, output write exhaustion, and a bad root.
///
/// ```ignore
/// let opts = ledgerscan::Opts { root: "/data".into(), ..Default::default() };
/// let summary = ledgerscan::scan(&opts, std::sync::Arc::new(ledgerscan::PdfMarkerProbe::new()))?;
/// ```
pub fn scan(opts: &Opts, classifier: Arc<dyn Classifier>) -> Result<ScanSummary> {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    pipeline::run_scan(opts, classifier, Arc::new(AtomicBool::new(false)), None)
}

/// Like [`scan`], but stops the walk once `cancel` is set. In-flight files are still committed.
pub fn scan_cancellable(
    opts: &Opts,
    classifier: Arc<dyn Classifier>,
    cancel: Arc<AtomicBool>,
) -> Result<ScanSummary> {
    inventory::inventory_with_classifier(opts, classifier, cancel)
}
