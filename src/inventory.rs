//! Top-level inventory run for the CLI: Ctrl+C handling, progress bar, summary.

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Opts;
use crate::classifier::{Classifier, PdfMarkerProbe};
use crate::engine::progress::{create_counter, refresh_bar};
use crate::pipeline::run_scan;
use crate::types::{ScanSummary, ScanTally};
use crate::utils::Colors;

/// One summary line with every counter colourised.
pub fn tally_line(t: &ScanTally) -> String {
    format!(
        "{} | {} | {} | {} | {}",
        Colors::colorize(Colors::PROCESSED, &format!("Processed: {}", t.processed)),
        Colors::colorize(Colors::SKIPPED, &format!("Skipped: {}", t.skipped)),
        Colors::colorize(Colors::FILTERED, &format!("Filtered: {}", t.filtered)),
        Colors::colorize(Colors::ERRORS, &format!("Errors: {}", t.errors)),
        Colors::colorize(
            Colors::CLASSIFIED,
            &format!(
                "Text: {} / Image: {} / Unresolved: {}",
                t.has_text, t.image_only, t.unresolved
            )
        ),
    )
}

/// Log per-subtree and total counters with elapsed time and rate.
pub fn print_summary(summary: &ScanSummary) {
    for (name, tally) in &summary.subtrees {
        info!("{name}: {}", tally_line(tally));
    }
    if !summary.finished_skipped.is_empty() {
        info!(
            "Already finished, not walked: {}",
            summary.finished_skipped.join(", ")
        );
    }
    let secs = summary.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.total.processed as f64 / secs
    } else {
        0.0
    };
    info!("Total: {}", tally_line(&summary.total));
    info!("Elapsed {secs:.1}s ({rate:.1} rows/s)");
    if summary.limit_reached {
        info!("Row limit reached; the next run resumes where this one stopped");
    }
}

/// Run with an explicit classifier. No signal handling; `cancel` may be set by the caller.
pub fn inventory_with_classifier(
    opts: &Opts,
    classifier: Arc<dyn Classifier>,
    cancel: Arc<AtomicBool>,
) -> Result<ScanSummary> {
    let bar = opts.verbose.then(|| {
        let b = create_counter("Inventorying");
        refresh_bar(&b);
        b
    });
    run_scan(opts, classifier, cancel, bar)
}

/// CLI run: default classifier, Ctrl+C stops the walk after in-flight files are committed.
pub fn inventory_with_opts(opts: &Opts) -> Result<ScanSummary> {
    let cancel_requested = Arc::new(AtomicBool::new(false));
    let cancel_requested_handler = Arc::clone(&cancel_requested);
    ctrlc::set_handler(move || {
        cancel_requested_handler.store(true, Ordering::SeqCst);
    })
    .context("set Ctrl+C handler")?;

    let summary = inventory_with_classifier(
        opts,
        Arc::new(PdfMarkerProbe::new()),
        Arc::clone(&cancel_requested),
    )?;
    print_summary(&summary);

    if summary.cancelled || cancel_requested.load(Ordering::SeqCst) {
        return Err(anyhow::anyhow!(
            "Inventory cancelled by user; committed rows and fingerprints were flushed"
        ));
    }
    Ok(summary)
}
