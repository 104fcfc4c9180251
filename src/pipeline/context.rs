//! Shared sink: the output writer, fingerprint store, and run counters behind one lock, so the
//! write-then-upsert pair for a file never interleaves with another file's.

use anyhow::{Result, anyhow};
use log::{debug, warn};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::Opts;
use crate::classifier::Classifier;
use crate::engine::db_ops::FingerprintStore;
use crate::engine::progress::{ProgressBar, update_progress_bar};
use crate::engine::tools::now_ms;
use crate::types::{FileTask, OutputRow, ScanTally};

use super::checkpoint::{CheckpointGovernor, checkpoint};
use super::writer::{OutputWriter, RetryPolicy};

pub type SharedSink = Arc<Mutex<Sink>>;

/// First fatal error raised on a worker thread, re-raised by the orchestrator after joining.
pub type FirstError = Arc<Mutex<Option<String>>>;

pub struct Sink {
    writer: Option<OutputWriter<File>>,
    store: FingerprintStore,
    tally: ScanTally,
    governor: CheckpointGovernor,
    classifier: Arc<dyn Classifier>,
    progress: Option<ProgressBar>,
    policy: RetryPolicy,
    subtree_column: bool,
}

impl Sink {
    pub fn new(
        store: FingerprintStore,
        classifier: Arc<dyn Classifier>,
        opts: &Opts,
        progress: Option<ProgressBar>,
    ) -> Self {
        Self {
            writer: None,
            store,
            tally: ScanTally::default(),
            governor: CheckpointGovernor::new(opts.checkpoint_every, opts.reclaim_every),
            classifier,
            progress,
            policy: RetryPolicy {
                max_attempts: opts.write_attempts,
                base_delay: opts.write_base_delay,
            },
            subtree_column: opts.subtree_column,
        }
    }

    pub fn shared(self) -> SharedSink {
        Arc::new(Mutex::new(self))
    }

    /// Switch output to `path`, closing the current destination first.
    pub fn open_output(&mut self, path: &Path, truncate: bool) -> Result<()> {
        self.close_output()?;
        self.writer = Some(OutputWriter::open(
            path,
            truncate,
            self.policy,
            self.subtree_column,
        )?);
        Ok(())
    }

    /// Sync the current destination and flush fingerprints.
    pub fn close_output(&mut self) -> Result<()> {
        checkpoint(self.writer.as_ref(), &mut self.store)?;
        self.writer = None;
        Ok(())
    }

    /// Write one row, then record its fingerprint. `task` is `None` for rows that must not be
    /// fingerprinted (metadata unavailable).
    pub fn commit(&mut self, row: &OutputRow, task: Option<&FileTask>) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("no output open for {}", row.rel_path))?;
        writer.write_row(row)?;
        if let Some(task) = task {
            self.store
                .upsert(&task.key, task.size, task.mtime_ns, now_ms())?;
        }
        self.tally.record_row(row);
        if let Some(pb) = &self.progress {
            update_progress_bar(pb, 1);
        }
        let due = self.governor.tick();
        if due.checkpoint || self.store.batch_full() {
            checkpoint(self.writer.as_ref(), &mut self.store)?;
        }
        if due.reclaim {
            self.governor
                .reclaim(self.classifier.as_ref(), &mut self.store);
        }
        Ok(())
    }

    /// Best effort on the way out of a failed run: sync whatever rows reached the output, then
    /// persist their fingerprints. Failures are logged, not returned.
    pub fn salvage(&mut self) {
        if let Some(w) = &self.writer
            && let Err(e) = w.sync()
        {
            warn!("Salvage: {e:#}; fingerprints not flushed");
            return;
        }
        match self.store.flush() {
            Ok(n) => debug!("Salvage: {n} fingerprints flushed"),
            Err(e) => warn!("Salvage: {e:#}"),
        }
    }

    pub fn record_skipped(&mut self) {
        self.tally.skipped += 1;
    }

    pub fn record_filtered(&mut self) {
        self.tally.filtered += 1;
    }

    pub fn record_walk_error(&mut self) {
        self.tally.walk_errors += 1;
    }

    /// Counters since the last call (one segment's worth).
    pub fn take_tally(&mut self) -> ScanTally {
        std::mem::take(&mut self.tally)
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FingerprintStore {
        &mut self.store
    }

    pub fn progress(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }

    /// Close the output and hand back the store.
    pub fn finish(mut self) -> Result<FingerprintStore> {
        self.close_output()?;
        Ok(self.store)
    }
}

pub fn lock_sink(sink: &SharedSink) -> Result<MutexGuard<'_, Sink>> {
    sink.lock().map_err(|_| anyhow!("output sink lock poisoned"))
}

/// Keep the first fatal message; later ones are dropped.
pub fn record_first_error(slot: &FirstError, msg: String) {
    if let Ok(mut guard) = slot.lock() {
        guard.get_or_insert(msg);
    }
}

pub fn take_first_error(slot: &FirstError) -> Option<String> {
    slot.lock().ok().and_then(|mut guard| guard.take())
}
