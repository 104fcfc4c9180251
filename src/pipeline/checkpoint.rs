//! Periodic durability and memory hook, driven by the count of committed rows.

use anyhow::Result;
use log::{debug, warn};
use std::fs::File;
use std::panic::{self, AssertUnwindSafe};
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::classifier::Classifier;
use crate::engine::db_ops::FingerprintStore;

use super::writer::OutputWriter;

/// What a tick asks the caller to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Due {
    pub checkpoint: bool,
    pub reclaim: bool,
}

pub struct CheckpointGovernor {
    checkpoint_every: u64,
    reclaim_every: u64,
    since_checkpoint: u64,
    since_reclaim: u64,
    system: System,
    pid: Option<Pid>,
}

impl CheckpointGovernor {
    /// Intervals of zero disable the respective action.
    pub fn new(checkpoint_every: u64, reclaim_every: u64) -> Self {
        Self {
            checkpoint_every,
            reclaim_every,
            since_checkpoint: 0,
            since_reclaim: 0,
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Count one committed row.
    pub fn tick(&mut self) -> Due {
        self.since_checkpoint += 1;
        self.since_reclaim += 1;
        let mut due = Due::default();
        if self.checkpoint_every > 0 && self.since_checkpoint >= self.checkpoint_every {
            self.since_checkpoint = 0;
            due.checkpoint = true;
        }
        if self.reclaim_every > 0 && self.since_reclaim >= self.reclaim_every {
            self.since_reclaim = 0;
            due.reclaim = true;
        }
        due
    }

    /// Release classifier caches and SQLite memory, then log resident memory. Never fails.
    pub fn reclaim(&mut self, classifier: &dyn Classifier, store: &mut FingerprintStore) {
        if panic::catch_unwind(AssertUnwindSafe(|| classifier.release_caches())).is_err() {
            warn!("Classifier panicked while releasing caches");
        }
        if let Err(e) = store.shrink_memory() {
            warn!("Memory reclamation: {e:#}");
        }
        if let Some(rss) = self.resident_bytes() {
            debug!("Memory reclaimed; resident {:.1} MiB", rss as f64 / (1024.0 * 1024.0));
        }
    }

    fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.system.process(pid).map(|p| p.memory())
    }
}

/// Make written rows and their fingerprints durable. Failure here is a state-store failure.
pub fn checkpoint(writer: Option<&OutputWriter<File>>, store: &mut FingerprintStore) -> Result<()> {
    if let Some(w) = writer {
        w.sync()?;
    }
    let n = store.flush()?;
    debug!("Checkpoint: {n} fingerprints flushed");
    Ok(())
}
