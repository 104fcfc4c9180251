//! Bounded classifier pool. Submission blocks while the queue is full; each worker classifies,
//! assembles the row, and commits it under the sink lock.

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::classifier::Classifier;
use crate::types::ClassificationResult;
use crate::utils::config::WorkerLimits;

use super::context::{FirstError, SharedSink, lock_sink, record_first_error};
use super::metadata::open_with_retry;
use super::row::PendingRow;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Open `path` and ask the classifier about it. Never fails: every failure, including a panic
/// inside the classifier, becomes an Unresolved result with a message.
pub fn classify_file(
    classifier: &dyn Classifier,
    path: &Path,
    page_limit: usize,
) -> ClassificationResult {
    let mut file = match open_with_retry(path) {
        Ok(f) => f,
        Err(e) => return ClassificationResult::unresolved(format!("open failed: {e}")),
    };
    match panic::catch_unwind(AssertUnwindSafe(|| classifier.has_text(&mut file, page_limit))) {
        Ok(Ok(true)) => ClassificationResult::has_text(),
        Ok(Ok(false)) => ClassificationResult::image_only(),
        Ok(Err(e)) => ClassificationResult::unresolved(format!("{e:#}")),
        Err(payload) => ClassificationResult::unresolved(format!(
            "classifier panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

struct WorkerShared {
    classifier: Arc<dyn Classifier>,
    page_limit: usize,
    sink: SharedSink,
    first_error: FirstError,
    abort: Arc<AtomicBool>,
}

fn worker_loop(rx: Receiver<PendingRow>, shared: Arc<WorkerShared>) {
    while let Ok(pending) = rx.recv() {
        // After a fatal commit error, drain without doing work.
        if shared.abort.load(Ordering::SeqCst) {
            continue;
        }
        let result = classify_file(
            shared.classifier.as_ref(),
            &pending.task.fs_path(),
            shared.page_limit,
        );
        if let Some(err) = &result.error {
            warn!("{}: classify: {err}", pending.task.key);
        }
        let (row, task) = pending.into_row(Some(result));
        let committed = lock_sink(&shared.sink).and_then(|mut sink| sink.commit(&row, Some(&task)));
        if let Err(e) = committed {
            record_first_error(&shared.first_error, format!("{e:#}"));
            shared.abort.store(true, Ordering::SeqCst);
        }
    }
}

pub struct ClassifierPool {
    tx: Option<Sender<PendingRow>>,
    handles: Vec<JoinHandle<()>>,
}

impl ClassifierPool {
    /// Start `workers` threads with a queue of `workers × QUEUE_PER_WORKER` slots.
    pub fn start(
        workers: usize,
        classifier: Arc<dyn Classifier>,
        page_limit: usize,
        sink: SharedSink,
        first_error: FirstError,
        abort: Arc<AtomicBool>,
    ) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = bounded::<PendingRow>(workers * WorkerLimits::QUEUE_PER_WORKER);
        let shared = Arc::new(WorkerShared {
            classifier,
            page_limit,
            sink,
            first_error,
            abort,
        });
        let handles = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(rx, shared))
            })
            .collect();
        debug!("Classifier pool started with {workers} workers");
        Self {
            tx: Some(tx),
            handles,
        }
    }

    /// Queue a file for classification. Blocks while the queue is full.
    pub fn submit(&self, pending: PendingRow) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| anyhow!("classifier pool already finished"))?;
        tx.send(pending)
            .map_err(|_| anyhow!("classifier workers exited early"))
    }

    /// Close the queue and wait for every queued file to be committed.
    pub fn finish(mut self) -> Result<()> {
        self.tx = None;
        let mut panicked = 0_usize;
        for h in self.handles.drain(..) {
            if h.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            return Err(anyhow!("{panicked} classifier worker(s) panicked"));
        }
        Ok(())
    }
}
