use rand::Rng;
use std::fs::{self, File, Metadata};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::engine::hashing::hash_reader;
use crate::engine::tools::{extension_of, mtime_ns, stem_of};
use crate::types::FileTask;
use crate::utils::config::StatRetry;

/// Random pause before the single retry of a metadata lookup or open.
pub fn jitter_delay() -> Duration {
    let ms = rand::thread_rng().gen_range(StatRetry::MIN_DELAY_MS..=StatRetry::MAX_DELAY_MS);
    Duration::from_millis(ms)
}

/// Run `op`, and on failure run it exactly once more after a jittered delay.
pub fn with_one_retry<T>(what: &Path, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    match op() {
        Ok(v) => Ok(v),
        Err(first) => {
            let delay = jitter_delay();
            log::debug!(
                "{}: {first}; retrying once in {delay:?}",
                what.display()
            );
            thread::sleep(delay);
            op()
        }
    }
}

/// Metadata lookup with one jittered retry.
pub fn stat_with_retry(path: &Path) -> io::Result<Metadata> {
    with_one_retry(path, || fs::metadata(path))
}

/// Open for reading with one jittered retry. Both content stages (digest, classify) open this way.
pub fn open_with_retry(path: &Path) -> io::Result<File> {
    with_one_retry(path, || File::open(path))
}

/// Streaming digest of `path`, opened with one jittered retry.
pub fn digest_with_retry(path: &Path, block_size: usize) -> io::Result<blake3::Hash> {
    hash_reader(open_with_retry(path)?, block_size)
}

/// Build the task for a file whose metadata was read successfully.
pub fn file_task(
    key: String,
    abs_path: &Path,
    rel_path: String,
    subtree: Option<String>,
    meta: &Metadata,
) -> FileTask {
    FileTask {
        key,
        rel_path,
        name: stem_of(abs_path),
        extension: extension_of(abs_path),
        size: meta.len(),
        mtime_ns: meta.modified().map(mtime_ns).unwrap_or(0),
        subtree,
    }
}
