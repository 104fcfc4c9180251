//! Output writer: one CSV row per processed file, retried with exponential backoff while the
//! destination is locked. Exhausting the attempt budget is an error, never swallowed.

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::engine::tools::bytes_to_kb_mb;
use crate::types::OutputRow;

pub const HEADER: &[&str] = &[
    "name",
    "extension",
    "size_bytes",
    "size_kb",
    "size_mb",
    "relative_path",
    "image_only",
    "digest",
    "errors",
];
pub const SUBTREE_COLUMN: &str = "subtree";

// Windows sharing/lock violations; EACCES and ETXTBSY on Unix.
const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;
const EACCES: i32 = 13;
const ETXTBSY: i32 = 26;

/// Attempt budget and backoff for output writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`: `base × 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1_u32 << attempt.min(20))
    }
}

/// Whether a write failure looks like another process holding the destination.
pub fn is_transient(err: &io::Error) -> bool {
    if matches!(err.kind(), ErrorKind::PermissionDenied | ErrorKind::WouldBlock) {
        return true;
    }
    matches!(
        err.raw_os_error(),
        Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION | EACCES | ETXTBSY)
    )
}

/// Header fields for the configured layout.
pub fn header_fields(subtree_column: bool) -> Vec<&'static str> {
    let mut fields = HEADER.to_vec();
    if subtree_column {
        fields.push(SUBTREE_COLUMN);
    }
    fields
}

fn row_fields(row: &OutputRow, subtree_column: bool) -> Vec<String> {
    let (size_bytes, size_kb, size_mb) = match row.size {
        Some(size) => {
            let (kb, mb) = bytes_to_kb_mb(size);
            (size.to_string(), format!("{kb:.2}"), format!("{mb:.2}"))
        }
        None => (String::new(), String::new(), String::new()),
    };
    let mut fields = vec![
        row.name.clone(),
        row.extension.clone(),
        size_bytes,
        size_kb,
        size_mb,
        row.rel_path.clone(),
        row.classification
            .map(|c| c.flag().to_string())
            .unwrap_or_default(),
        row.digest.clone().unwrap_or_default(),
        row.errors.clone().unwrap_or_default(),
    ];
    if subtree_column {
        fields.push(row.subtree.clone().unwrap_or_default());
    }
    fields
}

/// Encode one record (quoting included) so a retry writes exactly the same bytes.
fn encode_record<I, S>(fields: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    w.write_record(fields).context("encode CSV record")?;
    w.into_inner()
        .map_err(|e| anyhow!("encode CSV record: {}", e.error()))
}

pub struct OutputWriter<W: Write> {
    inner: W,
    policy: RetryPolicy,
    subtree_column: bool,
    rows: u64,
    retries: u64,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(inner: W, policy: RetryPolicy, subtree_column: bool) -> Self {
        Self {
            inner,
            policy,
            subtree_column,
            rows: 0,
            retries: 0,
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        let bytes = encode_record(header_fields(self.subtree_column))?;
        self.write_with_retry(&bytes, "header")
    }

    /// Write and flush one complete row. Returns only after the bytes reached the destination.
    pub fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        let bytes = encode_record(row_fields(row, self.subtree_column))?;
        self.write_with_retry(&bytes, &row.rel_path)?;
        self.rows += 1;
        Ok(())
    }

    /// Send `bytes[*written..]` and flush. `written` advances with every accepted chunk, so a
    /// retry after a partial write continues from the unwritten tail.
    fn write_tail(&mut self, bytes: &[u8], written: &mut usize) -> io::Result<()> {
        while *written < bytes.len() {
            match self.inner.write(&bytes[*written..]) {
                Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
                Ok(n) => *written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.inner.flush()
    }

    fn write_with_retry(&mut self, bytes: &[u8], what: &str) -> Result<()> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0_u32;
        let mut written = 0_usize;
        loop {
            match self.write_tail(bytes, &mut written) {
                Ok(()) => return Ok(()),
                Err(e) if is_transient(&e) && attempt + 1 < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Output locked writing {what} (attempt {}/{max_attempts}, {written}/{} bytes sent): {e}; retrying in {delay:?}",
                        attempt + 1,
                        bytes.len()
                    );
                    thread::sleep(delay);
                    self.retries += 1;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("write {what} failed after {} attempt(s)", attempt + 1)
                    });
                }
            }
        }
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Retries performed so far (attempts beyond the first, across all writes).
    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl OutputWriter<File> {
    /// Open `path` for appending (or truncate it). The header is written when the file is new,
    /// empty, or truncated.
    pub fn open(
        path: &Path,
        truncate: bool,
        policy: RetryPolicy,
        subtree_column: bool,
    ) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output directory {}", parent.display()))?;
        }
        let file = if truncate {
            File::create(path)
        } else {
            OpenOptions::new().create(true).append(true).open(path)
        }
        .with_context(|| format!("open output {}", path.display()))?;
        let needs_header = truncate
            || file
                .metadata()
                .with_context(|| format!("stat output {}", path.display()))?
                .len()
                == 0;
        let mut writer = Self::new(file, policy, subtree_column);
        if needs_header {
            writer.write_header()?;
            debug!("Wrote header to {}", path.display());
        }
        Ok(writer)
    }

    /// Push written rows to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.inner.sync_data().context("sync output")
    }
}
