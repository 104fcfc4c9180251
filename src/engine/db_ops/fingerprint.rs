//! Fingerprint store: canonical path → (size, mtime) of the last written row, plus per-subtree
//! completion markers. Upserts are buffered and written in one transaction per flush.

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use crate::types::{FingerprintEntry, ResetScope, SubtreeProgress};
use crate::utils::config::DB_INSERT_BATCH_SIZE;

use super::{MARK_FINISHED_SQL, UPSERT_FINGERPRINT_SQL, open_db, open_db_in_memory};

pub struct FingerprintStore {
    conn: Connection,
    /// Upserts not yet committed. Consulted by lookups so a pending entry is never missed.
    pending: HashMap<String, FingerprintEntry>,
}

impl FingerprintStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            pending: HashMap::new(),
        }
    }

    pub fn lookup(&self, path: &str) -> Result<Option<FingerprintEntry>> {
        if let Some(entry) = self.pending.get(path) {
            return Ok(Some(entry.clone()));
        }
        self.conn
            .query_row(
                "SELECT path, size, mtime_ns, written_ms FROM processed_files WHERE path = ?1",
                [path],
                |row| {
                    let size: i64 = row.get(1)?;
                    Ok(FingerprintEntry {
                        path: row.get(0)?,
                        size: size.max(0) as u64,
                        mtime_ns: row.get(2)?,
                        written_ms: row.get(3)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("look up fingerprint for {path}"))
    }

    /// True iff a stored entry matches both `size` and `mtime_ns` exactly.
    pub fn should_skip(&self, path: &str, size: u64, mtime_ns: i64) -> Result<bool> {
        Ok(self
            .lookup(path)?
            .is_some_and(|e| e.size == size && e.mtime_ns == mtime_ns))
    }

    /// Insert or replace. Durable after the next [`flush`](Self::flush); the store never flushes
    /// on its own, so the caller decides when rows are synced first.
    pub fn upsert(&mut self, path: &str, size: u64, mtime_ns: i64, written_ms: i64) -> Result<()> {
        self.pending.insert(
            path.to_string(),
            FingerprintEntry {
                path: path.to_string(),
                size,
                mtime_ns,
                written_ms,
            },
        );
        Ok(())
    }

    /// Write all pending upserts in a single transaction. Returns how many were written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction().context("begin transaction")?;
        {
            let mut stmt = tx
                .prepare_cached(UPSERT_FINGERPRINT_SQL)
                .context("prepare upsert")?;
            for e in self.pending.values() {
                stmt.execute((e.path.as_str(), e.size as i64, e.mtime_ns, e.written_ms))
                    .with_context(|| format!("upsert fingerprint for {}", e.path))?;
            }
        }
        tx.commit().context("commit fingerprints")?;
        let n = self.pending.len();
        self.pending.clear();
        debug!("Flushed {n} fingerprints");
        Ok(n)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Enough upserts are buffered that the owner should checkpoint.
    pub fn batch_full(&self) -> bool {
        self.pending.len() >= DB_INSERT_BATCH_SIZE
    }

    /// Committed entries (pending upserts not included).
    pub fn entry_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM processed_files", [], |r| r.get(0))
            .context("count fingerprints")?;
        Ok(n.max(0) as usize)
    }

    pub fn subtree_progress(&self, subtree: &str) -> Result<Option<SubtreeProgress>> {
        self.conn
            .query_row(
                "SELECT subtree, finished, finished_ts FROM scan_progress WHERE subtree = ?1",
                [subtree],
                |row| {
                    let finished: i64 = row.get(1)?;
                    Ok(SubtreeProgress {
                        root: row.get(0)?,
                        finished: finished == 1,
                        finished_ts: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("read progress for subtree {subtree}"))
    }

    pub fn is_subtree_finished(&self, subtree: &str) -> Result<bool> {
        Ok(self
            .subtree_progress(subtree)?
            .is_some_and(|p| p.finished))
    }

    /// Flush pending fingerprints, then record the subtree as finished.
    pub fn mark_subtree_finished(&mut self, subtree: &str, finished_ts: i64) -> Result<()> {
        self.flush()?;
        self.conn
            .execute(MARK_FINISHED_SQL, (subtree, finished_ts))
            .with_context(|| format!("mark subtree {subtree} finished"))?;
        Ok(())
    }

    pub fn reset(&mut self, scope: &ResetScope) -> Result<()> {
        match scope {
            ResetScope::All => {
                self.pending.clear();
                self.conn
                    .execute_batch("DELETE FROM processed_files; DELETE FROM scan_progress;")
                    .context("reset state")?;
            }
            ResetScope::Subtrees(names) => {
                let mut stmt = self
                    .conn
                    .prepare("DELETE FROM scan_progress WHERE subtree = ?1")
                    .context("prepare progress reset")?;
                for name in names {
                    stmt.execute([name.as_str()])
                        .with_context(|| format!("reset progress for subtree {name}"))?;
                }
            }
        }
        Ok(())
    }

    /// Release SQLite page cache and the pending map's spare capacity.
    pub fn shrink_memory(&mut self) -> Result<()> {
        self.pending.shrink_to_fit();
        self.conn
            .execute_batch("PRAGMA shrink_memory;")
            .context("shrink SQLite memory")
    }

    /// Flush and truncate the WAL. Call once at the end of a run.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .context("WAL checkpoint")?;
        Ok(())
    }
}
