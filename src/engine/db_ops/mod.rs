//! Database operations: schema, open, fingerprint + subtree progress store.

mod connection;
mod fingerprint;

pub use connection::{open_db, open_db_in_memory};
pub use fingerprint::FingerprintStore;

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Insert-or-replace for one fingerprint.
pub(crate) const UPSERT_FINGERPRINT_SQL: &str = "INSERT OR REPLACE INTO processed_files (path, size, mtime_ns, written_ms) VALUES (?1, ?2, ?3, ?4)";

pub(crate) const MARK_FINISHED_SQL: &str = "INSERT INTO scan_progress (subtree, finished, finished_ts) VALUES (?1, 1, ?2) \
     ON CONFLICT(subtree) DO UPDATE SET finished = excluded.finished, finished_ts = excluded.finished_ts";

/// Schema for fingerprint and subtree progress tables.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS processed_files (
    path TEXT PRIMARY KEY,
    size INTEGER NOT NULL,
    mtime_ns INTEGER NOT NULL,
    written_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS scan_progress (
    subtree TEXT PRIMARY KEY,
    finished INTEGER NOT NULL DEFAULT 0,
    finished_ts INTEGER
);
"#;
