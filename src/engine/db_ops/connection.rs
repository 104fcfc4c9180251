//! Open the state database.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use super::{SCHEMA, WAL_PRAGMAS};

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

/// Open or create the state DB and ensure schema + WAL. Creates the parent directory if needed.
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create state directory {}", parent.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("open state database {}", path.display()))?;
    apply_wal_and_schema(&conn)?;
    Ok(conn)
}

/// Open an in-memory DB with the same schema (tests and dry runs; no WAL pragmas needed).
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}
