use crate::core::error::StoreError;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub fn db_connect(db_path: &Path, busy_timeout_secs: u32) -> Result<Connection, StoreError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(u64::from(busy_timeout_secs)))
        .map_err(StoreError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(StoreError::RusqliteError)?;
    Ok(conn)
}

/// Quote an identifier for use as a table name.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// JSON path selecting a top-level key, quoted so any key name is addressable.
pub fn json_key_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('\\', "\\\\").replace('"', "\\\""))
}

/// One table per collection, created on first use.
pub fn ensure_collection(conn: &Connection, collection: &str) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                _id TEXT PRIMARY KEY,
                doc TEXT NOT NULL,
                rev INTEGER NOT NULL DEFAULT 0
            )",
            quote_ident(collection)
        ),
        [],
    )?;
    Ok(())
}

pub fn collection_exists(conn: &Connection, collection: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [collection],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
