//! SQLite connection pool with read/write separation and retry logic.
//!
//! - Maintains a **write mutex** per DB for serialized write access
//! - Creates fresh **read connections** per operation (no mutex, concurrent via WAL)
//! - Retries writes that hit `SQLITE_BUSY` / `SQLITE_LOCKED` with exponential backoff
//!
//! Connections are not kept open between operations, so switching the
//! configured database between calls never leaves a stale handle behind.

use crate::core::db;
use crate::core::error::StoreError;
use rusqlite::Connection;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

/// Maximum retry attempts for busy/locked errors.
const MAX_RETRIES: u32 = 5;
/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 100;
/// Maximum delay cap (milliseconds).
const MAX_DELAY_MS: u64 = 5_000;

/// Write connection busy_timeout in seconds.
const WRITE_BUSY_TIMEOUT_SECS: u32 = 5;
/// Read connection busy_timeout in seconds.
const READ_BUSY_TIMEOUT_SECS: u32 = 5;

/// Per-database entry holding a write mutex for serialized write access.
struct PoolEntry {
    write_lock: Mutex<()>,
    db_path: PathBuf,
}

/// Connection pool providing read/write separation per SQLite database.
///
/// Entries are keyed by canonical path and live as long as the pool, one per
/// database file the process has written to.
pub struct SqlitePool {
    entries: Mutex<HashMap<PathBuf, Arc<PoolEntry>>>,
}

/// Canonical form of a database path: the resolved parent directory joined
/// with the file name, so `data/r.db` and `./data/r.db` share one entry.
/// The parent is created first because the file itself may not exist yet.
fn canonical_db_path(db_path: &Path) -> Result<PathBuf, StoreError> {
    let parent = match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let parent = fs::canonicalize(parent)?;
    Ok(match db_path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

impl SqlitePool {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_entry(&self, db_path: &Path) -> Result<Arc<PoolEntry>, StoreError> {
        let canonical = canonical_db_path(db_path)?;
        let mut entries = self.entries.lock().map_err(|_| {
            StoreError::ConfigError("SqlitePool entries lock poisoned".to_string())
        })?;
        let entry = entries.entry(canonical.clone()).or_insert_with(|| {
            Arc::new(PoolEntry {
                write_lock: Mutex::new(()),
                db_path: canonical,
            })
        });
        Ok(Arc::clone(entry))
    }

    /// Execute a closure with a write connection for the given DB path.
    /// Write access is serialized per-DB via mutex; busy errors are retried.
    pub fn with_write<F, R>(&self, db_path: &Path, mut f: F) -> Result<R, StoreError>
    where
        F: FnMut(&Connection) -> Result<R, StoreError>,
    {
        let entry = self.get_entry(db_path)?;
        let _guard = entry
            .write_lock
            .lock()
            .map_err(|_| StoreError::ConfigError("Pool write lock poisoned".to_string()))?;

        retry_on_busy(|| {
            let conn = db::db_connect(&entry.db_path, WRITE_BUSY_TIMEOUT_SECS)?;
            f(&conn)
        })
    }

    /// Execute a closure with a read connection (no mutex serialization).
    pub fn with_read<F, R>(&self, db_path: &Path, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError>,
    {
        let conn = db::db_connect(db_path, READ_BUSY_TIMEOUT_SECS)?;

        f(&conn)
    }
}

/// Retry a closure on `SQLITE_BUSY` / `DatabaseBusy` with exponential backoff.
fn retry_on_busy<F, R>(mut f: F) -> Result<R, StoreError>
where
    F: FnMut() -> Result<R, StoreError>,
{
    let mut attempt = 0u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if is_busy_error(&e) && attempt < MAX_RETRIES => {
                attempt += 1;
                let delay_ms = (BASE_DELAY_MS * 2u64.pow(attempt - 1)).min(MAX_DELAY_MS);
                tracing::debug!(attempt, delay_ms, "sqlite busy, retrying write");
                thread::sleep(Duration::from_millis(delay_ms));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check if an error is a SQLite busy/locked error that is retryable.
fn is_busy_error(err: &StoreError) -> bool {
    match err {
        StoreError::RusqliteError(rusqlite::Error::SqliteFailure(code, _)) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

/// Global pool instance (same lifetime as the process).
pub fn global_pool() -> &'static SqlitePool {
    static POOL: OnceLock<SqlitePool> = OnceLock::new();
    POOL.get_or_init(SqlitePool::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_is_busy_error_matches_busy_and_locked() {
        let busy = StoreError::RusqliteError(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        let locked = StoreError::RusqliteError(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            None,
        ));
        assert!(is_busy_error(&busy));
        assert!(is_busy_error(&locked));
        assert!(!is_busy_error(&StoreError::NotSaved));
    }

    #[test]
    fn test_retry_on_busy_gives_up_on_other_errors() {
        let calls = Cell::new(0);
        let result: Result<(), StoreError> = retry_on_busy(|| {
            calls.set(calls.get() + 1);
            Err(StoreError::UndefinedId)
        });
        assert!(matches!(result, Err(StoreError::UndefinedId)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_retry_on_busy_recovers() {
        let calls = Cell::new(0);
        let result = retry_on_busy(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(StoreError::RusqliteError(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                    None,
                )))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_equivalent_paths_share_one_entry() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pool = SqlitePool::new();
        let plain = tmp.path().join("data").join("r.db");
        let dotted = tmp.path().join(".").join("data").join(".").join("r.db");

        let a = pool.get_entry(&plain).expect("entry");
        let b = pool.get_entry(&dotted).expect("entry");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.db_path.is_absolute());
        assert_eq!(a.db_path.file_name().unwrap(), "r.db");
        assert!(tmp.path().join("data").is_dir());

        let other = pool.get_entry(&tmp.path().join("data").join("s.db")).expect("entry");
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(pool.entries.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_pool_write_then_read() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_path = tmp.path().join("pool.db");
        global_pool()
            .with_write(&db_path, |conn| {
                conn.execute("CREATE TABLE IF NOT EXISTS t(v TEXT)", [])?;
                conn.execute("INSERT INTO t(v) VALUES('ok')", [])?;
                Ok(())
            })
            .expect("write");
        let count: i64 = global_pool()
            .with_read(&db_path, |conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?)
            })
            .expect("read");
        assert_eq!(count, 1);
    }
}
