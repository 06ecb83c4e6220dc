use crate::core::error::StoreError;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only JSONL trail of store mutations.
pub struct AuditLog {
    path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub ts: String,
    pub event_id: String,
    pub op: String,
    pub backend: String,
    pub collection: String,
    pub record_id: Option<String>,
    pub status: String,
}

impl AuditLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(
        &self,
        op: &str,
        backend: &str,
        collection: &str,
        record_id: Option<&str>,
        status: &str,
    ) -> Result<(), StoreError> {
        static APPEND_LOCK: Mutex<()> = Mutex::new(());

        let ev = StoreEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            op: op.to_string(),
            backend: backend.to_string(),
            collection: collection.to_string(),
            record_id: record_id.map(|s| s.to_string()),
            status: status.to_string(),
        };
        let line = serde_json::to_string(&ev)?;

        let _lock = APPEND_LOCK
            .lock()
            .map_err(|_| StoreError::ConfigError("audit log lock poisoned".to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(StoreError::IoError)?;
            }
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(StoreError::IoError)?;
        writeln!(f, "{}", line).map_err(StoreError::IoError)?;
        Ok(())
    }

    /// Read back every event, skipping lines that do not parse.
    pub fn events(&self) -> Result<Vec<StoreEvent>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(StoreError::IoError)?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
