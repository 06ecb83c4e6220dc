//! The record store: typed entry points over whichever backend the current
//! configuration selects.
//!
//! The backend is resolved from the configuration on every call, so swapping
//! the configuration with [`Store::configure`] takes effect immediately.

use crate::core::audit::AuditLog;
use crate::core::backend::{self, Backend, BackendKind};
use crate::core::config::StoreConfig;
use crate::core::database::DatabaseStore;
use crate::core::error::StoreError;
use crate::core::files::FileStore;
use crate::core::model::Model;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

pub struct Store {
    config: RwLock<StoreConfig>,
}

/// Backend and audit trail resolved from one configuration snapshot.
struct Resolved {
    backend: Box<dyn Backend>,
    audit: Option<AuditLog>,
}

impl Resolved {
    fn log_event(&self, op: &str, collection: &str, record_id: Option<&str>, ok: bool) {
        let Some(audit) = &self.audit else {
            return;
        };
        let status = if ok { "success" } else { "error" };
        let backend = self.backend.kind().as_str();
        if let Err(e) = audit.record(op, backend, collection, record_id, status) {
            tracing::warn!(
                error = %e,
                path = %audit.path().display(),
                "failed to append audit event"
            );
        }
    }
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the configuration used by subsequent calls.
    pub fn configure(&self, config: StoreConfig) {
        let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
        *guard = config;
    }

    pub fn config(&self) -> StoreConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_database_backend(&self) -> bool {
        self.config().is_database_backend()
    }

    pub fn backend_kind(&self) -> BackendKind {
        if self.is_database_backend() {
            BackendKind::Database
        } else {
            BackendKind::File
        }
    }

    /// Strategy for the current configuration.
    pub fn backend(&self) -> Result<Box<dyn Backend>, StoreError> {
        Ok(self.resolve()?.backend)
    }

    fn resolve(&self) -> Result<Resolved, StoreError> {
        let config = self.config();
        let backend: Box<dyn Backend> = if config.is_database_backend() {
            Box::new(DatabaseStore::from_uri(&config.database.uri)?)
        } else {
            Box::new(FileStore::new(Path::new(&config.database.uri)))
        };
        Ok(Resolved {
            backend,
            audit: config.audit_log.as_deref().map(AuditLog::new),
        })
    }

    /// File backend directories for `M`, computed from the configured storage
    /// string whichever backend is active.
    pub fn folder_paths<M: Model>(&self) -> Vec<PathBuf> {
        FileStore::new(Path::new(&self.config().database.uri)).folder_paths(M::collection())
    }

    pub fn is_saved<M: Model>(&self, model: &M) -> bool {
        self.backend_kind().is_saved(model.record())
    }

    pub fn get<M: Model>(&self, id: &str) -> Result<Option<M>, StoreError> {
        backend::validate_id(id)?;
        let resolved = self.resolve()?;
        let record = resolved.backend.get(M::collection(), id)?;
        debug!(collection = M::COLLECTION, id, found = record.is_some(), "get");
        Ok(record.map(M::from_record))
    }

    /// `get` for an id of unknown type, e.g. parsed from JSON input.
    pub fn get_value<M: Model>(&self, id: Option<&Value>) -> Result<Option<M>, StoreError> {
        let id = backend::id_from_value(id)?;
        self.get(id)
    }

    pub fn get_by<M: Model>(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Option<M>, StoreError> {
        let value = value.into();
        let resolved = self.resolve()?;
        let record = resolved.backend.get_by(M::collection(), field, &value)?;
        debug!(collection = M::COLLECTION, field, found = record.is_some(), "get_by");
        Ok(record.map(M::from_record))
    }

    /// One lookup per id, in parallel. Misses stay in place as `None`.
    pub fn get_many<M: Model, S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Result<Vec<Option<M>>, StoreError> {
        let ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
        for id in &ids {
            backend::validate_id(id)?;
        }
        let resolved = self.resolve()?;
        let records = resolved.backend.get_many(M::collection(), &ids)?;
        Ok(records
            .into_iter()
            .map(|record| record.map(M::from_record))
            .collect())
    }

    pub fn get_all<M: Model>(&self) -> Result<Vec<M>, StoreError> {
        let resolved = self.resolve()?;
        let records = resolved.backend.get_all(M::collection())?;
        debug!(collection = M::COLLECTION, count = records.len(), "get_all");
        Ok(records.into_iter().map(M::from_record).collect())
    }

    /// Persist `model` and hand it back for chaining.
    pub fn save<'a, M: Model>(&self, model: &'a mut M) -> Result<&'a mut M, StoreError> {
        let resolved = self.resolve()?;
        let object = model.to_object();
        let result = resolved
            .backend
            .save(M::collection(), model.record_mut(), &object);
        resolved.log_event("save", M::COLLECTION, model.id(), result.is_ok());
        result?;
        Ok(model)
    }

    pub fn delete<M: Model>(&self, model: &M) -> Result<(), StoreError> {
        let resolved = self.resolve()?;
        if !resolved.backend.is_saved(model.record()) {
            return Err(StoreError::NotSaved);
        }
        let result = resolved.backend.delete(M::collection(), model.record());
        resolved.log_event("delete", M::COLLECTION, model.id(), result.is_ok());
        result
    }
}
