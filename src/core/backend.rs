//! Storage strategy interface shared by the database and file backends.

use crate::core::error::StoreError;
use crate::core::model::Collection;
use crate::core::record::{Object, Record};
use rayon::prelude::*;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Database,
    File,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Database => "database",
            BackendKind::File => "file",
        }
    }

    /// Database records need both an id and a live document handle; file
    /// records only need an id.
    pub fn is_saved(&self, record: &Record) -> bool {
        match self {
            BackendKind::Database => record.id().is_some() && record.document().is_some(),
            BackendKind::File => record.id().is_some(),
        }
    }
}

pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn is_saved(&self, record: &Record) -> bool {
        self.kind().is_saved(record)
    }

    /// Lookup by id. A missing or unreadable record is `None`.
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError>;

    /// First record whose top-level `field` equals `value`.
    fn get_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<Record>, StoreError>;

    fn get_all(&self, collection: Collection) -> Result<Vec<Record>, StoreError>;

    /// One `get` per id, run in parallel. Output order follows `ids`.
    fn get_many(
        &self,
        collection: Collection,
        ids: &[&str],
    ) -> Result<Vec<Option<Record>>, StoreError> {
        ids.par_iter().map(|id| self.get(collection, id)).collect()
    }

    /// Persist `object` for `record`, inserting or updating depending on
    /// whether the record is already saved. Updates `record` in place.
    fn save(
        &self,
        collection: Collection,
        record: &mut Record,
        object: &Object,
    ) -> Result<(), StoreError>;

    /// Remove the backing artifact of a saved record.
    fn delete(&self, collection: Collection, record: &Record) -> Result<(), StoreError>;
}

/// Reject ids that are missing or that could not name a file inside the
/// collection directory.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() {
        return Err(StoreError::UndefinedId);
    }
    if id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Validate a dynamically typed id. Falsy values count as undefined.
pub fn id_from_value(id: Option<&Value>) -> Result<&str, StoreError> {
    match id {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err(StoreError::UndefinedId),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Err(StoreError::UndefinedId),
        Some(Value::String(s)) => {
            validate_id(s)?;
            Ok(s.as_str())
        }
        Some(other) => Err(StoreError::InvalidIdType(value_type_name(other).to_string())),
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
