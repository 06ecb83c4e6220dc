//! Document-database backend on SQLite.
//!
//! Every collection is a table of JSON documents keyed by `_id`, with a
//! revision counter bumped on each in-place save. Field equality queries run
//! in SQL through the JSON1 functions.

use crate::core::backend::{Backend, BackendKind};
use crate::core::config;
use crate::core::db;
use crate::core::error::StoreError;
use crate::core::model::Collection;
use crate::core::pool::{self, SqlitePool};
use crate::core::record::{Document, Field, Fields, ID_FIELD, Object, Record};
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct DatabaseStore {
    db_path: PathBuf,
    pool: &'static SqlitePool,
}

impl DatabaseStore {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            pool: pool::global_pool(),
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, StoreError> {
        Ok(Self::new(&config::database_path(uri)?))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn read<R>(
        &self,
        collection: Collection,
        empty: R,
        f: impl FnOnce(&Connection, &str) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.pool.with_read(&self.db_path, |conn| {
            if !db::collection_exists(conn, collection.name)? {
                return Ok(empty);
            }
            f(conn, &db::quote_ident(collection.name))
        })
    }
}

/// Parse a stored row into a document handle. Malformed rows read as absent.
fn parse_row(collection: &str, id: &str, doc: &str, rev: i64) -> Option<Document> {
    match serde_json::from_str::<Value>(doc) {
        Ok(Value::Object(fields)) => Some(Document::new(collection, id, rev, fields)),
        _ => {
            warn!(collection, id, "skipping malformed stored document");
            None
        }
    }
}

/// Keep only the projected top-level fields (plus `_id`).
fn project(document: Document, projection: &[&str]) -> Document {
    if projection.is_empty() {
        return document;
    }
    let fields: Fields = document
        .to_object()
        .into_iter()
        .filter(|(k, _)| k == ID_FIELD || projection.contains(&k.as_str()))
        .collect();
    Document::new(document.collection(), document.id(), document.rev(), fields)
}

/// `_id` first, followed by the remaining fields in order.
fn with_id_first(id: &str, fields: Fields) -> Fields {
    let mut out = Fields::new();
    out.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    for (k, v) in fields {
        if k != ID_FIELD {
            out.insert(k, v);
        }
    }
    out
}

impl DatabaseStore {
    fn insert(
        &self,
        collection: Collection,
        record: &mut Record,
        object: &Object,
    ) -> Result<(), StoreError> {
        let id = match object.id() {
            Some(id) => id.to_string(),
            None => time::new_record_id(),
        };
        let fields = with_id_first(&id, object.strip());
        let doc = serde_json::to_string(&fields)?;

        self.pool.with_write(&self.db_path, |conn| {
            db::ensure_collection(conn, collection.name)?;
            conn.execute(
                &format!(
                    "INSERT INTO {} (_id, doc, rev) VALUES (?1, ?2, 0)",
                    db::quote_ident(collection.name)
                ),
                params![id, doc],
            )?;
            Ok(())
        })?;

        let document = Document::new(collection.name, &id, 0, fields);
        record.set_data(document.to_object());
        record.set_id(Some(id.clone()));
        record.set_document(Some(document));
        debug!(collection = collection.name, id = %id, "inserted document");
        Ok(())
    }

    fn update(
        &self,
        collection: Collection,
        record: &mut Record,
        object: &Object,
    ) -> Result<(), StoreError> {
        let id = match record.id() {
            Some(id) => id.to_string(),
            None => return Err(StoreError::NotSaved),
        };
        let document = record.document_mut().ok_or(StoreError::NotSaved)?;
        for (key, field) in object.iter() {
            if key != ID_FIELD {
                document.set(key, field.clone());
            }
        }

        // Apply the same updates to the stored document so fields outside a
        // read projection survive the write.
        let (fields, rev) = self.pool.with_write(&self.db_path, |conn| {
            db::ensure_collection(conn, collection.name)?;
            let table = db::quote_ident(collection.name);
            let stored: Option<(String, i64)> = conn
                .query_row(
                    &format!("SELECT doc, rev FROM {} WHERE _id = ?1", table),
                    [&id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (doc, rev) = stored.ok_or_else(|| StoreError::DocumentMissing {
                collection: collection.name.to_string(),
                id: id.clone(),
            })?;

            let mut current = match parse_row(collection.name, &id, &doc, rev) {
                Some(current) => current,
                None => Document::new(collection.name, &id, rev, Fields::new()),
            };
            for (key, field) in object.iter() {
                if key != ID_FIELD {
                    current.set(key, field.clone());
                }
            }
            current.set(ID_FIELD, Field::Value(Value::String(id.clone())));
            let fields = with_id_first(&id, current.to_object());

            conn.execute(
                &format!("UPDATE {} SET doc = ?1, rev = ?2 WHERE _id = ?3", table),
                params![serde_json::to_string(&fields)?, rev + 1, id],
            )?;
            Ok((fields, rev + 1))
        })?;

        let document = Document::new(collection.name, &id, rev, fields);
        record.set_data(document.to_object());
        record.set_document(Some(document));
        debug!(collection = collection.name, id = %id, rev, "updated document");
        Ok(())
    }
}

impl Backend for DatabaseStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Database
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError> {
        let row: Option<(String, i64)> = self.read(collection, None, |conn, table| {
            Ok(conn
                .query_row(
                    &format!("SELECT doc, rev FROM {} WHERE _id = ?1", table),
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })?;

        Ok(row
            .and_then(|(doc, rev)| parse_row(collection.name, id, &doc, rev))
            .map(Record::from_document))
    }

    fn get_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<Record>, StoreError> {
        let path = db::json_key_path(field);
        let needle = serde_json::to_string(value)?;
        let row: Option<(String, String, i64)> = self.read(collection, None, |conn, table| {
            let sql = format!(
                "SELECT _id, doc, rev FROM {} WHERE CASE WHEN json_valid(doc) THEN
                    json_type(doc, ?1) IS json_type(?2, '$')
                    AND json_extract(doc, ?1) IS json_extract(?2, '$')
                 ELSE 0 END
                 ORDER BY rowid LIMIT 1",
                table
            );
            Ok(conn
                .query_row(&sql, params![path, needle], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })
                .optional()?)
        })?;

        Ok(row
            .and_then(|(id, doc, rev)| parse_row(collection.name, &id, &doc, rev))
            .map(|document| Record::from_document(project(document, collection.projection))))
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<(String, String, i64)> = self.read(collection, Vec::new(), |conn, table| {
            let mut stmt =
                conn.prepare(&format!("SELECT _id, doc, rev FROM {} ORDER BY rowid", table))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, doc, rev)| parse_row(collection.name, &id, &doc, rev))
            .map(|document| Record::from_document(project(document, collection.projection)))
            .collect())
    }

    fn save(
        &self,
        collection: Collection,
        record: &mut Record,
        object: &Object,
    ) -> Result<(), StoreError> {
        if self.is_saved(record) {
            self.update(collection, record, object)
        } else {
            self.insert(collection, record, object)
        }
    }

    fn delete(&self, collection: Collection, record: &Record) -> Result<(), StoreError> {
        let id = match record.document() {
            Some(document) => document.id().to_string(),
            None => return Err(StoreError::NotSaved),
        };
        let removed = self.pool.with_write(&self.db_path, |conn| {
            if !db::collection_exists(conn, collection.name)? {
                return Ok(0);
            }
            Ok(conn.execute(
                &format!(
                    "DELETE FROM {} WHERE _id = ?1",
                    db::quote_ident(collection.name)
                ),
                [&id],
            )?)
        })?;
        debug!(collection = collection.name, id = %id, removed, "removed document");
        Ok(())
    }
}
