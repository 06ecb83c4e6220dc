//! Flat-file backend: one pretty-printed JSON file per record under
//! `<root>/<collection>/<id>.json`.

use crate::core::backend::{Backend, BackendKind, validate_id};
use crate::core::error::StoreError;
use crate::core::model::Collection;
use crate::core::record::{Fields, ID_FIELD, Object, Record};
use crate::core::time;
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const FILE_SUFFIX: &str = ".json";

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directories that must exist before a write, parent first.
    pub fn folder_paths(&self, collection: Collection) -> Vec<PathBuf> {
        vec![self.root.clone(), self.root.join(collection.name)]
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.name)
    }

    pub fn record_path(&self, collection: Collection, id: &str) -> PathBuf {
        self.collection_dir(collection).join(format!("{}{}", id, FILE_SUFFIX))
    }

    fn ensure_folders(&self, collection: Collection) -> Result<(), StoreError> {
        for path in self.folder_paths(collection) {
            if path.exists() {
                continue;
            }
            match fs::create_dir(&path) {
                Ok(()) => debug!(path = %path.display(), "created directory"),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(StoreError::IoError(e)),
            }
        }
        Ok(())
    }
}

/// Read and parse one record file. Missing files, bytes that are not UTF-8
/// JSON, and JSON that is not an object all read as `None`.
fn read_fields(path: &Path) -> Result<Option<Fields>, StoreError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::IoError(e)),
    };
    match serde_json::from_slice::<Value>(&content) {
        Ok(Value::Object(fields)) => Ok(Some(fields)),
        Ok(_) | Err(_) => {
            warn!(path = %path.display(), "skipping unparseable record file");
            Ok(None)
        }
    }
}

/// Regular files in `dir`, sorted by name.
fn list_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        files.push((name, entry.path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Wrap parsed file content; a file without a string `_id` takes its id
/// from the file name.
fn wrap(fields: Fields, file_id: &str) -> Record {
    let mut record = Record::from_data(fields);
    if record.id().is_none() {
        record.set_id(Some(file_id.to_string()));
    }
    record
}

impl Backend for FileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError> {
        validate_id(id)?;
        let path = self.record_path(collection, id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(read_fields(&path)?.map(|fields| wrap(fields, id)))
    }

    fn get_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<Record>, StoreError> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(None);
        }
        for (name, path) in list_files(&dir)? {
            let Some(fields) = read_fields(&path)? else {
                continue;
            };
            if fields.get(field) == Some(value) {
                let file_id = name.strip_suffix(FILE_SUFFIX).unwrap_or(&name).to_string();
                return Ok(Some(wrap(fields, &file_id)));
            }
        }
        Ok(None)
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = list_files(&dir)?
            .into_iter()
            .filter_map(|(name, _)| name.strip_suffix(FILE_SUFFIX).map(str::to_string))
            .filter(|id| validate_id(id).is_ok())
            .collect();

        let records = ids
            .par_iter()
            .map(|id| self.get(collection, id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records.into_iter().flatten().collect())
    }

    fn save(
        &self,
        collection: Collection,
        record: &mut Record,
        object: &Object,
    ) -> Result<(), StoreError> {
        let id = match (self.is_saved(record), record.id(), object.id()) {
            (true, Some(id), _) => id.to_string(),
            (_, _, Some(id)) => id.to_string(),
            _ => time::new_record_id(),
        };
        validate_id(&id)?;
        self.ensure_folders(collection)?;
        let fields = object.strip();

        let mut payload = Fields::new();
        payload.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        for (k, v) in fields {
            if k != ID_FIELD {
                payload.insert(k, v);
            }
        }

        let path = self.record_path(collection, &id);
        fs::write(&path, serde_json::to_string_pretty(&payload)?)?;
        debug!(collection = collection.name, id = %id, path = %path.display(), "wrote record file");

        record.set_id(Some(id));
        record.set_data(payload);
        Ok(())
    }

    fn delete(&self, collection: Collection, record: &Record) -> Result<(), StoreError> {
        let id = record.id().ok_or(StoreError::NotSaved)?;
        validate_id(id)?;
        let path = self.record_path(collection, id);
        if !path.exists() {
            return Ok(());
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(collection = collection.name, id, "removed record file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::IoError(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Field;
    use serde_json::json;
    use tempfile::tempdir;

    const THINGS: Collection = Collection::new("things");

    #[test]
    fn test_folder_paths_parent_first() {
        let store = FileStore::new(Path::new("abc"));
        assert_eq!(
            store.folder_paths(Collection::new("def")),
            vec![PathBuf::from("abc"), Path::new("abc").join("def")]
        );
    }

    #[test]
    fn test_save_creates_missing_directories() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path().join("q").join("w");
        fs::create_dir(tmp.path().join("q")).unwrap();
        let store = FileStore::new(&root);

        let mut record = Record::new();
        store
            .save(THINGS, &mut record, &Object::new().with("fudge", json!("popsicle")))
            .expect("save");
        assert!(root.join("things").is_dir());
        assert!(store.record_path(THINGS, record.id().unwrap()).is_file());
    }

    #[test]
    fn test_save_writes_pretty_payload_with_id() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path());
        let mut record = Record::new();
        store
            .save(
                THINGS,
                &mut record,
                &Object::new().with("foo", json!(1)).with("bar", Field::Absent),
            )
            .expect("save");

        let id = record.id().unwrap().to_string();
        let written = fs::read_to_string(store.record_path(THINGS, &id)).unwrap();
        let expected = json!({"_id": id, "foo": 1});
        assert_eq!(written, serde_json::to_string_pretty(&expected).unwrap());
        assert!(written.contains("\n  \"foo\": 1"));
        assert_eq!(Value::Object(record.data().clone()), expected);
    }

    #[test]
    fn test_saved_record_overwrites_same_file() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path());
        let mut record = Record::new();
        record.set_id(Some("q3etwgjrhnft".to_string()));
        store
            .save(THINGS, &mut record, &Object::new().with("v", json!(1)))
            .unwrap();
        store
            .save(THINGS, &mut record, &Object::new().with("v", json!(2)))
            .unwrap();

        assert_eq!(record.id(), Some("q3etwgjrhnft"));
        let files = list_files(&tmp.path().join("things")).unwrap();
        assert_eq!(files.len(), 1);
        let loaded = store.get(THINGS, "q3etwgjrhnft").unwrap().unwrap();
        assert_eq!(loaded.get_field("v"), Some(&json!(2)));
    }

    #[test]
    fn test_get_missing_and_unparseable() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path());
        assert!(store.get(THINGS, "1").unwrap().is_none());

        fs::create_dir_all(tmp.path().join("things")).unwrap();
        fs::write(store.record_path(THINGS, "1"), r#"{"foo": bar ;}"#).unwrap();
        fs::write(store.record_path(THINGS, "2"), "[1, 2]").unwrap();
        fs::write(store.record_path(THINGS, "3"), r#"{"foo": "bar"}"#).unwrap();
        assert!(store.get(THINGS, "1").unwrap().is_none());
        assert!(store.get(THINGS, "2").unwrap().is_none());

        let found = store.get(THINGS, "3").unwrap().unwrap();
        assert_eq!(Value::Object(found.data().clone()), json!({"foo": "bar"}));
        assert_eq!(found.id(), Some("3"));
    }

    #[test]
    fn test_get_all_ignores_non_json_files() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path());
        let dir = tmp.path().join("things");
        fs::create_dir_all(&dir).unwrap();
        for name in ["b.json", "a.json", "c.json"] {
            fs::write(dir.join(name), r#"{"x": 1}"#).unwrap();
        }
        fs::write(dir.join("notes.txt"), r#"{"x": 1}"#).unwrap();
        fs::create_dir(dir.join("sub.json")).unwrap();

        let ids: Vec<String> = store
            .get_all(THINGS)
            .unwrap()
            .iter()
            .map(|r| r.id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path());
        let mut record = Record::new();
        store
            .save(THINGS, &mut record, &Object::new().with("a", json!(1)))
            .unwrap();
        let path = store.record_path(THINGS, record.id().unwrap());
        assert!(path.exists());

        store.delete(THINGS, &record).expect("first delete");
        assert!(!path.exists());
        store.delete(THINGS, &record).expect("second delete");
    }

    #[test]
    fn test_ids_cannot_escape_collection() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path());
        assert!(matches!(
            store.get(THINGS, "../secret"),
            Err(StoreError::InvalidId(_))
        ));
        let mut record = Record::new();
        let err = store
            .save(THINGS, &mut record, &Object::new().with("_id", json!("a/b")))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(_)));
        assert!(!tmp.path().join("things").exists());
        assert_eq!(record.id(), None);
    }

    #[test]
    fn test_non_utf8_file_reads_as_absent() {
        let tmp = tempdir().expect("tempdir");
        let store = FileStore::new(tmp.path());
        fs::create_dir_all(tmp.path().join("things")).unwrap();
        fs::write(store.record_path(THINGS, "bad"), [0xff, 0xfe, b'{', b'}']).unwrap();
        assert_eq!(read_fields(&store.record_path(THINGS, "bad")).unwrap(), None);
        assert!(store.get(THINGS, "bad").unwrap().is_none());
    }
}
