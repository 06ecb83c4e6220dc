//! In-memory record state and the serialized form handed to backends.

use serde_json::{Map, Value};

/// Field name carrying the record identifier in every persisted payload.
pub const ID_FIELD: &str = "_id";

pub type Fields = Map<String, Value>;

/// Handle to a live document in the database backend.
///
/// Holds the canonical stored fields plus the revision the handle was read
/// or written at. Updates are applied to the handle first and then persisted
/// in place by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    collection: String,
    id: String,
    rev: i64,
    fields: Fields,
}

impl Document {
    pub(crate) fn new(collection: &str, id: &str, rev: i64, fields: Fields) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
            rev,
            fields,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rev(&self) -> i64 {
        self.rev
    }

    /// Apply one incremental update. An absent field unsets the key.
    pub fn set(&mut self, key: &str, field: Field) {
        match field {
            Field::Value(value) => {
                self.fields.insert(key.to_string(), value);
            }
            Field::Absent => {
                self.fields.shift_remove(key);
            }
        }
    }

    /// Canonical plain representation of the stored document.
    pub fn to_object(&self) -> Fields {
        self.fields.clone()
    }
}

/// One slot of a serialized object: a real value (including `null`) or the
/// marker for "do not persist this key".
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    Absent,
}

impl Field {
    pub fn optional<T: Into<Value>>(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Value(v.into()),
            None => Field::Absent,
        }
    }

    /// Embedded object that only counts as present when it has keys.
    pub fn object(map: Fields) -> Self {
        match resolve_object(map) {
            Some(map) => Field::Value(Value::Object(map)),
            None => Field::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

/// Ordered serialized form of an entity, produced by `Model::to_object`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    entries: Vec<(String, Field)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an earlier entry with the same name in place.
    pub fn insert(&mut self, key: impl Into<String>, field: impl Into<Field>) {
        let key = key.into();
        let field = field.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = field,
            None => self.entries.push((key, field)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, field: impl Into<Field>) -> Self {
        self.insert(key, field);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.entries.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// String `_id` carried by the object, if any.
    pub fn id(&self) -> Option<&str> {
        match self.get(ID_FIELD) {
            Some(Field::Value(Value::String(id))) => Some(id.as_str()),
            _ => None,
        }
    }

    /// Drop absent fields, keeping the order of the rest.
    pub fn strip(&self) -> Fields {
        self.entries
            .iter()
            .filter_map(|(k, f)| match f {
                Field::Value(v) => Some((k.clone(), v.clone())),
                Field::Absent => None,
            })
            .collect()
    }
}

impl From<Fields> for Object {
    fn from(fields: Fields) -> Self {
        Self {
            entries: fields
                .into_iter()
                .map(|(k, v)| (k, Field::Value(v)))
                .collect(),
        }
    }
}

/// `None` for an empty mapping, otherwise the mapping unchanged.
pub fn resolve_object(map: Fields) -> Option<Fields> {
    if map.is_empty() { None } else { Some(map) }
}

/// The unit of persistence: field data, identity and (database backend only)
/// the live document handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    data: Fields,
    id: Option<String>,
    document: Option<Document>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap seed data. The id is taken from a string `_id` field.
    pub fn from_data(data: Fields) -> Self {
        let id = match data.get(ID_FIELD) {
            Some(Value::String(id)) => Some(id.clone()),
            _ => None,
        };
        Self {
            data,
            id,
            document: None,
        }
    }

    pub(crate) fn from_document(document: Document) -> Self {
        Self {
            data: document.to_object(),
            id: Some(document.id().to_string()),
            document: Some(document),
        }
    }

    pub fn data(&self) -> &Fields {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Fields {
        &mut self.data
    }

    pub(crate) fn set_data(&mut self, data: Fields) {
        self.data = data;
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub(crate) fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    pub fn set_document(&mut self, document: Option<Document>) {
        self.document = document;
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(name.into(), value.into());
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.data.shift_remove(name)
    }
}
