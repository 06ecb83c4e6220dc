//! Entity descriptor contract.

use crate::core::record::{Object, Record};

/// Implemented by every persisted entity type.
///
/// `COLLECTION` names the database table and the file backend directory.
/// `PROJECTION` restricts the top-level fields returned by database queries
/// (`get_by`, `get_all`); `_id` is always included. An empty projection
/// requests every field.
pub trait Model: Sized {
    const COLLECTION: &'static str;
    const PROJECTION: &'static [&'static str] = &[];

    fn from_record(record: Record) -> Self;
    fn record(&self) -> &Record;
    fn record_mut(&mut self) -> &mut Record;

    /// Persistable form of the current state. Fields that must not be
    /// written are `Field::Absent`.
    fn to_object(&self) -> Object;

    fn collection() -> Collection {
        Collection {
            name: Self::COLLECTION,
            projection: Self::PROJECTION,
        }
    }

    fn id(&self) -> Option<&str> {
        self.record().id()
    }
}

/// Backend-facing view of a `Model`'s descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub name: &'static str,
    pub projection: &'static [&'static str],
}

impl Collection {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            projection: &[],
        }
    }
}
