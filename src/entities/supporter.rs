//! Patron supporters and the guilds they back.

use crate::core::error::StoreError;
use crate::core::model::Model;
use crate::core::record::{Field, ID_FIELD, Object, Record};
use crate::core::store::Store;
use serde_json::Value;

const GUILDS: &str = "guilds";
const PATRON: &str = "patron";
const MAX_GUILDS: &str = "maxGuilds";
const EXPIRE_AT: &str = "expireAt";
const COMMENT: &str = "comment";

/// Guild allowance when a supporter has no explicit `maxGuilds`.
pub const DEFAULT_MAX_GUILDS: u64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Supporter {
    record: Record,
}

impl Supporter {
    /// New supporter keyed by the user id.
    pub fn new(user_id: &str) -> Self {
        let mut record = Record::new();
        record.set_field(ID_FIELD, user_id);
        record.set_field(GUILDS, Value::Array(Vec::new()));
        record.set_id(Some(user_id.to_string()));
        Self { record }
    }

    pub fn guilds(&self) -> Vec<String> {
        match self.record.get_field(GUILDS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn set_guilds(&mut self, guilds: Vec<String>) {
        self.record.set_field(
            GUILDS,
            Value::Array(guilds.into_iter().map(Value::String).collect()),
        );
    }

    /// Add a guild. Returns false when it is already backed.
    pub fn add_guild(&mut self, guild_id: &str) -> bool {
        let mut guilds = self.guilds();
        if guilds.iter().any(|g| g == guild_id) {
            return false;
        }
        guilds.push(guild_id.to_string());
        self.set_guilds(guilds);
        true
    }

    /// Remove a guild. Returns false when it was not backed.
    pub fn remove_guild(&mut self, guild_id: &str) -> bool {
        let mut guilds = self.guilds();
        let before = guilds.len();
        guilds.retain(|g| g != guild_id);
        if guilds.len() == before {
            return false;
        }
        self.set_guilds(guilds);
        true
    }

    pub fn patron(&self) -> Option<bool> {
        self.record.get_field(PATRON).and_then(Value::as_bool)
    }

    pub fn set_patron(&mut self, patron: Option<bool>) {
        match patron {
            Some(p) => self.record.set_field(PATRON, p),
            None => {
                self.record.remove_field(PATRON);
            }
        }
    }

    pub fn max_guilds(&self) -> u64 {
        self.record
            .get_field(MAX_GUILDS)
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_GUILDS)
    }

    pub fn set_max_guilds(&mut self, max: Option<u64>) {
        match max {
            Some(m) => self.record.set_field(MAX_GUILDS, m),
            None => {
                self.record.remove_field(MAX_GUILDS);
            }
        }
    }

    pub fn expire_at(&self) -> Option<&str> {
        self.record.get_field(EXPIRE_AT).and_then(Value::as_str)
    }

    /// Expiry as an RFC 3339 UTC timestamp (`2026-01-31T00:00:00Z`).
    pub fn set_expire_at(&mut self, expire_at: Option<&str>) {
        match expire_at {
            Some(ts) => self.record.set_field(EXPIRE_AT, ts),
            None => {
                self.record.remove_field(EXPIRE_AT);
            }
        }
    }

    pub fn comment(&self) -> Option<&str> {
        self.record.get_field(COMMENT).and_then(Value::as_str)
    }

    pub fn set_comment(&mut self, comment: Option<&str>) {
        match comment {
            Some(c) => self.record.set_field(COMMENT, c),
            None => {
                self.record.remove_field(COMMENT);
            }
        }
    }

    /// Whether another guild fits under the allowance.
    pub fn has_capacity(&self) -> bool {
        (self.guilds().len() as u64) < self.max_guilds()
    }

    /// Valid unless explicitly not a patron or expired at `now`.
    /// Timestamps are RFC 3339 UTC strings, which order lexicographically.
    pub fn is_valid(&self, now: &str) -> bool {
        if self.patron() == Some(false) {
            return false;
        }
        match self.expire_at() {
            Some(expire_at) => expire_at > now,
            None => true,
        }
    }

    /// Every guild backed by a supporter that is valid at `now`.
    pub fn valid_guilds(store: &Store, now: &str) -> Result<Vec<String>, StoreError> {
        let mut guilds = Vec::new();
        for supporter in store.get_all::<Supporter>()? {
            if !supporter.is_valid(now) {
                continue;
            }
            for guild in supporter.guilds() {
                if !guilds.contains(&guild) {
                    guilds.push(guild);
                }
            }
        }
        Ok(guilds)
    }
}

impl Model for Supporter {
    const COLLECTION: &'static str = "supporters";

    fn from_record(record: Record) -> Self {
        Self { record }
    }

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn to_object(&self) -> Object {
        let field = |name: &str| Field::optional(self.record.get_field(name).cloned());
        Object::new()
            .with(ID_FIELD, Field::optional(self.record.id()))
            .with(
                GUILDS,
                Value::Array(self.guilds().into_iter().map(Value::String).collect()),
            )
            .with(PATRON, field(PATRON))
            .with(MAX_GUILDS, field(MAX_GUILDS))
            .with(EXPIRE_AT, field(EXPIRE_AT))
            .with(COMMENT, field(COMMENT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guild_list_edits() {
        let mut supporter = Supporter::new("user-1");
        assert!(supporter.guilds().is_empty());
        assert!(supporter.add_guild("g1"));
        assert!(!supporter.add_guild("g1"));
        assert!(supporter.add_guild("g2"));
        assert_eq!(supporter.guilds(), vec!["g1", "g2"]);
        assert!(supporter.remove_guild("g1"));
        assert!(!supporter.remove_guild("g1"));
        assert_eq!(supporter.guilds(), vec!["g2"]);
    }

    #[test]
    fn test_capacity_defaults_to_one() {
        let mut supporter = Supporter::new("user-1");
        assert_eq!(supporter.max_guilds(), DEFAULT_MAX_GUILDS);
        assert!(supporter.has_capacity());
        supporter.add_guild("g1");
        assert!(!supporter.has_capacity());
        supporter.set_max_guilds(Some(3));
        assert!(supporter.has_capacity());
    }

    #[test]
    fn test_validity() {
        let now = "2026-10-19T12:00:00Z";
        let mut supporter = Supporter::new("user-1");
        assert!(supporter.is_valid(now));
        supporter.set_expire_at(Some("2026-10-01T00:00:00Z"));
        assert!(!supporter.is_valid(now));
        supporter.set_expire_at(Some("2027-01-01T00:00:00Z"));
        assert!(supporter.is_valid(now));
        supporter.set_patron(Some(false));
        assert!(!supporter.is_valid(now));
    }

    #[test]
    fn test_to_object_marks_unset_fields_absent() {
        let mut supporter = Supporter::new("user-1");
        supporter.set_comment(Some("thanks"));
        let stripped = supporter.to_object().strip();
        assert_eq!(
            Value::Object(stripped),
            json!({"_id": "user-1", "guilds": [], "comment": "thanks"})
        );
        assert!(supporter.to_object().get(PATRON).unwrap().is_absent());
    }
}
