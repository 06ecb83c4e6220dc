use crate::core::model::Model;
use crate::core::record::{Field, Fields, ID_FIELD, Object, Record};
use serde_json::Value;

const NAME: &str = "name";
const PREFIX: &str = "prefix";
const LOCALE: &str = "locale";
const DATE_SETTINGS: &str = "dateSettings";

/// Per-guild settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GuildProfile {
    record: Record,
}

impl GuildProfile {
    pub fn new(guild_id: &str, name: &str) -> Self {
        let mut record = Record::new();
        record.set_field(ID_FIELD, guild_id);
        record.set_field(NAME, name);
        record.set_id(Some(guild_id.to_string()));
        Self { record }
    }

    pub fn name(&self) -> &str {
        self.record
            .get_field(NAME)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn set_name(&mut self, name: &str) {
        self.record.set_field(NAME, name);
    }

    pub fn prefix(&self) -> Option<&str> {
        self.record.get_field(PREFIX).and_then(Value::as_str)
    }

    /// Command prefix, falling back to `default` when unset.
    pub fn prefix_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.prefix().unwrap_or(default)
    }

    pub fn set_prefix(&mut self, prefix: Option<&str>) {
        match prefix {
            Some(p) => self.record.set_field(PREFIX, p),
            None => {
                self.record.remove_field(PREFIX);
            }
        }
    }

    pub fn locale(&self) -> Option<&str> {
        self.record.get_field(LOCALE).and_then(Value::as_str)
    }

    pub fn set_locale(&mut self, locale: Option<&str>) {
        match locale {
            Some(l) => self.record.set_field(LOCALE, l),
            None => {
                self.record.remove_field(LOCALE);
            }
        }
    }

    pub fn date_settings(&self) -> Fields {
        match self.record.get_field(DATE_SETTINGS) {
            Some(Value::Object(map)) => map.clone(),
            _ => Fields::new(),
        }
    }

    pub fn set_date_setting(&mut self, key: &str, value: impl Into<Value>) {
        let mut settings = self.date_settings();
        settings.insert(key.to_string(), value.into());
        self.record.set_field(DATE_SETTINGS, Value::Object(settings));
    }

    pub fn clear_date_settings(&mut self) {
        self.record.remove_field(DATE_SETTINGS);
    }
}

impl Model for GuildProfile {
    const COLLECTION: &'static str = "guilds";
    const PROJECTION: &'static [&'static str] = &[NAME, PREFIX, LOCALE, DATE_SETTINGS];

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
        Object::new()
            .with(ID_FIELD, Field::optional(self.record.id()))
            .with(NAME, Value::from(self.name()))
            .with(PREFIX, Field::optional(self.prefix()))
            .with(LOCALE, Field::optional(self.locale()))
            .with(DATE_SETTINGS, Field::object(self.date_settings()))
    }
}
