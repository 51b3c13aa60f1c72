/// Open-schema record: the shape the diff engine and report sink work on.
///
/// Every inventory entity converts to and from a [`Record`] through the
/// [`Entity`] trait, so one diff engine and one exporter serve software,
/// drivers and services alike. Field names are short ASCII identifiers and
/// fit inline in a `CompactString`.
use super::Domain;
use compact_str::CompactString;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// An insertion-ordered list of `field name -> string value` pairs.
///
/// Entities carry between 9 and 17 fields. Lookups are a linear scan and
/// insertion order is the export column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(CompactString, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Build a record from `(name, value)` pairs. Later duplicates replace
    /// earlier ones.
    pub fn from_pairs<N, V, I>(pairs: I) -> Self
    where
        N: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (N, V)>,
    {
        let mut record = Self::new();
        for (name, value) in pairs {
            record.insert(name.as_ref(), value);
        }
        record
    }

    /// Set `name` to `value`, replacing an existing value in place.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((CompactString::new(name), value)),
        }
    }

    /// Value of `name`, or `None` when the field is absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `name`, with a missing field read as the empty string.
    pub fn value(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n.as_str() == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}

/// A canonical inventory entity with a typed boundary to [`Record`].
pub trait Entity: Sized {
    /// The inventory domain this entity belongs to.
    const DOMAIN: Domain;

    /// Every exported field, in column order.
    const FIELDS: &'static [&'static str];

    /// Field holding the identity key in exported data.
    const KEY_FIELD: &'static str;

    /// Fields compared by the snapshot diff, in report order.
    const COMPARE_FIELDS: &'static [&'static str];

    /// Every field [`Self::record_key`] reads.
    const IDENTITY_FIELDS: &'static [&'static str];

    fn to_record(&self) -> Record;

    /// Rebuild an entity from a record. Missing or unparsable fields fall
    /// back to their defaults; validation of required columns happens at
    /// import time.
    fn from_record(record: &Record) -> Self;

    /// Identity key of a record in this domain.
    ///
    /// Defaults to the exact [`Self::KEY_FIELD`] value. Domains with a
    /// composite identity override this.
    fn record_key(record: &Record) -> String {
        record.value(Self::KEY_FIELD).to_string()
    }

    fn identity_key(&self) -> String {
        Self::record_key(&self.to_record())
    }
}

/// Convert a slice of entities into records.
pub fn to_records<E: Entity>(items: &[E]) -> Vec<Record> {
    items.iter().map(Entity::to_record).collect()
}

/// Render a boolean the way exported reports and baselines spell it.
pub fn bool_str(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Parse a boolean field leniently: `true`, `1` and `yes` in any case are
/// true, everything else (including empty) is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place_and_keeps_order() {
        let mut r = Record::new();
        r.insert("Name", "Foo");
        r.insert("Version", "1.0");
        r.insert("Name", "Bar");

        let names: Vec<&str> = r.field_names().collect();
        assert_eq!(names, vec!["Name", "Version"]);
        assert_eq!(r.value("Name"), "Bar");
    }

    #[test]
    fn missing_field_reads_as_empty() {
        let r = Record::from_pairs([("Name", "Foo")]);
        assert_eq!(r.get("Version"), None);
        assert_eq!(r.value("Version"), "");
    }

    #[test]
    fn serialises_as_json_object_in_field_order() {
        let r = Record::from_pairs([("Name", "Foo"), ("Version", "1.0")]);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"Name":"Foo","Version":"1.0"}"#);
    }

    #[test]
    fn parse_bool_is_lenient() {
        assert!(parse_bool("True"));
        assert!(parse_bool(" yes "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("False"));
        assert!(!parse_bool(""));
        assert!(!parse_bool("maybe"));
    }
}
