/// Snapshot diff engine.
///
/// Matches two point-in-time collections of [`Record`]s by identity key and
/// classifies every key as added, removed, changed or unchanged, with one
/// [`DiffRecord`] per differing field for changed keys.
///
/// Output order: added and changed/unchanged keys follow the current
/// collection, removed keys follow the baseline. Within a changed key the
/// records follow the compare-field order.
pub mod software;

pub use software::compare_software;

use crate::model::{Entity, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Removed,
    Changed,
    Unchanged,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Removed => "Removed",
            Self::Changed => "Changed",
            Self::Unchanged => "Unchanged",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of diff output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiffRecord {
    pub change_type: ChangeType,
    pub key: String,
    /// Name of the changed field; empty unless `Changed`.
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub summary: String,
}

impl DiffRecord {
    /// Export columns.
    pub const FIELDS: &'static [&'static str] =
        &["ChangeType", "Key", "Field", "OldValue", "NewValue", "Summary"];

    pub fn to_record(&self) -> Record {
        Record::from_pairs([
            ("ChangeType", self.change_type.as_str().to_string()),
            ("Key", self.key.clone()),
            ("Field", self.field.clone()),
            ("OldValue", self.old_value.clone()),
            ("NewValue", self.new_value.clone()),
            ("Summary", self.summary.clone()),
        ])
    }
}

/// Counts per change type. `changed_keys` counts keys, `changed_fields`
/// counts Changed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub changed_keys: usize,
    pub changed_fields: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn from_records(records: &[DiffRecord]) -> Self {
        let mut summary = Self::default();
        let mut last_changed_key: Option<&str> = None;
        for r in records {
            match r.change_type {
                ChangeType::Added => summary.added += 1,
                ChangeType::Removed => summary.removed += 1,
                ChangeType::Unchanged => summary.unchanged += 1,
                ChangeType::Changed => {
                    summary.changed_fields += 1;
                    if last_changed_key != Some(r.key.as_str()) {
                        summary.changed_keys += 1;
                        last_changed_key = Some(r.key.as_str());
                    }
                }
            }
        }
        summary
    }

    pub fn has_differences(&self) -> bool {
        self.added + self.removed + self.changed_keys > 0
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} changed ({} fields), {} unchanged",
            self.added, self.removed, self.changed_keys, self.changed_fields, self.unchanged
        )
    }
}

/// Diff two collections keyed by the exact value of `key_field`.
pub fn diff_records(
    baseline: &[Record],
    current: &[Record],
    key_field: &str,
    compare_fields: &[&str],
) -> Vec<DiffRecord> {
    diff_records_by(
        baseline,
        current,
        |r: &Record| r.value(key_field).to_string(),
        compare_fields,
    )
}

/// Diff typed entities against imported baseline records, using the
/// entity's identity key and compare fields.
pub fn diff_entities<E: Entity>(baseline: &[Record], current: &[E]) -> Vec<DiffRecord> {
    let current: Vec<Record> = current.iter().map(Entity::to_record).collect();
    diff_records_by(baseline, &current, E::record_key, E::COMPARE_FIELDS)
}

/// Diff two collections with an arbitrary key function.
///
/// Every key is reported, including the empty one; empty keys are logged.
/// On duplicate keys the last record wins and the duplicates are logged.
pub fn diff_records_by<K>(
    baseline: &[Record],
    current: &[Record],
    key_of: K,
    compare_fields: &[&str],
) -> Vec<DiffRecord>
where
    K: Fn(&Record) -> String,
{
    let (base_order, base_map) = index_by_key(baseline, &key_of, "baseline");
    let (cur_order, cur_map) = index_by_key(current, &key_of, "current");

    let mut out = Vec::with_capacity(cur_order.len() + base_order.len());

    for key in &cur_order {
        let cur = cur_map[key.as_str()];
        match base_map.get(key.as_str()) {
            None => out.push(DiffRecord {
                change_type: ChangeType::Added,
                key: key.clone(),
                field: String::new(),
                old_value: String::new(),
                new_value: field_pairs(cur, compare_fields),
                summary: format!("{key} added"),
            }),
            Some(base) => {
                let before = out.len();
                for &field in compare_fields {
                    let old = base.value(field).trim();
                    let new = cur.value(field).trim();
                    if old != new {
                        out.push(DiffRecord {
                            change_type: ChangeType::Changed,
                            key: key.clone(),
                            field: field.to_string(),
                            old_value: old.to_string(),
                            new_value: new.to_string(),
                            summary: format!("{key} -> {field}: '{old}' -> '{new}'"),
                        });
                    }
                }
                if out.len() == before {
                    out.push(DiffRecord {
                        change_type: ChangeType::Unchanged,
                        key: key.clone(),
                        field: String::new(),
                        old_value: String::new(),
                        new_value: String::new(),
                        summary: format!("{key} unchanged"),
                    });
                }
            }
        }
    }

    for key in &base_order {
        if !cur_map.contains_key(key.as_str()) {
            out.push(DiffRecord {
                change_type: ChangeType::Removed,
                key: key.clone(),
                field: String::new(),
                old_value: field_pairs(base_map[key.as_str()], compare_fields),
                new_value: String::new(),
                summary: format!("{key} removed"),
            });
        }
    }

    out
}

/// First-seen key order plus a key → last-record map.
fn index_by_key<'a, K>(
    records: &'a [Record],
    key_of: &K,
    side: &str,
) -> (Vec<String>, HashMap<String, &'a Record>)
where
    K: Fn(&Record) -> String,
{
    let mut order = Vec::with_capacity(records.len());
    let mut map: HashMap<String, &Record> = HashMap::with_capacity(records.len());
    let mut empty = 0usize;
    let mut duplicates = 0usize;

    for record in records {
        let key = key_of(record);
        if key.is_empty() {
            empty += 1;
        }
        if map.insert(key.clone(), record).is_some() {
            duplicates += 1;
        } else {
            order.push(key);
        }
    }

    if empty > 0 {
        warn!("{empty} {side} records have an empty key");
    }
    if duplicates > 0 {
        warn!("{duplicates} duplicate keys in {side} collection; the last occurrence was used");
    }
    (order, map)
}

/// `field=value` for each compare field, joined with `; `.
fn field_pairs(record: &Record, fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| format!("{f}={}", record.value(f).trim()))
        .collect::<Vec<_>>()
        .join("; ")
}
