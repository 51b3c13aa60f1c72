/// Baseline comparison for the software list.
///
/// Annotates the live collection in place: new entries become `NEW`,
/// version changes become `UPDATED` with the previous version recorded, and
/// entries only present in the baseline are appended as `REMOVED`.
use super::{diff_records_by, ChangeType, DiffRecord};
use crate::model::{ChangeStatus, Entity, Record, SoftwareItem};
use std::collections::HashMap;

/// Fields compared when annotating software.
pub const SOFTWARE_CHANGE_FIELDS: &[&str] = &["Version"];

/// Compare `current` against `baseline` and annotate it.
///
/// Any earlier annotation (including previously appended `REMOVED` rows) is
/// cleared first, so running the comparison twice gives the same result.
pub fn compare_software(baseline: &[Record], current: &mut Vec<SoftwareItem>) -> Vec<DiffRecord> {
    current.retain(|s| s.change_status != ChangeStatus::Removed);
    for item in current.iter_mut() {
        item.change_status = ChangeStatus::None;
        item.previous_version.clear();
    }

    let current_records: Vec<Record> = current.iter().map(Entity::to_record).collect();
    let diff = diff_records_by(
        baseline,
        &current_records,
        SoftwareItem::record_key,
        SOFTWARE_CHANGE_FIELDS,
    );

    let positions: HashMap<String, usize> = current
        .iter()
        .enumerate()
        .map(|(i, s)| (s.identity_key(), i))
        .collect();
    let baseline_by_key: HashMap<String, &Record> = baseline
        .iter()
        .map(|r| (SoftwareItem::record_key(r), r))
        .collect();

    let mut removed = Vec::new();
    for d in &diff {
        match d.change_type {
            ChangeType::Added => {
                if let Some(&i) = positions.get(&d.key) {
                    current[i].change_status = ChangeStatus::New;
                }
            }
            ChangeType::Changed => {
                if let Some(&i) = positions.get(&d.key) {
                    current[i].change_status = ChangeStatus::Updated;
                    current[i].previous_version = d.old_value.clone();
                }
            }
            ChangeType::Removed => {
                if let Some(record) = baseline_by_key.get(&d.key) {
                    let mut item = SoftwareItem::from_record(record);
                    item.custom_name.clear();
                    item.change_status = ChangeStatus::Removed;
                    item.previous_version.clear();
                    removed.push(item);
                }
            }
            ChangeType::Unchanged => {}
        }
    }
    current.extend(removed);
    diff
}
