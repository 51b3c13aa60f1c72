/// Custom display names and the sort order used for every listing.
use crate::model::{DriverDevice, Entity, ServiceRecord, SoftwareItem};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// User-assigned software names keyed by identity key
/// (`Source::UniqueId`). The identity key itself never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomNames(BTreeMap<String, String>);

impl CustomNames {
    pub fn get(&self, identity_key: &str) -> Option<&str> {
        self.0.get(identity_key).map(String::as_str)
    }

    /// Assign a name; a blank name removes the entry.
    pub fn set(&mut self, identity_key: impl Into<String>, name: impl Into<String>) {
        let key = identity_key.into();
        let name = name.into();
        if name.trim().is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, name.trim().to_string());
        }
    }

    pub fn remove(&mut self, identity_key: &str) -> Option<String> {
        self.0.remove(identity_key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay custom names onto `items`. Items without an entry keep an
    /// empty `custom_name`.
    pub fn apply(&self, items: &mut [SoftwareItem]) {
        for item in items {
            item.custom_name = self
                .get(&item.identity_key())
                .map(ToString::to_string)
                .unwrap_or_default();
        }
    }
}

/// Case-insensitive order with a case-sensitive tiebreak, so the result is
/// total and stable across runs.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub fn sort_software(items: &mut [SoftwareItem]) {
    items.sort_by(|a, b| {
        compare_names(a.display_name(), b.display_name())
            .then_with(|| a.identity_key().cmp(&b.identity_key()))
    });
}

pub fn sort_drivers(items: &mut [DriverDevice]) {
    items.sort_by(|a, b| {
        compare_names(&a.friendly_name, &b.friendly_name)
            .then_with(|| a.instance_id.cmp(&b.instance_id))
    });
}

/// Services sort by display name, falling back to the key name.
pub fn sort_services(items: &mut [ServiceRecord]) {
    fn label(s: &ServiceRecord) -> &str {
        if s.display_name.is_empty() {
            &s.name
        } else {
            &s.display_name
        }
    }
    items.sort_by(|a, b| compare_names(label(a), label(b)).then_with(|| a.name.cmp(&b.name)));
}
