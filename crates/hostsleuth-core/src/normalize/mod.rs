/// Entity normalizer: turns raw adapter output into the canonical,
/// filtered and sorted collection for each domain.
///
/// Pipeline per domain: map raw records, drop duplicates by identity key,
/// apply exclusion patterns and visibility toggles, overlay custom names
/// (software only), sort. Exclusions match the source name and identifier,
/// never a custom name.
pub mod filter;
pub mod mapping;
pub mod naming;

pub use filter::{invalid_patterns, ExclusionFilter, VisibilityFilter};
pub use mapping::{
    driver_from_raw, service_from_raw, software_from_appx, software_from_uninstall,
    software_from_winget,
};
pub use naming::{compare_names, sort_drivers, sort_services, sort_software, CustomNames};

use crate::model::{DriverDevice, Entity, ServiceRecord, SoftwareItem};
use std::collections::HashSet;
use tracing::debug;

/// Keep the first entity for each identity key.
fn dedupe<E: Entity>(items: Vec<E>) -> Vec<E> {
    let mut seen = HashSet::with_capacity(items.len());
    let before = items.len();
    let kept: Vec<E> = items
        .into_iter()
        .filter(|item| seen.insert(item.identity_key()))
        .collect();
    if kept.len() < before {
        debug!(
            "Dropped {} duplicate {} entries",
            before - kept.len(),
            E::DOMAIN
        );
    }
    kept
}

pub fn normalize_software(
    items: Vec<SoftwareItem>,
    exclusions: &ExclusionFilter,
    visibility: &VisibilityFilter,
    names: &CustomNames,
) -> Vec<SoftwareItem> {
    let mut items = dedupe(items);
    items.retain(|s| {
        (visibility.show_system_components || !s.is_system_component)
            && (visibility.show_frameworks || !s.is_framework)
            && !exclusions.is_excluded(&[s.name.as_str(), s.unique_id.as_str()])
    });
    names.apply(&mut items);
    sort_software(&mut items);
    items
}

pub fn normalize_drivers(
    items: Vec<DriverDevice>,
    exclusions: &ExclusionFilter,
    visibility: &VisibilityFilter,
) -> Vec<DriverDevice> {
    let mut items = dedupe(items);
    items.retain(|d| {
        (visibility.show_non_present || d.present)
            && !exclusions.is_excluded(&[d.friendly_name.as_str(), d.instance_id.as_str()])
    });
    sort_drivers(&mut items);
    items
}

pub fn normalize_services(
    items: Vec<ServiceRecord>,
    exclusions: &ExclusionFilter,
) -> Vec<ServiceRecord> {
    let mut items = dedupe(items);
    items.retain(|s| !exclusions.is_excluded(&[s.name.as_str(), s.display_name.as_str()]));
    sort_services(&mut items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SoftwareSource;

    fn sw(name: &str, id: &str) -> SoftwareItem {
        SoftwareItem {
            name: name.into(),
            unique_id: id.into(),
            source: SoftwareSource::Registry,
            ..Default::default()
        }
    }

    #[test]
    fn software_pipeline() {
        let mut system = sw("KB5034441", "KB5034441");
        system.is_system_component = true;
        let mut runtime = sw("Microsoft .NET Runtime", "{NET}");
        runtime.is_framework = true;
        let items = vec![
            sw("zoom", "{Z}"),
            sw("Adobe Reader", "{A}"),
            sw("Adobe Reader duplicate", "{A}"),
            sw("Telemetry Agent", "{T}"),
            system,
            runtime,
        ];
        let exclusions = ExclusionFilter::new(&["telemetry"]);
        let mut names = CustomNames::default();
        names.set("Registry::{Z}", "Zoom Workplace");

        let out = normalize_software(
            items.clone(),
            &exclusions,
            &VisibilityFilter::default(),
            &names,
        );
        let shown: Vec<&str> = out.iter().map(|s| s.display_name()).collect();
        assert_eq!(shown, vec!["Adobe Reader", "Zoom Workplace"]);

        let everything = VisibilityFilter {
            show_system_components: true,
            show_frameworks: true,
            show_non_present: false,
        };
        let out = normalize_software(items, &ExclusionFilter::default(), &everything, &names);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn exclusions_ignore_custom_names() {
        let items = vec![sw("Contoso Agent", "{C}"), sw("Telemetry Helper", "{T}")];
        let mut names = CustomNames::default();
        names.set("Registry::{C}", "Telemetry Collector");
        names.set("Registry::{T}", "Helper");

        let out = normalize_software(
            items,
            &ExclusionFilter::new(&["telemetry"]),
            &VisibilityFilter::default(),
            &names,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].unique_id, "{C}");
        assert_eq!(out[0].display_name(), "Telemetry Collector");
    }

    #[test]
    fn exclusion_matches_unique_id() {
        let out = normalize_software(
            vec![sw("Harmless", "Contoso.Tracker")],
            &ExclusionFilter::new(&["tracker"]),
            &VisibilityFilter::default(),
            &CustomNames::default(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn drivers_hide_non_present_by_default() {
        let attached = DriverDevice {
            friendly_name: "Keyboard".into(),
            instance_id: "HID\\1".into(),
            present: true,
            ..Default::default()
        };
        let ghost = DriverDevice {
            friendly_name: "Old Mouse".into(),
            instance_id: "HID\\2".into(),
            present: false,
            ..Default::default()
        };
        let items = vec![ghost, attached];
        let none = ExclusionFilter::default();

        let out = normalize_drivers(items.clone(), &none, &VisibilityFilter::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].friendly_name, "Keyboard");

        let show = VisibilityFilter {
            show_non_present: true,
            ..Default::default()
        };
        assert_eq!(normalize_drivers(items, &none, &show).len(), 2);
    }

    #[test]
    fn services_exclusion_matches_display_name() {
        let items = vec![
            ServiceRecord {
                name: "XblGameSave".into(),
                display_name: "Xbox Live Game Save".into(),
                ..Default::default()
            },
            ServiceRecord {
                name: "Spooler".into(),
                display_name: "Print Spooler".into(),
                ..Default::default()
            },
        ];
        let out = normalize_services(items, &ExclusionFilter::new(&["^xbox"]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Spooler");
    }
}
