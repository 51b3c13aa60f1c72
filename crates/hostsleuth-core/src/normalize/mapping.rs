/// Raw source records → canonical entities.
use crate::model::{
    DeviceStatus, DriverDevice, ServiceRecord, ServiceState, SoftwareItem, SoftwareSource,
    StartupType,
};
use crate::platform::{DriverDetails, RawAppxPackage, RawDevice, RawService, RawUninstallEntry, RawWingetEntry};
use chrono::NaiveDate;

/// Release types that mark an uninstall entry as a patch rather than a product.
const UPDATE_RELEASE_TYPES: &[&str] = &["update", "hotfix", "security update", "service pack"];

/// Name fragments that identify runtimes and redistributables.
const FRAMEWORK_MARKERS: &[&str] = &[
    "redistributable",
    ".net framework",
    ".net runtime",
    "desktop runtime",
    "asp.net core",
    "windows app runtime",
    "vcredist",
];

pub fn software_from_uninstall(entry: &RawUninstallEntry) -> SoftwareItem {
    let release_type = entry.release_type.to_ascii_lowercase();
    SoftwareItem {
        name: entry.display_name.clone(),
        version: entry.display_version.clone(),
        publisher: entry.publisher.clone(),
        install_date: normalize_install_date(&entry.install_date),
        source: SoftwareSource::Registry,
        install_location: entry.install_location.clone(),
        architecture: match entry.view.as_str() {
            "64" => "x64".to_string(),
            "32" => "x86".to_string(),
            _ => String::new(),
        },
        size: entry.estimated_size.filter(|&kb| kb > 0),
        unique_id: entry.key_name.clone(),
        is_system_component: entry.system_component
            || !entry.parent_key_name.is_empty()
            || UPDATE_RELEASE_TYPES.contains(&release_type.as_str()),
        is_framework: looks_like_framework(&entry.display_name),
        uninstall_string: entry.uninstall_string.clone(),
        help_link: entry.help_link.clone(),
        comments: entry.comments.clone(),
        ..SoftwareItem::default()
    }
}

pub fn software_from_appx(pkg: &RawAppxPackage) -> SoftwareItem {
    let unique_id = if pkg.family_name.is_empty() {
        pkg.full_name.clone()
    } else {
        pkg.family_name.clone()
    };
    SoftwareItem {
        name: pkg.name.clone(),
        version: pkg.version.clone(),
        publisher: publisher_common_name(&pkg.publisher),
        source: SoftwareSource::AppX,
        install_location: pkg.install_location.clone(),
        architecture: pkg.architecture.to_ascii_lowercase(),
        unique_id,
        is_system_component: pkg.signature_kind.eq_ignore_ascii_case("System") || pkg.non_removable,
        is_framework: pkg.is_framework,
        ..SoftwareItem::default()
    }
}

pub fn software_from_winget(entry: &RawWingetEntry) -> SoftwareItem {
    SoftwareItem {
        name: entry.name.clone(),
        version: entry.version.clone(),
        source: SoftwareSource::Winget,
        unique_id: entry.id.clone(),
        is_framework: looks_like_framework(&entry.name),
        comments: if entry.available.is_empty() {
            String::new()
        } else {
            format!("Update available: {}", entry.available)
        },
        ..SoftwareItem::default()
    }
}

/// A device row; driver columns stay empty when `details` is `None`.
pub fn driver_from_raw(raw: &RawDevice, details: Option<&DriverDetails>) -> DriverDevice {
    let details = details.cloned().unwrap_or_default();
    DriverDevice {
        friendly_name: raw.friendly_name.clone(),
        class: raw.class.clone(),
        status: DeviceStatus::parse(&raw.status),
        present: raw.present,
        driver_version: details.version,
        driver_provider: details.provider,
        driver_date: details.date,
        driver_inf_path: details.inf_path,
        instance_id: raw.instance_id.clone(),
    }
}

/// A service row without security columns (they default to "N/A").
pub fn service_from_raw(raw: &RawService, delayed: Option<bool>) -> ServiceRecord {
    ServiceRecord {
        name: raw.name.clone(),
        display_name: raw.display_name.clone(),
        state: ServiceState::parse(&raw.state),
        startup_type: StartupType::resolve(&raw.start_mode, delayed),
        log_on_as: raw.start_name.clone(),
        exe_path: crate::analysis::resolve_image_path(&raw.path_name),
        exe_path_raw: raw.path_name.clone(),
        ..ServiceRecord::default()
    }
}

/// `YYYYMMDD` → `YYYY-MM-DD`; other values pass through trimmed.
pub fn normalize_install_date(raw: &str) -> String {
    let s = raw.trim();
    if s.len() == 8 {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
            return d.format("%Y-%m-%d").to_string();
        }
    }
    s.to_string()
}

fn looks_like_framework(name: &str) -> bool {
    let lower = name.to_lowercase();
    FRAMEWORK_MARKERS.iter().any(|m| lower.contains(m))
}

/// `CN=Contoso Ltd, O=Contoso` → `Contoso Ltd`.
fn publisher_common_name(dn: &str) -> String {
    dn.split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("CN="))
        .unwrap_or(dn)
        .trim()
        .to_string()
}
