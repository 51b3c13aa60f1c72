/// Installed software entries gathered from the registry uninstall keys,
/// AppX packages, and winget.
use super::record::{bool_str, parse_bool, Entity, Record};
use super::Domain;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a software entry was discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoftwareSource {
    #[default]
    Registry,
    AppX,
    Winget,
}

impl SoftwareSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registry => "Registry",
            Self::AppX => "AppX",
            Self::Winget => "Winget",
        }
    }
}

impl fmt::Display for SoftwareSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoftwareSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registry" => Ok(Self::Registry),
            "appx" => Ok(Self::AppX),
            "winget" => Ok(Self::Winget),
            other => Err(format!("unknown software source '{other}'")),
        }
    }
}

/// Result of comparing an entry against a baseline. Empty until a
/// comparison has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeStatus {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "UPDATED")]
    Updated,
    #[serde(rename = "REMOVED")]
    Removed,
}

impl ChangeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::New => "NEW",
            Self::Updated => "UPDATED",
            Self::Removed => "REMOVED",
        }
    }

    /// Lenient parse; anything unrecognised is `None`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Self::New,
            "UPDATED" => Self::Updated,
            "REMOVED" => Self::Removed,
            _ => Self::None,
        }
    }
}

/// One installed software package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SoftwareItem {
    pub name: String,
    /// User-supplied display name; never part of the identity key.
    pub custom_name: String,
    pub version: String,
    pub publisher: String,
    pub install_date: String,
    pub source: SoftwareSource,
    pub install_location: String,
    pub architecture: String,
    /// Estimated size in KiB as reported by the source, if any.
    pub size: Option<u64>,
    /// Source-scoped identity (registry key name, package family, winget id).
    pub unique_id: String,
    pub is_system_component: bool,
    pub is_framework: bool,
    pub uninstall_string: String,
    pub help_link: String,
    pub comments: String,
    pub change_status: ChangeStatus,
    pub previous_version: String,
}

impl SoftwareItem {
    /// Name shown to the user: the custom name when set, else the original.
    pub fn display_name(&self) -> &str {
        if self.custom_name.trim().is_empty() {
            &self.name
        } else {
            &self.custom_name
        }
    }
}

/// Identity key for software: `Source::UniqueId`, or `Source::Name` when the
/// source supplies no unique id.
pub fn software_identity(source: &str, unique_id: &str, name: &str) -> String {
    let id = unique_id.trim();
    if id.is_empty() {
        format!("{}::{}", source.trim(), name.trim())
    } else {
        format!("{}::{}", source.trim(), id)
    }
}

impl Entity for SoftwareItem {
    const DOMAIN: Domain = Domain::Software;

    const FIELDS: &'static [&'static str] = &[
        "Name",
        "CustomName",
        "Version",
        "Publisher",
        "InstallDate",
        "Source",
        "InstallLocation",
        "Architecture",
        "Size",
        "UniqueId",
        "IsSystemComponent",
        "IsFramework",
        "UninstallString",
        "HelpLink",
        "Comments",
        "ChangeStatus",
        "PreviousVersion",
    ];

    const KEY_FIELD: &'static str = "UniqueId";

    const COMPARE_FIELDS: &'static [&'static str] = &["Name", "Version", "Publisher"];

    const IDENTITY_FIELDS: &'static [&'static str] = &["Source", "UniqueId", "Name"];

    fn to_record(&self) -> Record {
        let mut r = Record::with_capacity(Self::FIELDS.len());
        r.insert("Name", self.name.as_str());
        r.insert("CustomName", self.custom_name.as_str());
        r.insert("Version", self.version.as_str());
        r.insert("Publisher", self.publisher.as_str());
        r.insert("InstallDate", self.install_date.as_str());
        r.insert("Source", self.source.as_str());
        r.insert("InstallLocation", self.install_location.as_str());
        r.insert("Architecture", self.architecture.as_str());
        r.insert(
            "Size",
            self.size.map(|kb| kb.to_string()).unwrap_or_default(),
        );
        r.insert("UniqueId", self.unique_id.as_str());
        r.insert("IsSystemComponent", bool_str(self.is_system_component));
        r.insert("IsFramework", bool_str(self.is_framework));
        r.insert("UninstallString", self.uninstall_string.as_str());
        r.insert("HelpLink", self.help_link.as_str());
        r.insert("Comments", self.comments.as_str());
        r.insert("ChangeStatus", self.change_status.as_str());
        r.insert("PreviousVersion", self.previous_version.as_str());
        r
    }

    fn from_record(record: &Record) -> Self {
        Self {
            name: record.value("Name").to_string(),
            custom_name: record.value("CustomName").to_string(),
            version: record.value("Version").to_string(),
            publisher: record.value("Publisher").to_string(),
            install_date: record.value("InstallDate").to_string(),
            source: record.value("Source").parse().unwrap_or_default(),
            install_location: record.value("InstallLocation").to_string(),
            architecture: record.value("Architecture").to_string(),
            size: record.value("Size").trim().parse().ok(),
            unique_id: record.value("UniqueId").to_string(),
            is_system_component: parse_bool(record.value("IsSystemComponent")),
            is_framework: parse_bool(record.value("IsFramework")),
            uninstall_string: record.value("UninstallString").to_string(),
            help_link: record.value("HelpLink").to_string(),
            comments: record.value("Comments").to_string(),
            change_status: ChangeStatus::parse(record.value("ChangeStatus")),
            previous_version: record.value("PreviousVersion").to_string(),
        }
    }

    fn record_key(record: &Record) -> String {
        software_identity(
            record.value("Source"),
            record.value("UniqueId"),
            record.value("Name"),
        )
    }

    fn identity_key(&self) -> String {
        software_identity(self.source.as_str(), &self.unique_id, &self.name)
    }
}
