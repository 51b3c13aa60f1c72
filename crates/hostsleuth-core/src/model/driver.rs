/// Device/driver pairs enumerated from Plug and Play.
use super::record::{bool_str, parse_bool, Entity, Record};
use super::Domain;
use serde::{Deserialize, Serialize};

/// Device health as reported by the PnP manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    #[serde(rename = "OK")]
    Ok,
    Error,
    Degraded,
    #[default]
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "Error",
            Self::Degraded => "Degraded",
            Self::Unknown => "Unknown",
        }
    }

    /// Map a PnP/CIM status string. Anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Self::Ok,
            "error" => Self::Error,
            "degraded" => Self::Degraded,
            _ => Self::Unknown,
        }
    }
}

/// A device together with the driver bound to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DriverDevice {
    pub friendly_name: String,
    pub class: String,
    pub status: DeviceStatus,
    /// `false` for devices remembered by PnP but not currently attached.
    pub present: bool,
    pub driver_version: String,
    pub driver_provider: String,
    /// `YYYY-MM-DD` when the source date could be parsed, else verbatim.
    pub driver_date: String,
    pub driver_inf_path: String,
    /// Stable hardware identity key.
    pub instance_id: String,
}

impl Entity for DriverDevice {
    const DOMAIN: Domain = Domain::Drivers;

    const FIELDS: &'static [&'static str] = &[
        "FriendlyName",
        "Class",
        "Status",
        "Present",
        "DriverVersion",
        "DriverProvider",
        "DriverDate",
        "DriverInfPath",
        "InstanceId",
    ];

    const KEY_FIELD: &'static str = "InstanceId";

    const COMPARE_FIELDS: &'static [&'static str] = &[
        "FriendlyName",
        "Class",
        "Status",
        "Present",
        "DriverVersion",
        "DriverProvider",
        "DriverDate",
        "DriverInfPath",
    ];

    const IDENTITY_FIELDS: &'static [&'static str] = &["InstanceId"];

    fn to_record(&self) -> Record {
        let mut r = Record::with_capacity(Self::FIELDS.len());
        r.insert("FriendlyName", self.friendly_name.as_str());
        r.insert("Class", self.class.as_str());
        r.insert("Status", self.status.as_str());
        r.insert("Present", bool_str(self.present));
        r.insert("DriverVersion", self.driver_version.as_str());
        r.insert("DriverProvider", self.driver_provider.as_str());
        r.insert("DriverDate", self.driver_date.as_str());
        r.insert("DriverInfPath", self.driver_inf_path.as_str());
        r.insert("InstanceId", self.instance_id.as_str());
        r
    }

    fn from_record(record: &Record) -> Self {
        Self {
            friendly_name: record.value("FriendlyName").to_string(),
            class: record.value("Class").to_string(),
            status: DeviceStatus::parse(record.value("Status")),
            present: parse_bool(record.value("Present")),
            driver_version: record.value("DriverVersion").to_string(),
            driver_provider: record.value("DriverProvider").to_string(),
            driver_date: record.value("DriverDate").to_string(),
            driver_inf_path: record.value("DriverInfPath").to_string(),
            instance_id: record.value("InstanceId").to_string(),
        }
    }
}
