/// Windows services with their control-permission and executable-ACL risk.
use super::record::{Entity, Record};
use super::Domain;
use serde::{Deserialize, Serialize};

/// Current run state of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    Running,
    Stopped,
    Paused,
    #[serde(rename = "Start Pending")]
    StartPending,
    #[serde(rename = "Stop Pending")]
    StopPending,
    #[serde(rename = "Continue Pending")]
    ContinuePending,
    #[serde(rename = "Pause Pending")]
    PausePending,
    #[default]
    Unknown,
}

impl ServiceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Paused => "Paused",
            Self::StartPending => "Start Pending",
            Self::StopPending => "Stop Pending",
            Self::ContinuePending => "Continue Pending",
            Self::PausePending => "Pause Pending",
            Self::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "paused" => Self::Paused,
            "start pending" | "startpending" => Self::StartPending,
            "stop pending" | "stoppending" => Self::StopPending,
            "continue pending" | "continuepending" => Self::ContinuePending,
            "pause pending" | "pausepending" => Self::PausePending,
            _ => Self::Unknown,
        }
    }
}

/// Configured start type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StartupType {
    Automatic,
    #[serde(rename = "Automatic (Delayed)")]
    AutomaticDelayed,
    Manual,
    Disabled,
    Boot,
    System,
    #[default]
    Unknown,
}

impl StartupType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automatic => "Automatic",
            Self::AutomaticDelayed => "Automatic (Delayed)",
            Self::Manual => "Manual",
            Self::Disabled => "Disabled",
            Self::Boot => "Boot",
            Self::System => "System",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse either the coarse OS start mode (`Auto`, `Manual`, ...) or an
    /// exported display string.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "automatic" => Self::Automatic,
            "automatic (delayed)" | "automaticdelayedstart" | "auto (delayed)" => {
                Self::AutomaticDelayed
            }
            "manual" | "demand" => Self::Manual,
            "disabled" => Self::Disabled,
            "boot" => Self::Boot,
            "system" => Self::System,
            _ => Self::Unknown,
        }
    }

    /// Combine the coarse start mode with the delayed-start flag from the
    /// bulk registry query. `None` means the flag could not be read, in which
    /// case the coarse value stands.
    pub fn resolve(start_mode: &str, delayed: Option<bool>) -> Self {
        match (Self::parse(start_mode), delayed) {
            (Self::Automatic, Some(true)) => Self::AutomaticDelayed,
            (coarse, _) => coarse,
        }
    }
}

/// Whether a non-administrative principal can reconfigure the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceControlRisk {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "! Weak")]
    Weak,
    #[default]
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl ServiceControlRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Weak => "! Weak",
            Self::NotAvailable => "N/A",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "OK" => Self::Ok,
            "! Weak" => Self::Weak,
            _ => Self::NotAvailable,
        }
    }
}

/// Whether a non-privileged principal can replace the service executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExeWriteRisk {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "! Risky")]
    Risky,
    #[default]
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl ExeWriteRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Risky => "! Risky",
            Self::NotAvailable => "N/A",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "OK" => Self::Ok,
            "! Risky" => Self::Risky,
            _ => Self::NotAvailable,
        }
    }
}

/// One installed service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRecord {
    /// Service key name; the identity key.
    pub name: String,
    pub display_name: String,
    pub state: ServiceState,
    pub startup_type: StartupType,
    pub log_on_as: String,
    /// Executable path with quotes and arguments removed and environment
    /// variables expanded.
    pub exe_path: String,
    /// ImagePath exactly as configured.
    pub exe_path_raw: String,
    pub service_control_risk: ServiceControlRisk,
    pub service_control_detail: String,
    pub exe_write_risk: ExeWriteRisk,
    pub exe_acl_summary: String,
}

impl Entity for ServiceRecord {
    const DOMAIN: Domain = Domain::Services;

    const FIELDS: &'static [&'static str] = &[
        "Name",
        "DisplayName",
        "State",
        "StartupType",
        "LogOnAs",
        "ExePath",
        "ExePathRaw",
        "ServiceControlRisk",
        "ServiceControlDetail",
        "ExeWriteRisk",
        "ExeAclSummary",
    ];

    const KEY_FIELD: &'static str = "Name";

    const COMPARE_FIELDS: &'static [&'static str] = &[
        "DisplayName",
        "State",
        "StartupType",
        "LogOnAs",
        "ExePath",
        "ServiceControlRisk",
        "ExeWriteRisk",
    ];

    const IDENTITY_FIELDS: &'static [&'static str] = &["Name"];

    fn to_record(&self) -> Record {
        let mut r = Record::with_capacity(Self::FIELDS.len());
        r.insert("Name", self.name.as_str());
        r.insert("DisplayName", self.display_name.as_str());
        r.insert("State", self.state.as_str());
        r.insert("StartupType", self.startup_type.as_str());
        r.insert("LogOnAs", self.log_on_as.as_str());
        r.insert("ExePath", self.exe_path.as_str());
        r.insert("ExePathRaw", self.exe_path_raw.as_str());
        r.insert("ServiceControlRisk", self.service_control_risk.as_str());
        r.insert("ServiceControlDetail", self.service_control_detail.as_str());
        r.insert("ExeWriteRisk", self.exe_write_risk.as_str());
        r.insert("ExeAclSummary", self.exe_acl_summary.as_str());
        r
    }

    fn from_record(record: &Record) -> Self {
        Self {
            name: record.value("Name").to_string(),
            display_name: record.value("DisplayName").to_string(),
            state: ServiceState::parse(record.value("State")),
            startup_type: StartupType::parse(record.value("StartupType")),
            log_on_as: record.value("LogOnAs").to_string(),
            exe_path: record.value("ExePath").to_string(),
            exe_path_raw: record.value("ExePathRaw").to_string(),
            service_control_risk: ServiceControlRisk::parse(record.value("ServiceControlRisk")),
            service_control_detail: record.value("ServiceControlDetail").to_string(),
            exe_write_risk: ExeWriteRisk::parse(record.value("ExeWriteRisk")),
            exe_acl_summary: record.value("ExeAclSummary").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delayed_flag_upgrades_automatic_only() {
        assert_eq!(
            StartupType::resolve("Auto", Some(true)),
            StartupType::AutomaticDelayed
        );
        assert_eq!(StartupType::resolve("Auto", Some(false)), StartupType::Automatic);
        assert_eq!(StartupType::resolve("Auto", None), StartupType::Automatic);
        assert_eq!(StartupType::resolve("Manual", Some(true)), StartupType::Manual);
        assert_eq!(StartupType::resolve("Disabled", None), StartupType::Disabled);
    }

    #[test]
    fn startup_display_strings_parse_back() {
        for t in [
            StartupType::Automatic,
            StartupType::AutomaticDelayed,
            StartupType::Manual,
            StartupType::Disabled,
            StartupType::Boot,
            StartupType::System,
            StartupType::Unknown,
        ] {
            assert_eq!(StartupType::parse(t.as_str()), t);
        }
    }

    #[test]
    fn state_parse_handles_pending_states() {
        assert_eq!(ServiceState::parse("Start Pending"), ServiceState::StartPending);
        assert_eq!(ServiceState::parse("running"), ServiceState::Running);
        assert_eq!(ServiceState::parse("bogus"), ServiceState::Unknown);
    }

    #[test]
    fn risk_display_strings_are_closed_set() {
        assert_eq!(ServiceControlRisk::Weak.as_str(), "! Weak");
        assert_eq!(ExeWriteRisk::Risky.as_str(), "! Risky");
        assert_eq!(ServiceControlRisk::parse("garbage"), ServiceControlRisk::NotAvailable);
        assert_eq!(ExeWriteRisk::parse(""), ExeWriteRisk::NotAvailable);
    }

    #[test]
    fn record_round_trip() {
        let s = ServiceRecord {
            name: "Spooler".into(),
            display_name: "Print Spooler".into(),
            state: ServiceState::Running,
            startup_type: StartupType::AutomaticDelayed,
            log_on_as: "LocalSystem".into(),
            exe_path: r"C:\Windows\System32\spoolsv.exe".into(),
            exe_path_raw: r"C:\Windows\System32\spoolsv.exe".into(),
            service_control_risk: ServiceControlRisk::Ok,
            service_control_detail: "Restricted to privileged accounts".into(),
            exe_write_risk: ExeWriteRisk::Ok,
            exe_acl_summary: "Only privileged accounts can write".into(),
        };
        assert_eq!(ServiceRecord::from_record(&s.to_record()), s);
        assert_eq!(s.identity_key(), "Spooler");
    }
}
