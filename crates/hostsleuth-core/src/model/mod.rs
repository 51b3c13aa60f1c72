/// Data model for HostSleuth inventories.
///
/// Typed entities for each domain plus the open-schema [`Record`] they
/// convert to for diffing and export.
pub mod driver;
pub mod record;
pub mod service;
pub mod software;

pub use driver::{DeviceStatus, DriverDevice};
pub use record::{to_records, Entity, Record};
pub use service::{ExeWriteRisk, ServiceControlRisk, ServiceRecord, ServiceState, StartupType};
pub use software::{software_identity, ChangeStatus, SoftwareItem, SoftwareSource};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three inventory domains. Each owns its own collection and runs at
/// most one refresh at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Software,
    Drivers,
    Services,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Software, Domain::Drivers, Domain::Services];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Drivers => "drivers",
            Self::Services => "services",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
