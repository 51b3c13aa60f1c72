/// Security analyzers: turn raw permission data into a risk classification.
///
/// Both analyzers are pure over their inputs; the raw data comes from the
/// [`SecurityDescriptorSource`] and [`FileAclSource`] seams so the Windows
/// adapters in [`crate::platform`] can be swapped for fakes in tests.
///
/// Both fail closed: anything unreadable or malformed classifies as
/// "not available", never as risky.
pub mod exe_acl;
pub mod service_acl;

pub use exe_acl::{
    assess_exe_acl, classify_file_acl, resolve_image_path, resolve_image_path_with, ExeAclAssessment,
    RawAce,
};
pub use service_acl::{analyze_sddl, assess_service_control, ServiceControlAssessment};

use crate::error::Result;
use serde::Serialize;
use std::path::Path;

/// Allow or deny entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AceType {
    Allow,
    Deny,
}

impl AceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
        }
    }
}

/// Per-entry risk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AceRisk {
    /// A non-privileged principal holds a risky right.
    Risky,
    /// Risky rights, but held by a privileged principal.
    PrivilegedWrite,
    /// No risky right in this entry.
    None,
}

impl AceRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Risky => "risky",
            Self::PrivilegedWrite => "privileged-write",
            Self::None => "none",
        }
    }
}

/// One analysed access-control entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclEntry {
    /// Friendly account or group name.
    pub identity: String,
    /// Rights as text: SDDL tokens for services, a named set or hex mask for files.
    pub rights: String,
    pub ace_type: AceType,
    pub risk: AceRisk,
}

/// Reads a service's security descriptor in SDDL form.
pub trait SecurityDescriptorSource: Send + Sync {
    fn service_descriptor(&self, service: &str) -> Result<String>;
}

/// Reads the access-control list of a file.
pub trait FileAclSource: Send + Sync {
    fn file_acl(&self, path: &Path) -> Result<Vec<RawAce>>;
}
