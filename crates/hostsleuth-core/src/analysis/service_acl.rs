/// Service-control permission analysis over SDDL text.
///
/// A service is weak when a non-administrative well-known principal is
/// allowed to change its configuration, its DACL, or its owner. Each of those
/// lets the principal point the service at its own binary. Read, start and
/// stop rights are granted broadly by default and are not checked.
use super::{AceRisk, AceType, AclEntry, SecurityDescriptorSource};
use crate::model::ServiceControlRisk;
use serde::Serialize;
use tracing::debug;

/// SDDL right tokens that allow reconfiguring a service.
const RISKY_RIGHTS: [&str; 3] = ["DC", "WD", "WO"];

/// Mask equivalents of [`RISKY_RIGHTS`] for hex-encoded rights:
/// SERVICE_CHANGE_CONFIG | WRITE_DAC | WRITE_OWNER.
const RISKY_RIGHTS_MASK: u32 = 0x0000_0002 | 0x0004_0000 | 0x0008_0000;

/// Non-administrative well-known trustees, as SDDL alias, literal SID, and
/// friendly name.
const WEAK_TRUSTEES: [(&str, &str, &str); 7] = [
    ("WD", "S-1-1-0", "Everyone"),
    ("AU", "S-1-5-11", "Authenticated Users"),
    ("IU", "S-1-5-4", "Interactive Users"),
    ("BU", "S-1-5-32-545", "Users"),
    ("PU", "S-1-5-32-547", "Power Users"),
    ("NO", "S-1-5-32-556", "Network Configuration Operators"),
    ("SO", "S-1-5-32-549", "Server Operators"),
];

/// Other aliases seen in default service descriptors, for display only.
const KNOWN_TRUSTEES: [(&str, &str); 9] = [
    ("SY", "SYSTEM"),
    ("BA", "Administrators"),
    ("LS", "Local Service"),
    ("NS", "Network Service"),
    ("SU", "Service Logon User"),
    ("LA", "Local Administrator"),
    ("OW", "Owner Rights"),
    ("CO", "Creator Owner"),
    ("AC", "All Application Packages"),
];

pub const SUMMARY_RESTRICTED: &str = "Restricted to privileged accounts";
pub const SUMMARY_UNREADABLE: &str = "Unable to read SD";

/// Outcome of a service-control check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceControlAssessment {
    pub risk: ServiceControlRisk,
    pub summary: String,
    /// Friendly names of the principals that made the service weak, in
    /// descriptor order, without duplicates.
    pub weak_principals: Vec<String>,
    pub entries: Vec<AclEntry>,
}

impl ServiceControlAssessment {
    fn unreadable() -> Self {
        Self {
            risk: ServiceControlRisk::NotAvailable,
            summary: SUMMARY_UNREADABLE.to_string(),
            weak_principals: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn is_risky(&self) -> bool {
        self.risk == ServiceControlRisk::Weak
    }
}

/// Read the descriptor for `service` and analyse it.
///
/// Query failures become [`ServiceControlRisk::NotAvailable`] and never
/// propagate.
pub fn assess_service_control(
    source: &dyn SecurityDescriptorSource,
    service: &str,
) -> ServiceControlAssessment {
    match source.service_descriptor(service) {
        Ok(sddl) => analyze_sddl(&sddl),
        Err(e) => {
            debug!("Service descriptor for {service} unreadable: {e}");
            ServiceControlAssessment::unreadable()
        }
    }
}

/// Analyse SDDL text.
///
/// Empty text or text without a `D:` section is unreadable. ACEs with fewer
/// than six fields are skipped.
pub fn analyze_sddl(sddl: &str) -> ServiceControlAssessment {
    let dacl = match dacl_section(sddl.trim()) {
        Some(d) => d,
        None => return ServiceControlAssessment::unreadable(),
    };

    let mut entries = Vec::new();
    let mut weak_principals: Vec<String> = Vec::new();

    for ace in ace_bodies(dacl) {
        let fields: Vec<&str> = ace.split(';').collect();
        if fields.len() < 6 {
            continue;
        }
        let ace_type = match fields[0].trim() {
            "A" => AceType::Allow,
            "D" => AceType::Deny,
            // Object and callback ACEs do not appear on service descriptors.
            _ => continue,
        };
        let rights = fields[2].trim();
        let trustee = fields[5].trim();

        let has_risky_right = rights_are_risky(rights);
        let weak_name = weak_trustee_name(trustee);
        let risk = match (ace_type, has_risky_right, weak_name) {
            (AceType::Allow, true, Some(_)) => AceRisk::Risky,
            (AceType::Allow, true, None) => AceRisk::PrivilegedWrite,
            _ => AceRisk::None,
        };

        if risk == AceRisk::Risky {
            if let Some(name) = weak_name {
                if !weak_principals.iter().any(|p| p == name) {
                    weak_principals.push(name.to_string());
                }
            }
        }

        entries.push(AclEntry {
            identity: trustee_display_name(trustee),
            rights: rights.to_string(),
            ace_type,
            risk,
        });
    }

    if weak_principals.is_empty() {
        ServiceControlAssessment {
            risk: ServiceControlRisk::Ok,
            summary: SUMMARY_RESTRICTED.to_string(),
            weak_principals,
            entries,
        }
    } else {
        ServiceControlAssessment {
            risk: ServiceControlRisk::Weak,
            summary: format!("Weak: {} can reconfigure", weak_principals.join(", ")),
            weak_principals,
            entries,
        }
    }
}

/// The DACL part of an SDDL string: everything after `D:` up to a top-level
/// `S:` (SACL) or the end.
fn dacl_section(sddl: &str) -> Option<&str> {
    let start = find_top_level(sddl, "D:")? + 2;
    let rest = &sddl[start..];
    let end = find_top_level(rest, "S:").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Byte offset of `needle` outside any parenthesised ACE.
fn find_top_level(haystack: &str, needle: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in haystack.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 && haystack[i..].starts_with(needle) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Contents of each `( ... )` group. An unterminated trailing group is
/// dropped.
fn ace_bodies(dacl: &str) -> impl Iterator<Item = &str> {
    dacl.split('(')
        .skip(1)
        .filter_map(|chunk| chunk.find(')').map(|end| &chunk[..end]))
}

/// Whether an SDDL rights field grants one of the reconfiguration rights.
///
/// Rights are either a run of two-letter tokens (matched token by token, so
/// `SDCR` does not read as `DC`) or a hex mask.
fn rights_are_risky(rights: &str) -> bool {
    if let Some(hex) = rights
        .strip_prefix("0x")
        .or_else(|| rights.strip_prefix("0X"))
    {
        return u32::from_str_radix(hex, 16)
            .map(|mask| mask & RISKY_RIGHTS_MASK != 0)
            .unwrap_or(false);
    }
    if rights.len() % 2 != 0 || !rights.is_ascii() {
        return false;
    }
    rights
        .as_bytes()
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .any(|token| RISKY_RIGHTS.contains(&token))
}

fn weak_trustee_name(trustee: &str) -> Option<&'static str> {
    WEAK_TRUSTEES
        .iter()
        .find(|(alias, sid, _)| trustee == *alias || trustee.eq_ignore_ascii_case(sid))
        .map(|(_, _, name)| *name)
}

fn trustee_display_name(trustee: &str) -> String {
    if let Some(name) = weak_trustee_name(trustee) {
        return name.to_string();
    }
    KNOWN_TRUSTEES
        .iter()
        .find(|(alias, _)| trustee == *alias)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| trustee.to_string())
}
