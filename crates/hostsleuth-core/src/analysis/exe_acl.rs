/// Executable ACL analysis: can a non-privileged principal replace a binary?
///
/// Only rights that allow replacing the file content or taking over its ACL
/// are considered: write-data (implied by Write, Modify and FullControl),
/// change-permissions and take-ownership. Append-data and attribute writes
/// are excluded; directory-inherited ACLs grant those to broad groups
/// routinely and they cannot overwrite the image.
use super::{AceRisk, AceType, AclEntry, FileAclSource};
use crate::model::ExeWriteRisk;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

pub const FILE_WRITE_DATA: u32 = 0x0000_0002;
pub const WRITE_DAC: u32 = 0x0004_0000;
pub const WRITE_OWNER: u32 = 0x0008_0000;
pub const GENERIC_ALL: u32 = 0x1000_0000;
pub const GENERIC_WRITE: u32 = 0x4000_0000;

/// Rights that permit hijacking the file. Generic write/all are included
/// because they map onto write-data when the ACE is applied.
pub const RISKY_FILE_RIGHTS: u32 =
    FILE_WRITE_DATA | WRITE_DAC | WRITE_OWNER | GENERIC_ALL | GENERIC_WRITE;

/// Named FileSystemRights combinations, most specific first.
const NAMED_RIGHTS: [(u32, &str); 6] = [
    (0x001F_01FF, "FullControl"),
    (0x0013_01BF, "Modify"),
    (0x0012_01BF, "ReadAndExecute, Write"),
    (0x0012_00A9, "ReadAndExecute"),
    (0x0012_0089, "Read"),
    (0x0011_0116, "Write"),
];

/// Substrings that identify privileged principals (case-insensitive).
const PRIVILEGED_IDENTITIES: [&str; 5] = [
    "administrators",
    "system",
    "trustedinstaller",
    "nt service",
    "creator owner",
];

pub const SUMMARY_NOT_FOUND: &str = "Not found";
pub const SUMMARY_UNREADABLE: &str = "Unable to read ACL";
pub const SUMMARY_PRIVILEGED_ONLY: &str = "Only privileged accounts can write";

/// A raw entry as returned by the file ACL query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawAce {
    pub identity: String,
    pub mask: u32,
    pub allow: bool,
}

/// Outcome of an executable ACL check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExeAclAssessment {
    /// The path that was actually checked, after resolution.
    pub path: String,
    pub risk: ExeWriteRisk,
    pub summary: String,
    pub entries: Vec<AclEntry>,
}

impl ExeAclAssessment {
    fn not_available(path: String, summary: &str) -> Self {
        Self {
            path,
            risk: ExeWriteRisk::NotAvailable,
            summary: summary.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn is_risky(&self) -> bool {
        self.risk == ExeWriteRisk::Risky
    }
}

/// Resolve `raw_path` and analyse the ACL of the file it names.
///
/// A missing file is [`ExeWriteRisk::NotAvailable`], not a risk: there is
/// nothing to overwrite through this vector.
pub fn assess_exe_acl(source: &dyn FileAclSource, raw_path: &str) -> ExeAclAssessment {
    let path = resolve_image_path(raw_path);
    if path.is_empty() || !Path::new(&path).exists() {
        return ExeAclAssessment::not_available(path, SUMMARY_NOT_FOUND);
    }

    match source.file_acl(Path::new(&path)) {
        Ok(aces) => {
            let mut assessment = classify_file_acl(&aces);
            assessment.path = path;
            assessment
        }
        Err(e) => {
            debug!("ACL for {path} unreadable: {e}");
            ExeAclAssessment::not_available(path, SUMMARY_UNREADABLE)
        }
    }
}

/// Tag each entry and aggregate. `path` on the result is left empty.
pub fn classify_file_acl(aces: &[RawAce]) -> ExeAclAssessment {
    let mut risky_names: Vec<String> = Vec::new();
    let entries: Vec<AclEntry> = aces
        .iter()
        .map(|ace| {
            let risk = classify_ace(ace);
            if risk == AceRisk::Risky && !risky_names.contains(&ace.identity) {
                risky_names.push(ace.identity.clone());
            }
            AclEntry {
                identity: ace.identity.clone(),
                rights: describe_file_rights(ace.mask),
                ace_type: if ace.allow {
                    AceType::Allow
                } else {
                    AceType::Deny
                },
                risk,
            }
        })
        .collect();

    let (risk, summary) = if risky_names.is_empty() {
        (ExeWriteRisk::Ok, SUMMARY_PRIVILEGED_ONLY.to_string())
    } else {
        (
            ExeWriteRisk::Risky,
            format!("Writable by: {}", risky_names.join(", ")),
        )
    };

    ExeAclAssessment {
        path: String::new(),
        risk,
        summary,
        entries,
    }
}

fn classify_ace(ace: &RawAce) -> AceRisk {
    if ace.mask & RISKY_FILE_RIGHTS == 0 || !ace.allow {
        return AceRisk::None;
    }
    if is_privileged(&ace.identity) {
        AceRisk::PrivilegedWrite
    } else {
        AceRisk::Risky
    }
}

fn is_privileged(identity: &str) -> bool {
    let lower = identity.to_ascii_lowercase();
    PRIVILEGED_IDENTITIES.iter().any(|p| lower.contains(p))
}

/// Render a rights mask the way `Get-Acl` names it, falling back to hex.
pub fn describe_file_rights(mask: u32) -> String {
    NAMED_RIGHTS
        .iter()
        .find(|(bits, _)| *bits == mask)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("0x{mask:08X}"))
}

/// Turn a service ImagePath (or any command line) into a plain file path.
///
/// Removes surrounding quotes and trailing arguments, maps the NT prefixes
/// `\??\` and `\SystemRoot\`, roots bare `system32\...` paths at
/// `%SystemRoot%`, and expands `%VAR%` tokens from the environment.
pub fn resolve_image_path(raw: &str) -> String {
    resolve_image_path_with(raw, |name| std::env::var(name).ok())
}

/// [`resolve_image_path`] with `%VAR%` values taken from `lookup`.
pub fn resolve_image_path_with<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let unquoted = if let Some(rest) = trimmed.strip_prefix('"') {
        match rest.find('"') {
            Some(end) => &rest[..end],
            None => rest,
        }
    } else {
        strip_arguments(trimmed)
    };

    let mut path = unquoted.trim().to_string();
    if let Some(rest) = path.strip_prefix(r"\??\") {
        path = rest.to_string();
    }
    if starts_with_ignore_case(&path, r"\SystemRoot\") {
        path = format!(r"%SystemRoot%\{}", &path[r"\SystemRoot\".len()..]);
    } else if starts_with_ignore_case(&path, r"system32\") {
        path = format!(r"%SystemRoot%\{path}");
    }

    expand_env_vars(&path, lookup)
}

/// Cut an unquoted command line after the first executable-looking
/// extension, or at the first whitespace when there is none.
fn strip_arguments(cmdline: &str) -> &str {
    let lower = cmdline.to_ascii_lowercase();
    for ext in [".exe", ".sys", ".dll", ".com"] {
        let mut from = 0;
        while let Some(pos) = lower[from..].find(ext) {
            let end = from + pos + ext.len();
            let boundary = lower[end..]
                .chars()
                .next()
                .map_or(true, char::is_whitespace);
            if boundary {
                return &cmdline[..end];
            }
            from = end;
        }
    }
    cmdline.split_whitespace().next().unwrap_or("")
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Expand `%NAME%` tokens. Unknown variables are left untouched.
fn expand_env_vars<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) if !name.is_empty() => out.push_str(&value),
                    _ => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
