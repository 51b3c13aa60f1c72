/// Installed programs from the registry uninstall keys.
///
/// Reads the 64-bit and 32-bit machine views plus the current user's hive.
/// Entries without a DisplayName are not programs (patch stubs, orphans)
/// and are skipped by the query itself.
use super::command::{json_bool, json_rows, json_str, run_powershell};
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const UNINSTALL_SCRIPT: &str = r#"
$roots = @(
  @{Hive='HKLM'; View='64'; Path='HKLM:\Software\Microsoft\Windows\CurrentVersion\Uninstall\*'},
  @{Hive='HKLM'; View='32'; Path='HKLM:\Software\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall\*'},
  @{Hive='HKCU'; View='';   Path='HKCU:\Software\Microsoft\Windows\CurrentVersion\Uninstall\*'}
)
@(foreach ($r in $roots) {
  Get-ItemProperty $r.Path -EA SilentlyContinue | Where-Object { $_.DisplayName } | ForEach-Object {
    [pscustomobject]@{
      KeyName=$_.PSChildName; Hive=$r.Hive; View=$r.View
      DisplayName=$_.DisplayName; DisplayVersion=$_.DisplayVersion; Publisher=$_.Publisher
      InstallDate=$_.InstallDate; InstallLocation=$_.InstallLocation; EstimatedSize=$_.EstimatedSize
      SystemComponent=$_.SystemComponent; ParentKeyName=$_.ParentKeyName; ReleaseType=$_.ReleaseType
      UninstallString=$_.UninstallString; HelpLink=$_.HelpLink; Comments=$_.Comments
    }
  }
}) | ConvertTo-Json -Compress
"#;

/// One uninstall-key entry as read from the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawUninstallEntry {
    /// Subkey name (often a product GUID).
    pub key_name: String,
    /// `HKLM` or `HKCU`.
    pub hive: String,
    /// `64`, `32`, or empty for the per-user hive.
    pub view: String,
    pub display_name: String,
    pub display_version: String,
    pub publisher: String,
    /// Usually `YYYYMMDD`.
    pub install_date: String,
    pub install_location: String,
    /// KiB.
    pub estimated_size: Option<u64>,
    pub system_component: bool,
    pub parent_key_name: String,
    pub release_type: String,
    pub uninstall_string: String,
    pub help_link: String,
    pub comments: String,
}

/// Read every uninstall entry.
pub fn enumerate_uninstall_entries(timeout: Duration) -> Result<Vec<RawUninstallEntry>> {
    let raw = run_powershell(UNINSTALL_SCRIPT, "registry uninstall query", timeout)?;
    parse_uninstall_json(&raw)
}

/// Parse the uninstall query output.
pub fn parse_uninstall_json(raw: &str) -> Result<Vec<RawUninstallEntry>> {
    Ok(json_rows(raw)?
        .iter()
        .map(uninstall_from_row)
        .filter(|e| !e.display_name.is_empty())
        .collect())
}

fn uninstall_from_row(row: &Value) -> RawUninstallEntry {
    RawUninstallEntry {
        key_name: json_str(row, "KeyName"),
        hive: json_str(row, "Hive"),
        view: json_str(row, "View"),
        display_name: json_str(row, "DisplayName"),
        display_version: json_str(row, "DisplayVersion"),
        publisher: json_str(row, "Publisher"),
        install_date: json_str(row, "InstallDate"),
        install_location: json_str(row, "InstallLocation"),
        estimated_size: row.get("EstimatedSize").and_then(Value::as_u64),
        system_component: json_bool(row, "SystemComponent"),
        parent_key_name: json_str(row, "ParentKeyName"),
        release_type: json_str(row, "ReleaseType"),
        uninstall_string: json_str(row, "UninstallString"),
        help_link: json_str(row, "HelpLink"),
        comments: json_str(row, "Comments"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uninstall_rows() {
        let raw = r#"[
            {"KeyName":"7-Zip","Hive":"HKLM","View":"64","DisplayName":"7-Zip 23.01 (x64)",
             "DisplayVersion":"23.01","Publisher":"Igor Pavlov","EstimatedSize":5632,
             "SystemComponent":null,"UninstallString":"\"C:\\Program Files\\7-Zip\\Uninstall.exe\""},
            {"KeyName":"{ABC}","Hive":"HKLM","View":"32","DisplayName":"Helper",
             "SystemComponent":1,"ParentKeyName":"OfficeSuite","ReleaseType":"Update"},
            {"KeyName":"Orphan","DisplayName":""}
        ]"#;
        let entries = parse_uninstall_json(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key_name, "7-Zip");
        assert_eq!(entries[0].estimated_size, Some(5632));
        assert!(!entries[0].system_component);
        assert_eq!(
            entries[0].uninstall_string,
            r#""C:\Program Files\7-Zip\Uninstall.exe""#
        );
        assert!(entries[1].system_component);
        assert_eq!(entries[1].view, "32");
        assert_eq!(entries[1].parent_key_name, "OfficeSuite");
    }

    #[test]
    fn single_object_and_empty_output() {
        let one = parse_uninstall_json(r#"{"KeyName":"A","DisplayName":"App"}"#).unwrap();
        assert_eq!(one.len(), 1);
        assert!(parse_uninstall_json("").unwrap().is_empty());
    }
}
