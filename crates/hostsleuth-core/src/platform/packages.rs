/// Package-manager sources: AppX/MSIX packages and winget.
use super::command::{json_bool, json_rows, json_str, run_powershell};
use crate::error::Result;
use serde::Serialize;
use std::time::Duration;

const APPX_SCRIPT: &str = r#"
Get-AppxPackage -EA SilentlyContinue | ForEach-Object {
  [pscustomobject]@{
    Name=$_.Name; PackageFullName=$_.PackageFullName; PackageFamilyName=$_.PackageFamilyName
    Version="$($_.Version)"; Publisher=$_.Publisher; InstallLocation=$_.InstallLocation
    Architecture="$($_.Architecture)"; IsFramework=$_.IsFramework
    SignatureKind="$($_.SignatureKind)"; NonRemovable=$_.NonRemovable
  }
} | ConvertTo-Json -Compress
"#;

/// One AppX package for the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawAppxPackage {
    pub name: String,
    pub full_name: String,
    pub family_name: String,
    pub version: String,
    /// Distinguished name, e.g. `CN=Microsoft Corporation, O=...`.
    pub publisher: String,
    pub install_location: String,
    pub architecture: String,
    pub is_framework: bool,
    /// `System` for inbox packages.
    pub signature_kind: String,
    pub non_removable: bool,
}

pub fn enumerate_appx(timeout: Duration) -> Result<Vec<RawAppxPackage>> {
    let raw = run_powershell(APPX_SCRIPT, "AppX package query", timeout)?;
    parse_appx_json(&raw)
}

pub fn parse_appx_json(raw: &str) -> Result<Vec<RawAppxPackage>> {
    Ok(json_rows(raw)?
        .iter()
        .map(|row| RawAppxPackage {
            name: json_str(row, "Name"),
            full_name: json_str(row, "PackageFullName"),
            family_name: json_str(row, "PackageFamilyName"),
            version: json_str(row, "Version"),
            publisher: json_str(row, "Publisher"),
            install_location: json_str(row, "InstallLocation"),
            architecture: json_str(row, "Architecture"),
            is_framework: json_bool(row, "IsFramework"),
            signature_kind: json_str(row, "SignatureKind"),
            non_removable: json_bool(row, "NonRemovable"),
        })
        .filter(|p| !p.name.is_empty())
        .collect())
}

// ── winget ───────────────────────────────────────────────────────

/// One row of `winget list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawWingetEntry {
    pub name: String,
    pub id: String,
    pub version: String,
    pub available: String,
    pub source: String,
}

/// List winget-managed packages.
#[cfg(windows)]
pub fn enumerate_winget(timeout: Duration) -> Result<Vec<RawWingetEntry>> {
    use super::command::{run_with_timeout, WINGET_EXE};
    use crate::error::Error;

    let output = run_with_timeout(
        WINGET_EXE,
        &[
            "list",
            "--accept-source-agreements",
            "--disable-interactivity",
        ],
        "winget list",
        timeout,
    )?;
    if !output.success() && output.stdout.trim().is_empty() {
        return Err(Error::query("winget list", output.combined()));
    }
    Ok(parse_winget_table(&output.stdout))
}

#[cfg(not(windows))]
pub fn enumerate_winget(timeout: Duration) -> Result<Vec<RawWingetEntry>> {
    let _ = timeout;
    Err(crate::error::Error::Unsupported("winget"))
}

/// Parse the fixed-width table printed by `winget list`.
///
/// Column boundaries come from the header line (the one followed by a row
/// of dashes). Rows whose id starts with `ARP\` or `MSIX\` mirror registry
/// and AppX entries and are dropped.
pub fn parse_winget_table(text: &str) -> Vec<RawWingetEntry> {
    // winget redraws a spinner with carriage returns; keep the last frame.
    let lines: Vec<&str> = text
        .lines()
        .map(|l| l.rsplit('\r').next().unwrap_or(l))
        .collect();

    let Some(header_idx) = lines.iter().enumerate().position(|(i, l)| {
        l.contains("Name")
            && l.contains("Id")
            && l.contains("Version")
            && lines
                .get(i + 1)
                .is_some_and(|next| next.trim_start().starts_with("---"))
    }) else {
        return Vec::new();
    };

    let header: Vec<char> = lines[header_idx].chars().collect();
    let col = |name: &str| find_column(&header, name);
    let (Some(name_at), Some(id_at), Some(version_at)) = (col("Name"), col("Id"), col("Version"))
    else {
        return Vec::new();
    };
    let available_at = col("Available");
    let source_at = col("Source");

    let mut starts: Vec<usize> = [Some(name_at), Some(id_at), Some(version_at), available_at, source_at]
        .into_iter()
        .flatten()
        .collect();
    starts.sort_unstable();

    let cell = |row: &[char], start: Option<usize>| -> String {
        let Some(start) = start else {
            return String::new();
        };
        let end = starts
            .iter()
            .copied()
            .find(|&s| s > start)
            .unwrap_or(row.len());
        if start >= row.len() {
            return String::new();
        }
        row[start..end.min(row.len())]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    };

    lines[header_idx + 2..]
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().collect::<Vec<char>>())
        .map(|row| RawWingetEntry {
            name: cell(&row, Some(name_at)),
            id: cell(&row, Some(id_at)),
            version: cell(&row, Some(version_at)),
            available: cell(&row, available_at),
            source: cell(&row, source_at),
        })
        .filter(|e| !e.id.is_empty())
        .filter(|e| !(e.id.starts_with(r"ARP\") || e.id.starts_with(r"MSIX\")))
        .collect()
}

/// Char offset of a whole-word header label.
fn find_column(header: &[char], name: &str) -> Option<usize> {
    let target: Vec<char> = name.chars().collect();
    (0..header.len().saturating_sub(target.len() - 1)).find(|&i| {
        header[i..i + target.len()] == target[..]
            && (i == 0 || header[i - 1].is_whitespace())
            && header
                .get(i + target.len())
                .map_or(true, |c| c.is_whitespace())
    })
}
