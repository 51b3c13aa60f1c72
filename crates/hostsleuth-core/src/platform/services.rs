/// Installed services from the service control manager.
use super::command::{json_bool, json_rows, json_str, run_powershell};
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

const SERVICE_SCRIPT: &str = "Get-CimInstance Win32_Service -EA Stop | \
    Select-Object Name, DisplayName, State, StartMode, StartName, PathName | \
    ConvertTo-Json -Compress";

/// One pass over the services key instead of one registry read per service.
const DELAYED_START_SCRIPT: &str = r#"
Get-ChildItem 'HKLM:\SYSTEM\CurrentControlSet\Services' -EA SilentlyContinue | ForEach-Object {
  $v = (Get-ItemProperty -LiteralPath $_.PSPath -Name DelayedAutostart -EA SilentlyContinue).DelayedAutostart
  if ($null -ne $v) { [pscustomobject]@{ Name = $_.PSChildName; Delayed = [int]$v } }
} | ConvertTo-Json -Compress
"#;

/// One service as reported by `Win32_Service`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawService {
    pub name: String,
    pub display_name: String,
    pub state: String,
    /// Coarse start mode: `Auto`, `Manual`, `Disabled`, `Boot`, `System`.
    pub start_mode: String,
    pub start_name: String,
    /// ImagePath as configured, with quotes and arguments.
    pub path_name: String,
    /// Filled from [`DelayedStartMap::annotate`]; `None` when unknown.
    pub delayed_auto_start: Option<bool>,
}

pub fn enumerate_services(timeout: Duration) -> Result<Vec<RawService>> {
    let raw = run_powershell(SERVICE_SCRIPT, "Win32_Service query", timeout)?;
    parse_services_json(&raw)
}

pub fn parse_services_json(raw: &str) -> Result<Vec<RawService>> {
    Ok(json_rows(raw)?
        .iter()
        .map(|row| RawService {
            name: json_str(row, "Name"),
            display_name: json_str(row, "DisplayName"),
            state: json_str(row, "State"),
            start_mode: json_str(row, "StartMode"),
            start_name: json_str(row, "StartName"),
            path_name: json_str(row, "PathName"),
            delayed_auto_start: None,
        })
        .filter(|s| !s.name.is_empty())
        .collect())
}

/// Delayed-autostart flags keyed by lowercase service name.
///
/// Services without the value are absent from the map; callers fall back
/// to the coarse start mode for them.
#[derive(Debug, Clone, Default)]
pub struct DelayedStartMap(HashMap<String, bool>);

impl DelayedStartMap {
    pub fn get(&self, service: &str) -> Option<bool> {
        self.0.get(&service.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy the flag onto every service that has one.
    pub fn annotate(&self, services: &mut [RawService]) {
        for service in services {
            service.delayed_auto_start = self.get(&service.name);
        }
    }
}

impl FromIterator<(String, bool)> for DelayedStartMap {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, delayed)| (name.to_ascii_lowercase(), delayed))
                .collect(),
        )
    }
}

pub fn query_delayed_start(timeout: Duration) -> Result<DelayedStartMap> {
    let raw = run_powershell(DELAYED_START_SCRIPT, "delayed-start query", timeout)?;
    parse_delayed_start_json(&raw)
}

pub fn parse_delayed_start_json(raw: &str) -> Result<DelayedStartMap> {
    Ok(json_rows(raw)?
        .iter()
        .map(|row| (json_str(row, "Name"), json_bool(row, "Delayed")))
        .filter(|(name, _)| !name.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_rows() {
        let raw = r#"[
            {"Name":"wuauserv","DisplayName":"Windows Update","State":"Running","StartMode":"Manual",
             "StartName":"LocalSystem","PathName":"C:\\WINDOWS\\system32\\svchost.exe -k netsvcs -p"},
            {"Name":"","DisplayName":"ghost"}
        ]"#;
        let services = parse_services_json(raw).unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].start_mode, "Manual");
        assert_eq!(
            services[0].path_name,
            r"C:\WINDOWS\system32\svchost.exe -k netsvcs -p"
        );
    }

    #[test]
    fn delayed_map_is_case_insensitive() {
        let raw = r#"[{"Name":"BITS","Delayed":1},{"Name":"Spooler","Delayed":0}]"#;
        let map = parse_delayed_start_json(raw).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("bits"), Some(true));
        assert_eq!(map.get("SPOOLER"), Some(false));
        assert_eq!(map.get("Dnscache"), None);
    }
}
