/// Plug and Play devices and the drivers bound to them.
///
/// Enumeration is one bulk query; the driver properties of each device are a
/// separate per-device query, which is what the batch scheduler spreads out.
use super::command::{json_bool, json_rows, json_str, ps_quote, run_powershell};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::time::Duration;

/// One device as reported by PnP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawDevice {
    pub friendly_name: String,
    pub class: String,
    pub status: String,
    pub present: bool,
    pub instance_id: String,
}

/// Driver properties of one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverDetails {
    pub version: String,
    pub provider: String,
    /// `YYYY-MM-DD` when recognisable.
    pub date: String,
    pub inf_path: String,
}

/// Per-device driver lookup.
pub trait DriverDetailSource: Send + Sync {
    fn driver_details(&self, instance_id: &str) -> Result<DriverDetails>;
}

/// Enumerate PnP devices. Non-present (ghost) devices are included only
/// when asked for.
pub fn enumerate_devices(include_non_present: bool, timeout: Duration) -> Result<Vec<RawDevice>> {
    let filter = if include_non_present { "" } else { " -PresentOnly" };
    let script = format!(
        "Get-PnpDevice{filter} -EA SilentlyContinue | \
         Select-Object FriendlyName, Class, Status, Present, InstanceId | \
         ConvertTo-Json -Compress"
    );
    let raw = run_powershell(&script, "PnP device query", timeout)?;
    parse_devices_json(&raw)
}

pub fn parse_devices_json(raw: &str) -> Result<Vec<RawDevice>> {
    Ok(json_rows(raw)?
        .iter()
        .map(|row| RawDevice {
            friendly_name: json_str(row, "FriendlyName"),
            class: json_str(row, "Class"),
            status: json_str(row, "Status"),
            present: json_bool(row, "Present"),
            instance_id: json_str(row, "InstanceId"),
        })
        .filter(|d| !d.instance_id.is_empty())
        .collect())
}

/// Reads driver properties through `Get-PnpDeviceProperty`.
#[derive(Debug, Clone)]
pub struct PnpPropertySource {
    pub timeout: Duration,
}

impl PnpPropertySource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

const DRIVER_KEYS: [(&str, &str); 4] = [
    ("DEVPKEY_Device_DriverVersion", "version"),
    ("DEVPKEY_Device_DriverProvider", "provider"),
    ("DEVPKEY_Device_DriverDate", "date"),
    ("DEVPKEY_Device_DriverInfPath", "inf"),
];

impl DriverDetailSource for PnpPropertySource {
    fn driver_details(&self, instance_id: &str) -> Result<DriverDetails> {
        let keys: Vec<String> = DRIVER_KEYS.iter().map(|(k, _)| ps_quote(k)).collect();
        let script = format!(
            "Get-PnpDeviceProperty -InstanceId {} -KeyName {} -EA Stop | ForEach-Object {{ \
               $d = $_.Data; if ($d -is [datetime]) {{ $d = $d.ToString('yyyy-MM-dd') }}; \
               [pscustomobject]@{{ KeyName = $_.KeyName; Data = \"$d\" }} \
             }} | ConvertTo-Json -Compress",
            ps_quote(instance_id),
            keys.join(",")
        );
        let what = format!("driver properties of {instance_id}");
        let raw = run_powershell(&script, &what, self.timeout)?;
        parse_driver_properties(&raw)
    }
}

/// Parse `KeyName`/`Data` rows into [`DriverDetails`].
pub fn parse_driver_properties(raw: &str) -> Result<DriverDetails> {
    let mut details = DriverDetails::default();
    for row in json_rows(raw)? {
        let key = json_str(&row, "KeyName");
        let data = json_str(&row, "Data");
        match DRIVER_KEYS.iter().find(|(k, _)| *k == key).map(|(_, f)| *f) {
            Some("version") => details.version = data,
            Some("provider") => details.provider = data,
            Some("date") => details.date = normalize_driver_date(&data),
            Some("inf") => details.inf_path = data,
            _ => {}
        }
    }
    if details == DriverDetails::default() {
        return Err(Error::query("driver properties", "no driver bound"));
    }
    Ok(details)
}

/// Render the date formats PnP and WMI emit as `YYYY-MM-DD`.
///
/// Accepts ISO dates, US `MM/DD/YYYY`, CIM `yyyymmddHHMMSS.ffffff+zzz` and
/// the `/Date(ms)/` form of older `ConvertTo-Json`. Anything else is
/// returned trimmed but otherwise unchanged.
pub fn normalize_driver_date(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    if let Some(ms) = s
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
        .and_then(|ms| ms.split(['+', '-']).next())
        .and_then(|ms| ms.parse::<i64>().ok())
    {
        if let Some(dt) = DateTime::from_timestamp_millis(ms) {
            return dt.date_naive().format("%Y-%m-%d").to_string();
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.format("%Y-%m-%d").to_string();
    }
    let date_part = s.split_whitespace().next().unwrap_or(s);
    if let Ok(d) = NaiveDate::parse_from_str(date_part, "%m/%d/%Y") {
        return d.format("%Y-%m-%d").to_string();
    }
    if s.len() >= 14 && s.is_char_boundary(14) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s[..14], "%Y%m%d%H%M%S") {
            return dt.date().format("%Y-%m-%d").to_string();
        }
    }
    if s.len() == 8 {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
            return d.format("%Y-%m-%d").to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_rows() {
        let raw = r#"[
            {"FriendlyName":"Intel(R) Ethernet","Class":"Net","Status":"OK","Present":true,"InstanceId":"PCI\\VEN_8086&DEV_15F3\\3&11583659&0&FE"},
            {"FriendlyName":null,"Class":"USB","Status":"Unknown","Present":false,"InstanceId":"USB\\VID_0000\\1"},
            {"FriendlyName":"No id","Class":"System","Status":"OK","Present":true,"InstanceId":""}
        ]"#;
        let devices = parse_devices_json(raw).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].instance_id, r"PCI\VEN_8086&DEV_15F3\3&11583659&0&FE");
        assert!(devices[0].present);
        assert_eq!(devices[1].friendly_name, "");
        assert!(!devices[1].present);
    }

    #[test]
    fn parses_driver_properties() {
        let raw = r#"[
            {"KeyName":"DEVPKEY_Device_DriverVersion","Data":"12.19.1.37"},
            {"KeyName":"DEVPKEY_Device_DriverProvider","Data":"Intel"},
            {"KeyName":"DEVPKEY_Device_DriverDate","Data":"2023-04-11"},
            {"KeyName":"DEVPKEY_Device_DriverInfPath","Data":"oem42.inf"}
        ]"#;
        let d = parse_driver_properties(raw).unwrap();
        assert_eq!(d.version, "12.19.1.37");
        assert_eq!(d.provider, "Intel");
        assert_eq!(d.date, "2023-04-11");
        assert_eq!(d.inf_path, "oem42.inf");
    }

    #[test]
    fn device_without_driver_is_an_error() {
        let raw = r#"[{"KeyName":"DEVPKEY_Device_DriverVersion","Data":""}]"#;
        assert!(parse_driver_properties(raw).is_err());
        assert!(parse_driver_properties("").is_err());
    }

    #[test]
    fn date_formats() {
        assert_eq!(normalize_driver_date("2021-06-01"), "2021-06-01");
        assert_eq!(normalize_driver_date("6/1/2021"), "2021-06-01");
        assert_eq!(normalize_driver_date("06/01/2021 00:00:00"), "2021-06-01");
        assert_eq!(
            normalize_driver_date("20210601000000.000000-000"),
            "2021-06-01"
        );
        assert_eq!(normalize_driver_date("20210601"), "2021-06-01");
        assert_eq!(normalize_driver_date("/Date(1622505600000)/"), "2021-06-01");
        assert_eq!(normalize_driver_date("  "), "");
        assert_eq!(normalize_driver_date("sometime"), "sometime");
    }
}
