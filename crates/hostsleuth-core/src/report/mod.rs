/// Report sink: export collections and diff results, import baselines.
///
/// Formats:
/// - CSV: header row of field names, UTF-8.
/// - JSON: array of flat objects.
/// - HTML: standalone table with filtering and sorting.
pub mod csv;
pub mod html;
pub mod json;

use crate::diff::DiffRecord;
use crate::error::{Error, Result};
use crate::model::{Entity, Record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
    Html,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "html" | "htm" => Ok(Self::Html),
            other => Err(format!("unknown report format '{other}'")),
        }
    }
}

/// Write `records` with the given columns.
pub fn export_records(
    path: &Path,
    format: ReportFormat,
    title: &str,
    fields: &[&str],
    records: &[Record],
) -> Result<()> {
    match format {
        ReportFormat::Csv => csv::export_csv(path, fields, records)?,
        ReportFormat::Json => json::export_json(path, fields, records)?,
        ReportFormat::Html => html::export_html(path, title, fields, records)?,
    }
    info!(
        "Exported {} rows to {} ({format})",
        records.len(),
        path.display()
    );
    Ok(())
}

/// Columns to export for `E`: all fields, or the `visible` ones in
/// canonical order. Identity and compared fields are always kept so the
/// file can serve as a baseline for the same domain.
pub fn export_columns<E: Entity>(visible: &[String]) -> Vec<&'static str> {
    if visible.is_empty() {
        return E::FIELDS.to_vec();
    }
    E::FIELDS
        .iter()
        .copied()
        .filter(|f| {
            *f == E::KEY_FIELD
                || E::IDENTITY_FIELDS.contains(f)
                || E::COMPARE_FIELDS.contains(f)
                || visible.iter().any(|v| v.eq_ignore_ascii_case(f))
        })
        .collect()
}

/// Export a typed collection.
pub fn export_entities<E: Entity>(
    path: &Path,
    format: ReportFormat,
    items: &[E],
    visible: &[String],
) -> Result<()> {
    let fields = export_columns::<E>(visible);
    let records: Vec<Record> = items.iter().map(Entity::to_record).collect();
    let title = format!("HostSleuth {} inventory", E::DOMAIN);
    export_records(path, format, &title, &fields, &records)
}

pub fn export_diff(path: &Path, format: ReportFormat, diff: &[DiffRecord]) -> Result<()> {
    let records: Vec<Record> = diff.iter().map(DiffRecord::to_record).collect();
    export_records(
        path,
        format,
        "HostSleuth baseline comparison",
        DiffRecord::FIELDS,
        &records,
    )
}

/// Import a baseline for `E` from CSV or JSON (by extension).
///
/// The file must carry `E::KEY_FIELD`; anything else is a blocking
/// [`Error::BaselineParse`].
pub fn import_baseline<E: Entity>(path: &Path) -> Result<Vec<Record>> {
    let records = match ReportFormat::from_path(path) {
        Some(ReportFormat::Json) => json::import_json(path, E::KEY_FIELD)?,
        Some(ReportFormat::Csv) | None => csv::import_csv(path, E::KEY_FIELD)?,
        Some(ReportFormat::Html) => {
            return Err(Error::BaselineParse(
                "HTML reports cannot be used as a baseline".into(),
            ))
        }
    };
    info!(
        "Loaded {} baseline {} records from {}",
        records.len(),
        E::DOMAIN,
        path.display()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{diff_entities, ChangeType};
    use crate::model::{
        DeviceStatus, DriverDevice, ExeWriteRisk, ServiceControlRisk, ServiceRecord, ServiceState,
        SoftwareItem, SoftwareSource, StartupType,
    };

    #[test]
    fn format_parsing() {
        assert_eq!("CSV".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert_eq!("htm".parse::<ReportFormat>().unwrap(), ReportFormat::Html);
        assert!("xml".parse::<ReportFormat>().is_err());
        assert_eq!(
            ReportFormat::from_path(Path::new("out/report.JSON")),
            Some(ReportFormat::Json)
        );
        assert_eq!(ReportFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn column_selection_keeps_identity_and_compared_fields() {
        let cols = export_columns::<ServiceRecord>(&["ExeAclSummary".to_string(), "Bogus".to_string()]);
        assert_eq!(
            cols,
            vec![
                "Name",
                "DisplayName",
                "State",
                "StartupType",
                "LogOnAs",
                "ExePath",
                "ServiceControlRisk",
                "ExeWriteRisk",
                "ExeAclSummary",
            ]
        );
        let cols = export_columns::<SoftwareItem>(&["installdate".to_string()]);
        assert_eq!(
            cols,
            vec!["Name", "Version", "Publisher", "InstallDate", "Source", "UniqueId"]
        );
        assert_eq!(export_columns::<DriverDevice>(&[]), DriverDevice::FIELDS.to_vec());
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    /// Export with a column subset, import it back and diff it against the
    /// same collection.
    fn subset_round_trip<E: Entity>(items: &[E], visible: &[String]) -> Vec<DiffRecord> {
        let mut diffs = Vec::new();
        for format in [ReportFormat::Csv, ReportFormat::Json] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(format!("baseline.{format}"));
            export_entities(&path, format, items, visible).unwrap();
            let baseline = import_baseline::<E>(&path).unwrap();
            diffs.extend(diff_entities(&baseline, items));
        }
        diffs
    }

    #[test]
    fn software_subset_export_is_a_baseline() {
        let items = vec![
            SoftwareItem {
                name: "Foo".into(),
                unique_id: "{F}".into(),
                version: "1.0".into(),
                publisher: "Contoso".into(),
                source: SoftwareSource::Registry,
                ..Default::default()
            },
            SoftwareItem {
                name: "Bar".into(),
                version: "2.0".into(),
                source: SoftwareSource::Winget,
                ..Default::default()
            },
        ];
        let diff = subset_round_trip(&items, &cols(&["Name", "Version"]));
        let keys: Vec<(ChangeType, &str)> =
            diff.iter().map(|d| (d.change_type, d.key.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (ChangeType::Unchanged, "Registry::{F}"),
                (ChangeType::Unchanged, "Winget::Bar"),
                (ChangeType::Unchanged, "Registry::{F}"),
                (ChangeType::Unchanged, "Winget::Bar"),
            ]
        );
    }

    #[test]
    fn service_subset_export_is_a_baseline() {
        let items = vec![ServiceRecord {
            name: "Spooler".into(),
            display_name: "Print Spooler".into(),
            state: ServiceState::Running,
            startup_type: StartupType::AutomaticDelayed,
            log_on_as: "LocalSystem".into(),
            exe_path: r"C:\Windows\System32\spoolsv.exe".into(),
            service_control_risk: ServiceControlRisk::Ok,
            exe_write_risk: ExeWriteRisk::Risky,
            ..Default::default()
        }];
        let diff = subset_round_trip(&items, &cols(&["State"]));
        assert_eq!(diff.len(), 2);
        assert!(diff.iter().all(|d| d.change_type == ChangeType::Unchanged));
    }

    #[test]
    fn driver_subset_export_is_a_baseline() {
        let items = vec![DriverDevice {
            friendly_name: "Network Adapter".into(),
            class: "Net".into(),
            status: DeviceStatus::Ok,
            present: true,
            driver_version: "10.0.1".into(),
            driver_provider: "Contoso".into(),
            driver_date: "2024-01-02".into(),
            driver_inf_path: "oem1.inf".into(),
            instance_id: r"PCI\VEN_1".into(),
        }];
        let diff = subset_round_trip(&items, &cols(&["FriendlyName"]));
        assert_eq!(diff.len(), 2);
        assert!(diff.iter().all(|d| d.change_type == ChangeType::Unchanged));
    }

    #[test]
    fn html_is_not_a_baseline() {
        let err = import_baseline::<SoftwareItem>(Path::new("report.html")).unwrap_err();
        assert!(matches!(err, Error::BaselineParse(_)));
    }

    #[test]
    fn json_software_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("software.json");
        let items = vec![SoftwareItem {
            name: "Foo".into(),
            unique_id: "{F}".into(),
            version: "1.0".into(),
            ..Default::default()
        }];
        export_entities(&path, ReportFormat::Json, &items, &[]).unwrap();
        let back = import_baseline::<SoftwareItem>(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(SoftwareItem::from_record(&back[0]), items[0]);
    }
}
