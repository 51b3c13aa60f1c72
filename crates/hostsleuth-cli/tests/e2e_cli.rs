/// End-to-end CLI tests.
///
/// Argument parsing goes through the real clap definition; the commands
/// exercised here (configuration and rename) touch only the filesystem, so
/// they run on any host against a temporary configuration file.
use clap::Parser;
use hostsleuth_cli::app::{format_event, is_risky_service, render_diff, render_table};
use hostsleuth_cli::cli::{
    resolve_format, Commands, ConfigAction, DomainArg, DriverAction, FormatArg, ServiceAction,
};
use hostsleuth_cli::{run, Cli};
use hostsleuth_core::config::Config;
use hostsleuth_core::diff::{ChangeType, DiffRecord};
use hostsleuth_core::model::{Domain, ExeWriteRisk, ServiceRecord};
use hostsleuth_core::report::ReportFormat;
use hostsleuth_core::session::SessionEvent;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

// ── Parsing ──────────────────────────────────────────────────────────────────

#[test]
fn parses_scan_with_export() {
    let cli = Cli::try_parse_from([
        "HostSleuth",
        "scan",
        "services",
        "--export",
        "out.html",
        "--risky-only",
        "-v",
    ])
    .unwrap();
    assert!(cli.verbose);
    match cli.command {
        Commands::Scan {
            domain,
            export,
            format,
            risky_only,
        } => {
            assert_eq!(domain, DomainArg::Services);
            assert_eq!(export, Some(PathBuf::from("out.html")));
            assert_eq!(format, None);
            assert!(risky_only);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn compare_requires_a_baseline() {
    assert!(Cli::try_parse_from(["HostSleuth", "compare", "software"]).is_err());
    let cli = Cli::try_parse_from([
        "HostSleuth",
        "compare",
        "drivers",
        "--baseline",
        "before.csv",
        "--format",
        "json",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Compare {
            domain: DomainArg::Drivers,
            format: Some(FormatArg::Json),
            ..
        }
    ));
}

#[test]
fn parses_actions() {
    let cli = Cli::try_parse_from(["HostSleuth", "drivers", "install-folder", r"D:\drivers"])
        .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Drivers {
            action: DriverAction::InstallFolder { .. }
        }
    ));

    let cli = Cli::try_parse_from(["HostSleuth", "service", "restart", "Spooler"]).unwrap();
    match cli.command {
        Commands::Service {
            action: ServiceAction::Restart { name },
        } => assert_eq!(name, "Spooler"),
        other => panic!("unexpected command {other:?}"),
    }

    assert!(Cli::try_parse_from(["HostSleuth", "scan", "printers"]).is_err());
}

#[test]
fn format_falls_back_to_extension_then_csv() {
    assert_eq!(
        resolve_format(Some(FormatArg::Html), Path::new("a.csv")),
        ReportFormat::Html
    );
    assert_eq!(resolve_format(None, Path::new("a.JSON")), ReportFormat::Json);
    assert_eq!(resolve_format(None, Path::new("report")), ReportFormat::Csv);
    assert_eq!(Domain::from(DomainArg::Software), Domain::Software);
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn cli(config: &Path, args: &[&str]) -> Cli {
    let mut argv = vec!["HostSleuth", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn config_show_creates_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cfg").join("config.json");

    run(cli(&path, &["config", "show"])).unwrap();
    assert!(path.exists());
    assert_eq!(Config::load(&path).unwrap(), Config::default());
}

#[test]
fn rename_persists_and_reset_clears() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    run(cli(&path, &["rename", "Registry::{A}", "Alpha Suite"])).unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.custom_names.get("Registry::{A}"), Some("Alpha Suite"));

    run(cli(&path, &["rename", "Registry::{A}"])).unwrap();
    assert!(Config::load(&path).unwrap().custom_names.is_empty());

    run(cli(&path, &["rename", "Winget::X", "X"])).unwrap();
    run(cli(&path, &["config", "reset"])).unwrap();
    assert_eq!(Config::load(&path).unwrap(), Config::default());
}

#[test]
fn broken_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ \"batch_size\": 0 }").unwrap();

    let err = run(cli(&path, &["config", "show"])).unwrap_err();
    assert!(format!("{err:#}").contains("batch_size"));
    // `config path` never reads the file.
    assert!(run(cli(&path, &["config", "path"])).is_ok());
    assert!(matches!(
        cli(&path, &["config", "path"]).command,
        Commands::Config {
            action: ConfigAction::Path
        }
    ));
}

// ── Output ───────────────────────────────────────────────────────────────────

#[test]
fn progress_lines() {
    let batch = SessionEvent::Progress {
        domain: Domain::Services,
        processed: 10,
        total: 12,
        message: "Analyzed 10/12 services".into(),
    };
    assert_eq!(
        format_event(&batch).unwrap(),
        "[10/12] Analyzed 10/12 services"
    );

    let done = SessionEvent::Finished {
        domain: Domain::Drivers,
        count: 40,
        failed_items: 2,
        duration: Duration::from_millis(1500),
    };
    assert_eq!(
        format_event(&done).unwrap(),
        "Loaded 40 drivers in 1.5s, 2 with partial data"
    );

    let failed = SessionEvent::ItemFailed {
        domain: Domain::Drivers,
        item: "x".into(),
        message: "timeout".into(),
    };
    assert_eq!(format_event(&failed), None);
}

#[test]
fn tables_align_and_clip() {
    let long = "x".repeat(80);
    let table = render_table(
        &["Name", "Value"],
        &[
            vec!["a".into(), "1".into()],
            vec!["bbb".into(), long.clone()],
        ],
    );
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "Name  Value");
    assert!(lines[1].starts_with("----  -----"));
    assert_eq!(lines[2], "a     1");
    assert!(lines[3].ends_with("..."));
    assert!(!table.contains(&long));
}

#[test]
fn diff_rendering_can_hide_unchanged_rows() {
    let diff = vec![
        DiffRecord {
            change_type: ChangeType::Unchanged,
            key: "Spooler".into(),
            field: String::new(),
            old_value: String::new(),
            new_value: String::new(),
            summary: "Spooler unchanged".into(),
        },
        DiffRecord {
            change_type: ChangeType::Changed,
            key: "BITS".into(),
            field: "State".into(),
            old_value: "Running".into(),
            new_value: "Stopped".into(),
            summary: "BITS: State 'Running' -> 'Stopped'".into(),
        },
    ];
    let all = render_diff(&diff, false);
    let changes = render_diff(&diff, true);
    assert!(all.contains("Spooler"));
    assert!(!changes.contains("Spooler"));
    assert!(changes.contains("BITS"));
}

#[test]
fn risky_service_filter() {
    let mut svc = ServiceRecord {
        name: "Contoso".into(),
        ..Default::default()
    };
    assert!(!is_risky_service(&svc));
    svc.exe_write_risk = ExeWriteRisk::Risky;
    assert!(is_risky_service(&svc));
}
