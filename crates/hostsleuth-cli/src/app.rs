/// Command dispatch.
///
/// Progress goes to stderr as `[processed/total] message`; tables, diff rows
/// and action outcomes go to stdout.
use crate::cli::{resolve_format, Cli, Commands, ConfigAction, DriverAction, ServiceAction};
use anyhow::{bail, Context, Result};
use hostsleuth_core::actions::{start_action, ActionKind};
use hostsleuth_core::analysis::{assess_exe_acl, AclEntry};
use hostsleuth_core::config::Config;
use hostsleuth_core::diff::{ChangeType, DiffRecord, DiffSummary};
use hostsleuth_core::model::{
    Domain, DriverDevice, ExeWriteRisk, ServiceControlRisk, ServiceRecord, SoftwareItem,
};
use hostsleuth_core::platform::{is_elevated, NativeFileAclSource};
use hostsleuth_core::report::export_diff;
use hostsleuth_core::scanner::worker_count;
use hostsleuth_core::session::{InventorySession, SessionEvent};
use std::path::Path;
use tracing::{info, warn};

/// Cells longer than this are clipped in printed tables.
const MAX_CELL_WIDTH: usize = 60;

pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Config { action } => run_config(action, &config_path),
        Commands::Info => run_info(&config_path),
        Commands::Rename { key, name } => run_rename(&config_path, &key, name.as_deref()),
        Commands::ExeAcl { path } => run_exe_acl(&path),
        Commands::Drivers { action } => run_action(match action {
            DriverAction::Backup { destination } => ActionKind::BackupDrivers { destination },
            DriverAction::Install { inf } => ActionKind::InstallDriver { inf },
            DriverAction::InstallFolder { folder } => ActionKind::InstallDriverFolder { folder },
        }),
        Commands::Service { action } => run_action(match action {
            ServiceAction::Start { name } => ActionKind::StartService { name },
            ServiceAction::Stop { name } => ActionKind::StopService { name },
            ServiceAction::Restart { name } => ActionKind::RestartService { name },
        }),
        Commands::ServiceAcl { name } => {
            let session = InventorySession::with_system_sources(load_config(&config_path)?);
            run_service_acl(&session, &name)
        }
        Commands::Scan {
            domain,
            export,
            format,
            risky_only,
        } => {
            let domain = Domain::from(domain);
            let mut session = InventorySession::with_system_sources(load_config(&config_path)?);
            refresh(&mut session, domain)?;
            print!("{}", render_collection(&session, domain, risky_only));
            if let Some(path) = export {
                let format = resolve_format(format, &path);
                session
                    .export(domain, &path, format)
                    .with_context(|| format!("export to {} failed", path.display()))?;
                eprintln!("Exported {domain} to {}", path.display());
            }
            Ok(())
        }
        Commands::Compare {
            domain,
            baseline,
            export,
            format,
            changes_only,
        } => {
            let domain = Domain::from(domain);
            let mut session = InventorySession::with_system_sources(load_config(&config_path)?);
            refresh(&mut session, domain)?;
            let diff = session
                .compare(domain, &baseline)
                .with_context(|| format!("cannot compare against {}", baseline.display()))?;
            println!("{}", DiffSummary::from_records(&diff));
            print!("{}", render_diff(&diff, changes_only));
            if let Some(path) = export {
                export_diff(&path, resolve_format(format, &path), &diff)
                    .with_context(|| format!("export to {} failed", path.display()))?;
                eprintln!("Exported comparison to {}", path.display());
            }
            Ok(())
        }
    }
}

// ── Configuration ─────────────────────────────────────────────

/// Load (or create) the configuration. Any failure here is fatal.
fn load_config(path: &Path) -> Result<Config> {
    Config::load_or_create(path)
        .with_context(|| format!("cannot use configuration file {}", path.display()))
}

fn run_config(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            let config = load_config(path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Reset => {
            Config::default()
                .save(path)
                .context("could not reset configuration")?;
            println!("Configuration reset: {}", path.display());
        }
    }
    Ok(())
}

fn run_rename(path: &Path, key: &str, name: Option<&str>) -> Result<()> {
    let mut config = load_config(path)?;
    config.custom_names.set(key, name.unwrap_or_default());
    if let Err(e) = config.save(path) {
        warn!("{e}");
    }
    match name.filter(|n| !n.trim().is_empty()) {
        Some(n) => println!("{key} -> {n}"),
        None => println!("{key}: custom name cleared"),
    }
    Ok(())
}

fn run_info(config_path: &Path) -> Result<()> {
    println!("HostSleuth {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Elevated:      {}",
        if is_elevated() { "yes" } else { "no (ACL and driver queries may be incomplete)" }
    );
    let state = if config_path.exists() { "" } else { " (not created yet)" };
    println!("Configuration: {}{state}", config_path.display());
    println!("Workers:       {}", worker_count());
    if config_path.exists() {
        let config = load_config(config_path)?;
        println!("Batch size:    {}", config.batch_size);
        println!("Query timeout: {} s", config.query_timeout_secs);
    }
    Ok(())
}

// ── Inventory ─────────────────────────────────────────────────

fn refresh(session: &mut InventorySession, domain: Domain) -> Result<()> {
    session.refresh(domain)?;
    session
        .wait_for(domain, |event| {
            if let Some(line) = format_event(event) {
                eprintln!("{line}");
            }
        })
        .with_context(|| format!("{domain} inventory failed"))
}

/// Progress line for `event`, or `None` for events already logged by the core.
pub fn format_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Started { domain, total } => {
            Some(format!("[0/{total}] Found {total} {domain}"))
        }
        SessionEvent::Progress {
            processed,
            total,
            message,
            ..
        } => Some(format!("[{processed}/{total}] {message}")),
        SessionEvent::ItemFailed { .. } => None,
        SessionEvent::Finished {
            domain,
            count,
            failed_items,
            duration,
        } => {
            let degraded = if *failed_items > 0 {
                format!(", {failed_items} with partial data")
            } else {
                String::new()
            };
            Some(format!(
                "Loaded {count} {domain} in {:.1}s{degraded}",
                duration.as_secs_f64()
            ))
        }
        SessionEvent::Failed { domain, message } => {
            Some(format!("{domain} refresh failed: {message}"))
        }
        SessionEvent::Cancelled { domain } => Some(format!("{domain} refresh cancelled")),
    }
}

fn render_collection(session: &InventorySession, domain: Domain, risky_only: bool) -> String {
    match domain {
        Domain::Software => render_software(session.software()),
        Domain::Drivers => render_drivers(session.drivers()),
        Domain::Services => {
            let services: Vec<ServiceRecord> = session
                .services()
                .iter()
                .filter(|s| !risky_only || is_risky_service(s))
                .cloned()
                .collect();
            render_services(&services)
        }
    }
}

pub fn is_risky_service(service: &ServiceRecord) -> bool {
    service.service_control_risk == ServiceControlRisk::Weak
        || service.exe_write_risk == ExeWriteRisk::Risky
}

pub fn render_software(items: &[SoftwareItem]) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|s| {
            vec![
                s.display_name().to_string(),
                s.version.clone(),
                s.publisher.clone(),
                s.source.to_string(),
                s.change_status.as_str().to_string(),
            ]
        })
        .collect();
    render_table(&["Name", "Version", "Publisher", "Source", "Status"], &rows)
}

pub fn render_drivers(items: &[DriverDevice]) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|d| {
            vec![
                d.friendly_name.clone(),
                d.class.clone(),
                d.status.as_str().to_string(),
                d.driver_version.clone(),
                d.driver_provider.clone(),
                d.driver_date.clone(),
            ]
        })
        .collect();
    render_table(
        &["Device", "Class", "Status", "Version", "Provider", "Date"],
        &rows,
    )
}

pub fn render_services(items: &[ServiceRecord]) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.state.as_str().to_string(),
                s.startup_type.as_str().to_string(),
                s.service_control_risk.as_str().to_string(),
                s.exe_write_risk.as_str().to_string(),
                s.exe_path.clone(),
            ]
        })
        .collect();
    render_table(
        &["Name", "State", "Startup", "Control", "Exe", "Path"],
        &rows,
    )
}

pub fn render_diff(diff: &[DiffRecord], changes_only: bool) -> String {
    let rows: Vec<Vec<String>> = diff
        .iter()
        .filter(|d| !changes_only || d.change_type != ChangeType::Unchanged)
        .map(|d| {
            vec![
                d.change_type.as_str().to_string(),
                d.key.clone(),
                d.field.clone(),
                d.old_value.clone(),
                d.new_value.clone(),
            ]
        })
        .collect();
    render_table(&["Change", "Key", "Field", "Old", "New"], &rows)
}

/// Left-aligned columns separated by two spaces.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count().min(MAX_CELL_WIDTH));
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: Vec<String>| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", clip(cell), width = *width))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };
    push_line(headers.iter().map(|h| h.to_string()).collect());
    push_line(widths.iter().map(|w| "-".repeat(*w)).collect());
    for row in rows {
        push_line(row.clone());
    }
    out
}

fn clip(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_string();
    }
    let kept: String = cell.chars().take(MAX_CELL_WIDTH - 3).collect();
    format!("{kept}...")
}

// ── Security detail ───────────────────────────────────────────

fn run_service_acl(session: &InventorySession, name: &str) -> Result<()> {
    let detail = session
        .service_acl_detail(name)
        .with_context(|| format!("cannot inspect service {name}"))?;

    println!("Service:  {}", detail.service);
    println!(
        "Control:  {}  {}",
        detail.control.risk.as_str(),
        detail.control.summary
    );
    print!("{}", render_acl(&detail.control.entries));
    println!();
    println!("Binary:   {}", detail.exe.path);
    println!("Write:    {}  {}", detail.exe.risk.as_str(), detail.exe.summary);
    print!("{}", render_acl(&detail.exe.entries));
    Ok(())
}

fn run_exe_acl(path: &str) -> Result<()> {
    let assessment = assess_exe_acl(&NativeFileAclSource, path);
    println!("Binary:   {}", assessment.path);
    println!("Write:    {}  {}", assessment.risk.as_str(), assessment.summary);
    print!("{}", render_acl(&assessment.entries));
    Ok(())
}

pub fn render_acl(entries: &[AclEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.identity.clone(),
                e.ace_type.as_str().to_string(),
                e.rights.clone(),
                e.risk.as_str().to_string(),
            ]
        })
        .collect();
    render_table(&["Identity", "Type", "Rights", "Risk"], &rows)
}

// ── Actions ───────────────────────────────────────────────────

fn run_action(kind: ActionKind) -> Result<()> {
    let description = kind.describe();
    if !is_elevated() {
        warn!("Not running elevated; {description} will probably be refused");
    }
    let handle = start_action(kind).with_context(|| format!("{description} could not start"))?;
    info!("{} running", handle.description());
    eprint!("{description}");
    let outcome = handle.wait(|| eprint!("."));
    eprintln!();

    if !outcome.success {
        bail!("{}", outcome.message);
    }
    println!("{}", outcome.message);
    if outcome.requires_reboot {
        println!("Restart Windows to finish.");
    }
    Ok(())
}
