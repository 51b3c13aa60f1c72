/// Session state management.
///
/// Owns the canonical collection for each domain and at most one in-flight
/// refresh per domain. Refreshes run on background threads; the owner calls
/// [`InventorySession::process_messages`] regularly (or
/// [`InventorySession::wait_for`]) to fold progress into the session. A
/// finished refresh replaces its collection wholesale.
use crate::analysis::{
    assess_exe_acl, assess_service_control, ExeAclAssessment, ServiceControlAssessment,
};
use crate::config::{Config, PerDomain, SourceConfig};
use crate::diff::{compare_software, diff_entities, DiffRecord};
use crate::error::{Error, Result};
use crate::model::{Domain, DriverDevice, ServiceRecord, SoftwareItem};
use crate::normalize::{normalize_drivers, normalize_services, normalize_software, sort_software};
use crate::platform::{InventorySources, SystemSources};
use crate::report::{export_entities, import_baseline, ReportFormat};
use crate::scanner::{
    start_analysis, AnalysisHandle, AnalysisProgress, DriverAnalyzer, RawSoftware, ScanPhase,
    ServiceAnalyzer, SoftwareMapper,
};
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Maximum progress messages folded in per domain per call.
///
/// Keeps one `process_messages` call short when a backlog has built up.
const MAX_MESSAGES_PER_POLL: usize = 300;

/// How long [`InventorySession::wait_for`] blocks on the channel per round.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// What happened since the last call, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started {
        domain: Domain,
        total: usize,
    },
    Progress {
        domain: Domain,
        processed: usize,
        total: usize,
        message: String,
    },
    ItemFailed {
        domain: Domain,
        item: String,
        message: String,
    },
    /// The collection was replaced; `count` is after filtering.
    Finished {
        domain: Domain,
        count: usize,
        failed_items: usize,
        duration: Duration,
    },
    Failed {
        domain: Domain,
        message: String,
    },
    Cancelled {
        domain: Domain,
    },
}

impl SessionEvent {
    pub fn domain(&self) -> Domain {
        match self {
            Self::Started { domain, .. }
            | Self::Progress { domain, .. }
            | Self::ItemFailed { domain, .. }
            | Self::Finished { domain, .. }
            | Self::Failed { domain, .. }
            | Self::Cancelled { domain } => *domain,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Full security detail for one service, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAclDetail {
    pub service: String,
    pub control: ServiceControlAssessment,
    pub exe: ExeAclAssessment,
}

struct Completed<T> {
    results: Vec<T>,
    duration: Duration,
    failed_items: usize,
}

pub struct InventorySession {
    config: Config,
    sources: Arc<dyn InventorySources>,

    // ── Collections ────────────────────────────────────
    software: Vec<SoftwareItem>,
    drivers: Vec<DriverDevice>,
    services: Vec<ServiceRecord>,

    // ── Refreshes ──────────────────────────────────────
    software_scan: Option<AnalysisHandle<SoftwareItem>>,
    driver_scan: Option<AnalysisHandle<DriverDevice>>,
    service_scan: Option<AnalysisHandle<ServiceRecord>>,
    phases: PerDomain<ScanPhase>,

    /// Keyed by lowercase service name; cleared on every services refresh.
    acl_cache: Mutex<HashMap<String, Arc<ServiceAclDetail>>>,
}

impl InventorySession {
    pub fn new(config: Config, sources: Arc<dyn InventorySources>) -> Self {
        Self {
            config,
            sources,
            software: Vec::new(),
            drivers: Vec::new(),
            services: Vec::new(),
            software_scan: None,
            driver_scan: None,
            service_scan: None,
            phases: PerDomain {
                software: ScanPhase::Idle,
                drivers: ScanPhase::Idle,
                services: ScanPhase::Idle,
            },
            acl_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Session backed by the live system queries.
    pub fn with_system_sources(config: Config) -> Self {
        let sources = Arc::new(SystemSources::new(config.query_timeout()));
        Self::new(config, sources)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn software(&self) -> &[SoftwareItem] {
        &self.software
    }

    pub fn drivers(&self) -> &[DriverDevice] {
        &self.drivers
    }

    pub fn services(&self) -> &[ServiceRecord] {
        &self.services
    }

    pub fn phase(&self, domain: Domain) -> &ScanPhase {
        self.phases.get(domain)
    }

    pub fn is_refreshing(&self, domain: Domain) -> bool {
        match domain {
            Domain::Software => self.software_scan.is_some(),
            Domain::Drivers => self.driver_scan.is_some(),
            Domain::Services => self.service_scan.is_some(),
        }
    }

    // ── Refresh ────────────────────────────────────────

    /// Start a background refresh of `domain`.
    ///
    /// Fails with [`Error::RefreshInProgress`] while one is already running.
    pub fn refresh(&mut self, domain: Domain) -> Result<()> {
        if self.is_refreshing(domain) {
            return Err(Error::RefreshInProgress(domain));
        }
        let sources = self.sources.clone();
        let batch_size = self.config.batch_size;

        match domain {
            Domain::Software => {
                let enabled = self.config.sources;
                let handle = start_analysis(
                    domain,
                    move || Ok(gather_software(sources.as_ref(), enabled)),
                    SoftwareMapper,
                    batch_size,
                )?;
                self.software_scan = Some(handle);
            }
            Domain::Drivers => {
                let include_non_present = self.config.visibility.show_non_present;
                let analyzer = DriverAnalyzer::new(sources.driver_details());
                let handle = start_analysis(
                    domain,
                    move || Ok(degrade("Device inventory", sources.devices(include_non_present))),
                    analyzer,
                    batch_size,
                )?;
                self.driver_scan = Some(handle);
            }
            Domain::Services => {
                self.acl_cache.lock().clear();
                let analyzer = ServiceAnalyzer::new(sources.descriptors(), sources.file_acls());
                let handle = start_analysis(
                    domain,
                    move || {
                        let mut services = degrade("Service inventory", sources.services());
                        match sources.delayed_start() {
                            Ok(delayed) => delayed.annotate(&mut services),
                            Err(e) => warn!("Delayed-start flags unavailable: {e}"),
                        }
                        Ok(services)
                    },
                    analyzer,
                    batch_size,
                )?;
                self.service_scan = Some(handle);
            }
        }

        *self.phases.get_mut(domain) = ScanPhase::Enumerating;
        info!("Refresh of {domain} started");
        Ok(())
    }

    /// Ask a running refresh to stop at the next batch boundary.
    pub fn cancel(&self, domain: Domain) {
        match domain {
            Domain::Software => self.software_scan.as_ref().map(AnalysisHandle::cancel),
            Domain::Drivers => self.driver_scan.as_ref().map(AnalysisHandle::cancel),
            Domain::Services => self.service_scan.as_ref().map(AnalysisHandle::cancel),
        };
    }

    /// Drain pending progress for every domain without blocking.
    pub fn process_messages(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for domain in Domain::ALL {
            self.drain(domain, None, &mut events);
        }
        events
    }

    /// Block until the refresh of `domain` ends, forwarding every event.
    ///
    /// A failed refresh is returned as an error; a cancelled one is not.
    pub fn wait_for<F: FnMut(&SessionEvent)>(
        &mut self,
        domain: Domain,
        mut on_event: F,
    ) -> Result<()> {
        while self.is_refreshing(domain) {
            let mut events = Vec::new();
            self.drain(domain, Some(WAIT_SLICE), &mut events);
            for event in &events {
                on_event(event);
                if let SessionEvent::Failed { message, .. } = event {
                    return Err(Error::query(format!("{domain} refresh"), message.clone()));
                }
            }
        }
        Ok(())
    }

    fn drain(&mut self, domain: Domain, block: Option<Duration>, events: &mut Vec<SessionEvent>) {
        let phase = self.phases.get_mut(domain);
        match domain {
            Domain::Software => {
                if let Some(done) = pump(&mut self.software_scan, domain, block, phase, events) {
                    let Completed {
                        results,
                        duration,
                        failed_items,
                    } = done;
                    self.software = normalize_software(
                        results,
                        &self.config.exclusion_filter(domain),
                        &self.config.visibility,
                        &self.config.custom_names,
                    );
                    events.push(finished(domain, self.software.len(), failed_items, duration));
                }
            }
            Domain::Drivers => {
                if let Some(done) = pump(&mut self.driver_scan, domain, block, phase, events) {
                    let Completed {
                        results,
                        duration,
                        failed_items,
                    } = done;
                    self.drivers = normalize_drivers(
                        results,
                        &self.config.exclusion_filter(domain),
                        &self.config.visibility,
                    );
                    events.push(finished(domain, self.drivers.len(), failed_items, duration));
                }
            }
            Domain::Services => {
                if let Some(done) = pump(&mut self.service_scan, domain, block, phase, events) {
                    let Completed {
                        results,
                        duration,
                        failed_items,
                    } = done;
                    self.services =
                        normalize_services(results, &self.config.exclusion_filter(domain));
                    self.acl_cache.lock().clear();
                    events.push(finished(domain, self.services.len(), failed_items, duration));
                }
            }
        }
    }

    // ── Service detail ─────────────────────────────────

    /// Full control and executable ACL detail for one service.
    ///
    /// Looks the service up in the current collection, or queries the
    /// service list when it has not been loaded. Results are cached until
    /// the next services refresh.
    pub fn service_acl_detail(&self, name: &str) -> Result<Arc<ServiceAclDetail>> {
        let key = name.to_lowercase();
        if let Some(detail) = self.acl_cache.lock().get(&key) {
            return Ok(detail.clone());
        }

        let (service, raw_path) = match self
            .services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
        {
            Some(s) => (s.name.clone(), s.exe_path_raw.clone()),
            None => self
                .sources
                .services()?
                .into_iter()
                .find(|s| s.name.eq_ignore_ascii_case(name))
                .map(|s| (s.name, s.path_name))
                .ok_or_else(|| {
                    Error::query("Service lookup", format!("no service named '{name}'"))
                })?,
        };

        let detail = Arc::new(ServiceAclDetail {
            control: assess_service_control(self.sources.descriptors().as_ref(), &service),
            exe: assess_exe_acl(self.sources.file_acls().as_ref(), &raw_path),
            service,
        });
        self.acl_cache.lock().insert(key, detail.clone());
        Ok(detail)
    }

    // ── Baseline and export ────────────────────────────

    /// Compare the current collection of `domain` against a baseline file.
    ///
    /// Software items are annotated in place (`ChangeStatus`,
    /// `PreviousVersion`, appended `REMOVED` rows).
    pub fn compare(&mut self, domain: Domain, baseline: &Path) -> Result<Vec<DiffRecord>> {
        let diff = match domain {
            Domain::Software => {
                let records = import_baseline::<SoftwareItem>(baseline)?;
                compare_software(&records, &mut self.software)
            }
            Domain::Drivers => {
                diff_entities(&import_baseline::<DriverDevice>(baseline)?, &self.drivers)
            }
            Domain::Services => {
                diff_entities(&import_baseline::<ServiceRecord>(baseline)?, &self.services)
            }
        };
        info!(
            "Compared {domain} against {}: {} diff rows",
            baseline.display(),
            diff.len()
        );
        Ok(diff)
    }

    /// Export the current collection with the configured columns.
    pub fn export(&self, domain: Domain, path: &Path, format: ReportFormat) -> Result<()> {
        let columns = self.config.columns(domain);
        match domain {
            Domain::Software => export_entities(path, format, &self.software, columns),
            Domain::Drivers => export_entities(path, format, &self.drivers, columns),
            Domain::Services => export_entities(path, format, &self.services, columns),
        }
    }

    /// Set (or clear, with an empty name) the display name for a software
    /// identity key and re-sort the collection.
    pub fn set_custom_name(&mut self, identity_key: &str, name: &str) {
        self.config.custom_names.set(identity_key, name);
        self.config.custom_names.apply(&mut self.software);
        sort_software(&mut self.software);
    }
}

/// Collect raw rows from the enabled software inventories. An unavailable
/// inventory contributes nothing.
fn gather_software(sources: &dyn InventorySources, enabled: SourceConfig) -> Vec<RawSoftware> {
    let mut rows = Vec::new();
    if enabled.registry {
        rows.extend(
            degrade("Registry uninstall entries", sources.uninstall_entries())
                .into_iter()
                .filter(|e| !e.display_name.trim().is_empty())
                .map(RawSoftware::Uninstall),
        );
    }
    if enabled.appx {
        rows.extend(
            degrade("AppX packages", sources.appx_packages())
                .into_iter()
                .map(RawSoftware::Appx),
        );
    }
    if enabled.winget {
        rows.extend(
            degrade("winget packages", sources.winget_entries())
                .into_iter()
                .map(RawSoftware::Winget),
        );
    }
    rows
}

fn degrade<T>(what: &str, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) => {
            warn!("{what} unavailable: {e}");
            Vec::new()
        }
    }
}

fn finished(domain: Domain, count: usize, failed_items: usize, duration: Duration) -> SessionEvent {
    SessionEvent::Finished {
        domain,
        count,
        failed_items,
        duration,
    }
}

/// Fold queued messages from `slot` into `phase` and `events`.
///
/// When `block` is set, the first receive waits up to that long. The handle
/// is released on any terminal message (or a vanished worker thread), which
/// re-enables refreshing the domain.
fn pump<T>(
    slot: &mut Option<AnalysisHandle<T>>,
    domain: Domain,
    mut block: Option<Duration>,
    phase: &mut ScanPhase,
    events: &mut Vec<SessionEvent>,
) -> Option<Completed<T>> {
    let handle = slot.as_ref()?;
    let mut completed = None;
    let mut terminal = false;

    for _ in 0..MAX_MESSAGES_PER_POLL {
        let received = match block.take() {
            Some(wait) => match handle.progress_rx.recv_timeout(wait) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => match handle.progress_rx.try_recv() {
                Ok(msg) => Some(msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => None,
            },
        };
        let Some(msg) = received else {
            let message = "analysis thread exited without a result".to_string();
            warn!("Refresh of {domain}: {message}");
            *phase = ScanPhase::Failed(message.clone());
            events.push(SessionEvent::Failed { domain, message });
            terminal = true;
            break;
        };

        match msg {
            AnalysisProgress::Started { total, .. } => {
                *phase = ScanPhase::Analyzing {
                    processed: 0,
                    total,
                };
                events.push(SessionEvent::Started { domain, total });
            }
            AnalysisProgress::Batch {
                processed,
                total,
                message,
            } => {
                *phase = ScanPhase::Analyzing { processed, total };
                events.push(SessionEvent::Progress {
                    domain,
                    processed,
                    total,
                    message,
                });
            }
            AnalysisProgress::ItemFailed { item, message } => {
                events.push(SessionEvent::ItemFailed {
                    domain,
                    item,
                    message,
                });
            }
            AnalysisProgress::Complete {
                results,
                duration,
                failed_items,
            } => {
                *phase = ScanPhase::Complete;
                completed = Some(Completed {
                    results,
                    duration,
                    failed_items,
                });
                terminal = true;
                break;
            }
            AnalysisProgress::Failed { message } => {
                *phase = ScanPhase::Failed(message.clone());
                events.push(SessionEvent::Failed { domain, message });
                terminal = true;
                break;
            }
            AnalysisProgress::Cancelled => {
                *phase = ScanPhase::Idle;
                events.push(SessionEvent::Cancelled { domain });
                terminal = true;
                break;
            }
        }
    }

    if terminal {
        *slot = None;
    }
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FileAclSource, RawAce, SecurityDescriptorSource};
    use crate::diff::ChangeType;
    use crate::model::{ServiceControlRisk, SoftwareSource, StartupType};
    use crate::platform::{
        DelayedStartMap, DriverDetailSource, DriverDetails, RawAppxPackage, RawDevice,
        RawService, RawUninstallEntry, RawWingetEntry,
    };
    use crossbeam_channel::Receiver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSddl(AtomicUsize);

    impl SecurityDescriptorSource for CountingSddl {
        fn service_descriptor(&self, service: &str) -> Result<String> {
            self.0.fetch_add(1, Ordering::Relaxed);
            if service == "Weak" {
                Ok("D:(A;;CCLCSWRPWPDTLOCRRC;;;SY)(A;;RPWPDC;;;AU)".into())
            } else {
                Ok("D:(A;;CCLCSWRPWPDTLOCRRC;;;SY)(A;;CCLCSWLOCRRC;;;IU)".into())
            }
        }
    }

    struct NoAcl;

    impl FileAclSource for NoAcl {
        fn file_acl(&self, _path: &Path) -> Result<Vec<RawAce>> {
            Err(Error::query("acl", "denied"))
        }
    }

    struct Details;

    impl DriverDetailSource for Details {
        fn driver_details(&self, instance_id: &str) -> Result<DriverDetails> {
            if instance_id.starts_with("ROOT") {
                return Err(Error::query("driver details", "no driver"));
            }
            Ok(DriverDetails {
                version: "10.0.1".into(),
                provider: "Contoso".into(),
                date: "2024-01-02".into(),
                inf_path: "oem1.inf".into(),
            })
        }
    }

    struct Fake {
        sddl: Arc<CountingSddl>,
        gate: Option<Receiver<()>>,
    }

    impl Fake {
        fn new() -> Self {
            Self {
                sddl: Arc::new(CountingSddl(AtomicUsize::new(0))),
                gate: None,
            }
        }
    }

    fn service(name: &str, display: &str) -> RawService {
        RawService {
            name: name.into(),
            display_name: display.into(),
            state: "Running".into(),
            start_mode: "Auto".into(),
            start_name: "LocalSystem".into(),
            path_name: format!(r"C:\no\such\{name}.exe"),
            delayed_auto_start: None,
        }
    }

    impl InventorySources for Fake {
        fn uninstall_entries(&self) -> Result<Vec<RawUninstallEntry>> {
            Ok(vec![
                RawUninstallEntry {
                    key_name: "{B}".into(),
                    display_name: "beta tool".into(),
                    display_version: "2.0".into(),
                    ..Default::default()
                },
                RawUninstallEntry {
                    key_name: "{A}".into(),
                    display_name: "Alpha".into(),
                    display_version: "1.0".into(),
                    ..Default::default()
                },
                RawUninstallEntry {
                    key_name: "KB123".into(),
                    ..Default::default()
                },
                RawUninstallEntry {
                    key_name: "{T}".into(),
                    display_name: "Telemetry Helper".into(),
                    ..Default::default()
                },
            ])
        }

        fn appx_packages(&self) -> Result<Vec<RawAppxPackage>> {
            Err(Error::query("Get-AppxPackage", "access denied"))
        }

        fn winget_entries(&self) -> Result<Vec<RawWingetEntry>> {
            Ok(vec![RawWingetEntry {
                name: "Gamma".into(),
                id: "Contoso.Gamma".into(),
                version: "3.0".into(),
                ..Default::default()
            }])
        }

        fn devices(&self, _include_non_present: bool) -> Result<Vec<RawDevice>> {
            Ok(vec![
                RawDevice {
                    friendly_name: "Network Adapter".into(),
                    class: "Net".into(),
                    status: "OK".into(),
                    present: true,
                    instance_id: "PCI\\VEN_1".into(),
                },
                RawDevice {
                    friendly_name: "Virtual Bus".into(),
                    class: "System".into(),
                    status: "OK".into(),
                    present: true,
                    instance_id: "ROOT\\VBUS\\0000".into(),
                },
            ])
        }

        fn services(&self) -> Result<Vec<RawService>> {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            Ok(vec![service("Weak", "Zeta Agent"), service("Spooler", "Print Spooler")])
        }

        fn delayed_start(&self) -> Result<DelayedStartMap> {
            Ok(vec![("spooler".to_string(), true)].into_iter().collect())
        }

        fn driver_details(&self) -> Arc<dyn DriverDetailSource> {
            Arc::new(Details)
        }

        fn descriptors(&self) -> Arc<dyn SecurityDescriptorSource> {
            self.sddl.clone()
        }

        fn file_acls(&self) -> Arc<dyn FileAclSource> {
            Arc::new(NoAcl)
        }
    }

    fn session_with(fake: Fake, config: Config) -> InventorySession {
        InventorySession::new(config, Arc::new(fake))
    }

    #[test]
    fn software_refresh_gathers_filters_and_sorts() {
        let mut config = Config::default();
        config.exclusions.software.push("telemetry".into());
        config.custom_names.set("Registry::{B}", "Aardvark Beta");
        let mut session = session_with(Fake::new(), config);

        session.refresh(Domain::Software).unwrap();
        let mut events = Vec::new();
        session
            .wait_for(Domain::Software, |e| events.push(e.clone()))
            .unwrap();

        let names: Vec<&str> = session.software().iter().map(|s| s.display_name()).collect();
        assert_eq!(names, vec!["Aardvark Beta", "Alpha", "Gamma"]);
        assert_eq!(session.software()[2].source, SoftwareSource::Winget);
        assert_eq!(session.phase(Domain::Software), &ScanPhase::Complete);
        assert!(!session.is_refreshing(Domain::Software));
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Finished { count: 3, .. })
        ));
    }

    #[test]
    fn driver_refresh_keeps_devices_without_details() {
        let mut session = session_with(Fake::new(), Config::default());
        session.refresh(Domain::Drivers).unwrap();
        let mut failed = Vec::new();
        session
            .wait_for(Domain::Drivers, |e| {
                if let SessionEvent::ItemFailed { item, .. } = e {
                    failed.push(item.clone());
                }
            })
            .unwrap();

        assert_eq!(session.drivers().len(), 2);
        assert_eq!(failed.len(), 1);
        let adapter = &session.drivers()[0];
        assert_eq!(adapter.friendly_name, "Network Adapter");
        assert_eq!(adapter.driver_version, "10.0.1");
        assert!(session.drivers()[1].driver_version.is_empty());
    }

    #[test]
    fn concurrent_refresh_is_refused() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let fake = Fake {
            gate: Some(gate_rx),
            ..Fake::new()
        };
        let mut session = session_with(fake, Config::default());

        session.refresh(Domain::Services).unwrap();
        assert!(session.phase(Domain::Services).is_running());
        assert!(matches!(
            session.refresh(Domain::Services),
            Err(Error::RefreshInProgress(Domain::Services))
        ));
        // Other domains are independent.
        session.refresh(Domain::Drivers).unwrap();

        drop(gate_tx);
        session.wait_for(Domain::Services, |_| {}).unwrap();
        session.wait_for(Domain::Drivers, |_| {}).unwrap();
        assert!(session.refresh(Domain::Services).is_ok());
        session.wait_for(Domain::Services, |_| {}).unwrap();
    }

    #[test]
    fn services_refresh_resolves_startup_and_risk() {
        let mut session = session_with(Fake::new(), Config::default());
        session.refresh(Domain::Services).unwrap();
        session.wait_for(Domain::Services, |_| {}).unwrap();

        let services = session.services();
        assert_eq!(services[0].name, "Spooler");
        assert_eq!(services[0].startup_type, StartupType::AutomaticDelayed);
        assert_eq!(services[0].service_control_risk, ServiceControlRisk::Ok);
        assert_eq!(services[1].name, "Weak");
        assert_eq!(services[1].startup_type, StartupType::Automatic);
        assert_eq!(services[1].service_control_risk, ServiceControlRisk::Weak);
    }

    #[test]
    fn acl_detail_is_cached_until_refresh() {
        let fake = Fake::new();
        let sddl = fake.sddl.clone();
        let mut session = session_with(fake, Config::default());

        // Not loaded yet: falls back to the service list.
        let detail = session.service_acl_detail("weak").unwrap();
        assert_eq!(detail.service, "Weak");
        assert!(detail.control.is_risky());
        assert_eq!(detail.exe.summary, "Not found");
        let calls = sddl.0.load(Ordering::Relaxed);

        session.service_acl_detail("WEAK").unwrap();
        assert_eq!(sddl.0.load(Ordering::Relaxed), calls);

        session.refresh(Domain::Services).unwrap();
        session.wait_for(Domain::Services, |_| {}).unwrap();
        let after_refresh = sddl.0.load(Ordering::Relaxed);
        session.service_acl_detail("Weak").unwrap();
        assert_eq!(sddl.0.load(Ordering::Relaxed), after_refresh + 1);

        assert!(session.service_acl_detail("Missing").is_err());
    }

    #[test]
    fn compare_drivers_against_exported_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivers.csv");
        let mut session = session_with(Fake::new(), Config::default());
        session.refresh(Domain::Drivers).unwrap();
        session.wait_for(Domain::Drivers, |_| {}).unwrap();

        session.export(Domain::Drivers, &path, ReportFormat::Csv).unwrap();
        let diff = session.compare(Domain::Drivers, &path).unwrap();
        assert_eq!(diff.len(), 2);
        assert!(diff.iter().all(|d| d.change_type == ChangeType::Unchanged));

        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            session.compare(Domain::Drivers, &path),
            Err(Error::BaselineParse(_))
        ));
    }

    #[test]
    fn custom_name_resorts() {
        let mut session = session_with(Fake::new(), Config::default());
        session.refresh(Domain::Software).unwrap();
        session.wait_for(Domain::Software, |_| {}).unwrap();
        assert_eq!(session.software()[0].name, "Alpha");

        session.set_custom_name("Winget::Contoso.Gamma", "Aaa Gamma");
        assert_eq!(session.software()[0].display_name(), "Aaa Gamma");
        assert_eq!(session.config().custom_names.len(), 1);
    }
}
