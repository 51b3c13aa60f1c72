/// Bundle of every data source a session needs.
///
/// [`SystemSources`] is the live implementation; tests substitute an
/// in-memory one.
use super::devices::{enumerate_devices, DriverDetailSource, PnpPropertySource, RawDevice};
use super::packages::{enumerate_appx, enumerate_winget, RawAppxPackage, RawWingetEntry};
use super::registry::{enumerate_uninstall_entries, RawUninstallEntry};
use super::security::{NativeFileAclSource, ScSdshowSource};
use super::services::{enumerate_services, query_delayed_start, DelayedStartMap, RawService};
use crate::analysis::{FileAclSource, SecurityDescriptorSource};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

pub trait InventorySources: Send + Sync {
    fn uninstall_entries(&self) -> Result<Vec<RawUninstallEntry>>;
    fn appx_packages(&self) -> Result<Vec<RawAppxPackage>>;
    fn winget_entries(&self) -> Result<Vec<RawWingetEntry>>;
    fn devices(&self, include_non_present: bool) -> Result<Vec<RawDevice>>;
    fn services(&self) -> Result<Vec<RawService>>;
    fn delayed_start(&self) -> Result<DelayedStartMap>;

    fn driver_details(&self) -> Arc<dyn DriverDetailSource>;
    fn descriptors(&self) -> Arc<dyn SecurityDescriptorSource>;
    fn file_acls(&self) -> Arc<dyn FileAclSource>;
}

/// Queries the local machine, each call bounded by `timeout`.
pub struct SystemSources {
    timeout: Duration,
}

impl SystemSources {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl InventorySources for SystemSources {
    fn uninstall_entries(&self) -> Result<Vec<RawUninstallEntry>> {
        enumerate_uninstall_entries(self.timeout)
    }

    fn appx_packages(&self) -> Result<Vec<RawAppxPackage>> {
        enumerate_appx(self.timeout)
    }

    fn winget_entries(&self) -> Result<Vec<RawWingetEntry>> {
        // winget resolves sources over the network on first use.
        enumerate_winget(self.timeout * 4)
    }

    fn devices(&self, include_non_present: bool) -> Result<Vec<RawDevice>> {
        enumerate_devices(include_non_present, self.timeout)
    }

    fn services(&self) -> Result<Vec<RawService>> {
        enumerate_services(self.timeout)
    }

    fn delayed_start(&self) -> Result<DelayedStartMap> {
        query_delayed_start(self.timeout)
    }

    fn driver_details(&self) -> Arc<dyn DriverDetailSource> {
        Arc::new(PnpPropertySource::new(self.timeout))
    }

    fn descriptors(&self) -> Arc<dyn SecurityDescriptorSource> {
        Arc::new(ScSdshowSource::new(self.timeout))
    }

    fn file_acls(&self) -> Arc<dyn FileAclSource> {
        Arc::new(NativeFileAclSource)
    }
}
