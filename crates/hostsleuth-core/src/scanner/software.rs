/// Software rows need no secondary query; batching only maps raw rows from
/// the three inventories into [`SoftwareItem`]s and reports progress.
use super::batch::ItemAnalyzer;
use crate::error::{Error, Result};
use crate::model::SoftwareItem;
use crate::normalize::{software_from_appx, software_from_uninstall, software_from_winget};
use crate::platform::{RawAppxPackage, RawUninstallEntry, RawWingetEntry};

/// A row from any of the software inventories.
#[derive(Debug, Clone)]
pub enum RawSoftware {
    Uninstall(RawUninstallEntry),
    Appx(RawAppxPackage),
    Winget(RawWingetEntry),
}

impl RawSoftware {
    fn to_item(&self) -> SoftwareItem {
        match self {
            Self::Uninstall(entry) => software_from_uninstall(entry),
            Self::Appx(pkg) => software_from_appx(pkg),
            Self::Winget(entry) => software_from_winget(entry),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareMapper;

impl ItemAnalyzer for SoftwareMapper {
    type Item = RawSoftware;
    type Output = SoftwareItem;

    fn label(&self, item: &RawSoftware) -> String {
        match item {
            RawSoftware::Uninstall(entry) => entry.display_name.clone(),
            RawSoftware::Appx(pkg) => pkg.name.clone(),
            RawSoftware::Winget(entry) => entry.name.clone(),
        }
    }

    fn analyze(&self, item: &RawSoftware) -> Result<SoftwareItem> {
        Ok(item.to_item())
    }

    fn placeholder(&self, item: &RawSoftware, _error: &Error) -> SoftwareItem {
        item.to_item()
    }
}
