/// Persistent settings, stored as pretty-printed JSON.
///
/// A missing file is replaced by the defaults. A file that exists but
/// cannot be read or parsed is an error; the caller decides whether that is
/// fatal.
use crate::error::{Error, Result};
use crate::model::Domain;
use crate::normalize::{invalid_patterns, CustomNames, ExclusionFilter, VisibilityFilter};
use crate::platform::DEFAULT_QUERY_TIMEOUT;
use crate::scanner::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const MAX_BATCH_SIZE: usize = 100;
pub const MAX_QUERY_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourceConfig,
    pub visibility: VisibilityFilter,
    pub exclusions: PerDomain<Vec<String>>,
    /// Columns to export; empty means all.
    pub columns: PerDomain<Vec<String>>,
    pub custom_names: CustomNames,
    pub batch_size: usize,
    pub query_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: SourceConfig::default(),
            visibility: VisibilityFilter::default(),
            exclusions: PerDomain::default(),
            columns: PerDomain::default(),
            custom_names: CustomNames::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT.as_secs(),
        }
    }
}

/// Which software inventories are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub registry: bool,
    pub appx: bool,
    pub winget: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            registry: true,
            appx: true,
            winget: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct PerDomain<T> {
    pub software: T,
    pub drivers: T,
    pub services: T,
}

impl<T> PerDomain<T> {
    pub fn get(&self, domain: Domain) -> &T {
        match domain {
            Domain::Software => &self.software,
            Domain::Drivers => &self.drivers,
            Domain::Services => &self.services,
        }
    }

    pub fn get_mut(&mut self, domain: Domain) -> &mut T {
        match domain {
            Domain::Software => &mut self.software,
            Domain::Drivers => &mut self.drivers,
            Domain::Services => &mut self.services,
        }
    }
}

impl Config {
    /// `<config dir>/HostSleuth/config.json`, or the working directory when
    /// the platform has no config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("HostSleuth")
            .join(CONFIG_FILE_NAME)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::ConfigLoad(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, writing the defaults there first if it does not exist.
    ///
    /// Failing to write the defaults only logs a warning.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let config = Self::load(path)?;
            info!("Loaded configuration from {}", path.display());
            return Ok(config);
        }
        let config = Self::default();
        match config.save(path) {
            Ok(()) => info!("Wrote default configuration to {}", path.display()),
            Err(e) => warn!("{e}"),
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let save_err = |e: &dyn std::fmt::Display| {
            Error::ConfigSave(format!("{}: {e}", path.display()))
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| save_err(&e))?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|e| save_err(&e))?;
        std::fs::write(path, text + "\n").map_err(|e| save_err(&e))
    }

    /// Reject values the scanner and normalizer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(Error::ConfigInvalid {
                field: "batch_size".into(),
                message: format!("must be between 1 and {MAX_BATCH_SIZE}"),
            });
        }
        if !(1..=MAX_QUERY_TIMEOUT_SECS).contains(&self.query_timeout_secs) {
            return Err(Error::ConfigInvalid {
                field: "query_timeout_secs".into(),
                message: format!("must be between 1 and {MAX_QUERY_TIMEOUT_SECS}"),
            });
        }
        for domain in Domain::ALL {
            if let Some((pattern, message)) =
                invalid_patterns(self.exclusions.get(domain).as_slice()).into_iter().next()
            {
                return Err(Error::ConfigInvalid {
                    field: format!("exclusions.{}", domain.label()),
                    message: format!("'{pattern}': {message}"),
                });
            }
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn exclusion_filter(&self, domain: Domain) -> ExclusionFilter {
        ExclusionFilter::new(self.exclusions.get(domain).as_slice())
    }

    pub fn columns(&self, domain: Domain) -> &[String] {
        self.columns.get(domain)
    }
}
