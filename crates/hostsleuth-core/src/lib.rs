/// HostSleuth Core: inventory, security analysis, and snapshot diffing.
///
/// This crate contains all business logic with zero UI dependencies.
/// It is designed to be reusable across different frontends (CLI, GUI).
///
/// # Modules
///
/// - [`model`]: Canonical entities and the generic `Record` shape.
/// - [`platform`]: Windows data sources: registry, packages, devices, services, ACLs.
/// - [`analysis`]: Service-control and executable ACL risk analysis.
/// - [`scanner`]: Batched background analysis with progress reporting.
/// - [`normalize`]: Mapping, de-duplication, exclusion, naming, and sorting.
/// - [`diff`]: Keyed snapshot comparison.
/// - [`report`]: CSV, JSON and HTML export; baseline import.
/// - [`actions`]: Driver backup/install and service control.
/// - [`session`]: Collections and in-flight refreshes for a front end.
/// - [`config`]: Persistent settings.
pub mod actions;
pub mod analysis;
pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod normalize;
pub mod platform;
pub mod report;
pub mod scanner;
pub mod session;

pub use error::{Error, Result};
