/// Platform-specific functionality: inventory data sources, security
/// queries, and elevation checks.
///
/// Each source returns plain raw records; mapping into the canonical
/// entities happens in [`crate::normalize`]. Query output is parsed by pure
/// functions so the parsing is testable on any host.
pub mod command;
pub mod devices;
pub mod packages;
pub mod permissions;
pub mod registry;
pub mod security;
pub mod services;
pub mod sources;

pub use command::DEFAULT_QUERY_TIMEOUT;
pub use devices::{DriverDetailSource, DriverDetails, PnpPropertySource, RawDevice};
pub use packages::{RawAppxPackage, RawWingetEntry};
pub use permissions::is_elevated;
pub use registry::RawUninstallEntry;
pub use security::{NativeFileAclSource, ScSdshowSource};
pub use services::{DelayedStartMap, RawService};
pub use sources::{InventorySources, SystemSources};
