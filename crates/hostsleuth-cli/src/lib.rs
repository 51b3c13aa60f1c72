/// HostSleuth CLI: clap-based headless frontend.
///
/// This crate contains argument parsing and terminal output. Business logic
/// lives in `hostsleuth-core`.
pub mod app;
pub mod cli;

pub use app::run;
pub use cli::Cli;
