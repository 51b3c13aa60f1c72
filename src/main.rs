//! HostSleuth: software, driver and service inventory for Windows.
//!
//! Thin binary entry point. All logic lives in the `hostsleuth-core`
//! and `hostsleuth-cli` crates.

use clap::Parser;
use hostsleuth_cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Structured logging to stderr; stdout carries command output.
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("HostSleuth {} starting", env!("CARGO_PKG_VERSION"));

    hostsleuth_cli::run(cli)
}
