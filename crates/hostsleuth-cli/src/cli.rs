/// Command-line interface definition.
use clap::{Parser, Subcommand, ValueEnum};
use hostsleuth_core::model::Domain;
use hostsleuth_core::report::ReportFormat;
use std::path::{Path, PathBuf};

/// HostSleuth: software, driver and service inventory with ACL risk checks
/// and baseline comparison
#[derive(Parser, Debug)]
#[command(name = "HostSleuth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file [default: <config dir>/HostSleuth/config.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DomainArg {
    Software,
    Drivers,
    Services,
}

impl From<DomainArg> for Domain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Software => Domain::Software,
            DomainArg::Drivers => Domain::Drivers,
            DomainArg::Services => Domain::Services,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
    Html,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ReportFormat::Csv,
            FormatArg::Json => ReportFormat::Json,
            FormatArg::Html => ReportFormat::Html,
        }
    }
}

/// `--format` if given, else the export file's extension, else CSV.
pub fn resolve_format(format: Option<FormatArg>, path: &Path) -> ReportFormat {
    format
        .map(ReportFormat::from)
        .or_else(|| ReportFormat::from_path(path))
        .unwrap_or_default()
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inventory one domain and print it
    Scan {
        domain: DomainArg,

        /// Export the collection to this file
        #[arg(short, long, value_name = "PATH")]
        export: Option<PathBuf>,

        /// Export format (defaults to the file extension)
        #[arg(short, long)]
        format: Option<FormatArg>,

        /// Services only: list just the weak or risky ones
        #[arg(long)]
        risky_only: bool,
    },

    /// Inventory one domain and compare it against a baseline export
    Compare {
        domain: DomainArg,

        /// Previously exported CSV or JSON file
        #[arg(short, long, value_name = "PATH")]
        baseline: PathBuf,

        /// Export the comparison to this file
        #[arg(short, long, value_name = "PATH")]
        export: Option<PathBuf>,

        /// Export format (defaults to the file extension)
        #[arg(short, long)]
        format: Option<FormatArg>,

        /// Print only added, removed and changed rows
        #[arg(long)]
        changes_only: bool,
    },

    /// Show who can reconfigure a service and who can replace its binary
    ServiceAcl {
        /// Service key name
        name: String,
    },

    /// Show the write risk of an executable or command line
    ExeAcl {
        /// File path or ImagePath-style command line
        path: String,
    },

    /// Back up or install driver packages
    Drivers {
        #[command(subcommand)]
        action: DriverAction,
    },

    /// Start, stop or restart a service
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },

    /// Set or clear the display name for a software entry
    Rename {
        /// Identity key, e.g. `Registry::{GUID}` or `Winget::Vendor.App`
        key: String,

        /// New display name; omit to clear
        name: Option<String>,
    },

    /// Inspect or reset the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version, elevation and configuration details
    Info,
}

#[derive(Subcommand, Debug)]
pub enum DriverAction {
    /// Export all third-party driver packages into a folder
    Backup {
        #[arg(value_name = "DIR")]
        destination: PathBuf,
    },

    /// Install a driver from an .inf file
    Install { inf: PathBuf },

    /// Install every driver .inf found under a folder
    InstallFolder {
        #[arg(value_name = "DIR")]
        folder: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ServiceAction {
    Start { name: String },
    Stop { name: String },
    Restart { name: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Overwrite the configuration file with the defaults
    Reset,
}
