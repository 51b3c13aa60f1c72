/// Analysis progress reporting: messages sent from the analysis thread to
/// the controlling thread via a crossbeam channel, and the phase each
/// domain's refresh is in.
use crate::model::Domain;
use std::fmt;
use std::time::Duration;

/// Lifecycle of one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    /// Nothing running; the refresh trigger is enabled.
    Idle,
    /// The primary enumeration query is in flight.
    Enumerating,
    /// Per-item analysis; `processed` of `total` items are done.
    Analyzing { processed: usize, total: usize },
    /// All items processed; results are available.
    Complete,
    /// The refresh stopped before completion.
    Failed(String),
}

impl ScanPhase {
    /// `true` while a refresh holds the domain.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Enumerating | Self::Analyzing { .. })
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Enumerating => f.write_str("enumerating"),
            Self::Analyzing { processed, total } => write!(f, "analyzing {processed}/{total}"),
            Self::Complete => f.write_str("complete"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Progress updates from a running refresh.
///
/// The final results travel in [`AnalysisProgress::Complete`]; everything
/// before it carries only counters and status text.
#[derive(Debug)]
pub enum AnalysisProgress<T> {
    /// Enumeration finished; `total` items will be analysed.
    Started { domain: Domain, total: usize },
    /// One batch finished.
    Batch {
        processed: usize,
        total: usize,
        message: String,
    },
    /// A single item's secondary query failed; a placeholder was recorded.
    ItemFailed { item: String, message: String },
    /// All batches finished. `results` is in enumeration order.
    Complete {
        results: Vec<T>,
        duration: Duration,
        failed_items: usize,
    },
    /// The refresh could not run at all.
    Failed { message: String },
    /// Cancelled between batches. Partial results are discarded.
    Cancelled,
}
