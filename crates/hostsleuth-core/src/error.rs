/// Error types for the HostSleuth core.
///
/// Only operation-level failures (baseline import, configuration, long-running
/// actions) are meant to reach the user. Per-item and per-source failures are
/// converted into sentinel values close to where they happen.
use crate::model::Domain;

/// Convenience alias used across the core crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The baseline file is empty, malformed, or lacks the key column.
    #[error("baseline could not be parsed: {0}")]
    BaselineParse(String),

    #[error("failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("invalid configuration value for {field}: {message}")]
    ConfigInvalid { field: String, message: String },

    /// An external query (descriptor read, ACL read, inventory query) failed.
    #[error("{what} failed: {message}")]
    QueryFailed { what: String, message: String },

    #[error("{what} did not finish within {secs} s")]
    QueryTimeout { what: String, secs: u64 },

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("a {0} refresh is already running")]
    RefreshInProgress(Domain),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl Error {
    /// Shorthand for [`Error::QueryFailed`].
    pub fn query(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryFailed {
            what: what.into(),
            message: message.into(),
        }
    }
}
