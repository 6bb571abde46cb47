//! Error types for the chaos-channel-core library.

use thiserror::Error;

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the resolver and liveness operations.
///
/// `run` style operations never fail with this type; they report failures as a
/// [`Response`](crate::domain::Response) envelope instead.
#[derive(Error, Debug)]
pub enum Error {
    /// A probing command ran but reported failure.
    #[error("{0}")]
    CommandFailed(String),

    /// A required OS utility is missing; `purpose` is what it was needed for.
    #[error("{tool} command not found, can't {purpose}")]
    ToolNotFound { tool: String, purpose: &'static str },

    /// Caller input rejected before anything ran.
    #[error("{0}")]
    InvalidArgument(String),

    /// A pid that does not parse as a process id.
    #[error("invalid pid `{pid}`: {source}")]
    InvalidPid {
        pid: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Resolving one port of a batch failed.
    #[error("failed to get pid by {port}, {source}")]
    PortLookup {
        port: String,
        #[source]
        source: Box<Error>,
    },

    /// No live process has this pid.
    #[error("process {0} not found")]
    ProcessNotFound(u32),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A blocking task was cancelled or panicked.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
