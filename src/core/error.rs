//! Run-level errors for the compression engine.
//!
//! Per-file failures never surface here; they are recorded as
//! [`Outcome`](super::Outcome)s and the run continues.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The run's root directory could not be listed. This is the only fatal
    /// condition of a run.
    #[error("Cannot read root directory {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Represents a path that was expected to be a directory but was not.
    #[error("Path is not a valid directory: {0}")]
    NotADirectory(PathBuf),

    /// Represents an I/O error outside of per-file compression, e.g. writing the log.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, PathBuf),

    /// The blocking run task panicked or was aborted.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Represents an error while compiling an exclusion glob.
    #[error("Invalid glob pattern: {0}")]
    GlobPattern(#[from] globset::Error),

    /// A second run was requested while one is still active.
    #[error("A compression run is already in progress")]
    RunInProgress,

    /// Represents a user-initiated cancellation of a run.
    #[error("Operation was cancelled by the user")]
    Cancelled,
}
