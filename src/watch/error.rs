//! Watch error types.

use std::path::PathBuf;

/// Errors that can occur while watching a log file.
#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    /// Log file does not exist (yet). Transient: callers defer or skip.
    #[error("Log file not found: {0}")]
    NotFound(PathBuf),

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
