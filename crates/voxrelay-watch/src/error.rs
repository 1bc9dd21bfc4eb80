//! Error types for watch operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for watch operations.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Filesystem operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The watch backend reported a failure.
    #[error("watch backend operation failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Source backend error.
        source: notify::Error,
    },
}

/// Convenience alias for watch results.
pub type WatchResult<T> = Result<T, WatchError>;
