//! Error types for pipeline operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
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
    /// An external command binary could not be located.
    #[error("external command not found")]
    CommandMissing {
        /// Command name that was searched for.
        command: String,
        /// Source lookup error.
        source: which::Error,
    },
    /// An external command exited unsuccessfully.
    #[error("external command failed")]
    CommandFailed {
        /// Command name that was executed.
        command: String,
        /// Exit code when the process was not killed by a signal.
        status: Option<i32>,
        /// Captured standard error output.
        stderr: String,
    },
    /// The transcriber's JSON output could not be parsed.
    #[error("failed to parse transcriber output")]
    OutputParse {
        /// Path of the unparseable document.
        path: PathBuf,
        /// Source deserialization error.
        source: serde_json::Error,
    },
    /// The extracted audio artifact was missing or empty.
    #[error("audio artifact was empty")]
    EmptyArtifact {
        /// Path of the empty artifact.
        path: PathBuf,
    },
    /// The webhook request could not be performed.
    #[error("webhook request failed")]
    Delivery {
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// The webhook answered but refused the message.
    #[error("webhook rejected the message: {detail}")]
    DeliveryRejected {
        /// Status or acknowledgement detail reported by the endpoint.
        detail: String,
    },
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;
