//! # Design
//!
//! - Centralize application-level errors for bootstrap and orchestration.
//! - Keep error messages constant while carrying context fields for
//!   debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: voxrelay_config::ConfigError,
    },
    /// The configured watch directory does not exist.
    #[error("watch directory does not exist")]
    WatchDirMissing {
        /// Configured directory.
        path: PathBuf,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: anyhow::Error,
    },
    /// Pipeline collaborators could not be assembled.
    #[error("pipeline setup failed")]
    Pipeline {
        /// Operation identifier.
        operation: &'static str,
        /// Source pipeline error.
        source: voxrelay_pipeline::PipelineError,
    },
    /// Watch operations failed.
    #[error("watch operation failed")]
    Watch {
        /// Operation identifier.
        operation: &'static str,
        /// Source watch error.
        source: voxrelay_watch::WatchError,
    },
    /// A spawned application task failed to join.
    #[error("application task failed")]
    Task {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
    /// Filesystem operations failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The shutdown signal listener failed.
    #[error("failed to listen for shutdown signal")]
    Shutdown {
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    /// Wrap a configuration error with operation context.
    #[must_use]
    pub const fn config(operation: &'static str, source: voxrelay_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    /// Wrap a telemetry error with operation context.
    #[must_use]
    pub const fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }

    /// Wrap a pipeline error with operation context.
    #[must_use]
    pub const fn pipeline(
        operation: &'static str,
        source: voxrelay_pipeline::PipelineError,
    ) -> Self {
        Self::Pipeline { operation, source }
    }

    /// Wrap a watch error with operation context.
    #[must_use]
    pub const fn watch(operation: &'static str, source: voxrelay_watch::WatchError) -> Self {
        Self::Watch { operation, source }
    }
}
