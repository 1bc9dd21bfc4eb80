#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Voxrelay application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (configuration loading and service wiring),
//! `monitor.rs` (event journal and webhook health), `error.rs`
//! (application-level errors).

/// Application bootstrap and service wiring.
pub mod bootstrap;
/// Application-level error types.
pub mod error;

mod monitor;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
