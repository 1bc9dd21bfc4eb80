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

//! Read-once JSON configuration for the Voxrelay watch daemon.
//!
//! Layout: `model.rs` (typed settings), `defaults.rs` (fallback values),
//! `loader.rs` (path resolution and deserialization), `validate.rs`
//! (value-level checks).

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

mod defaults;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, load_settings, resolve_config_path};
pub use model::{
    ExtractorSettings, LoggingSettings, Settings, StabilitySettings, TranscriberSettings,
    WebhookSettings,
};
