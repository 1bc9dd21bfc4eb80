//! Read-once loading of the JSON configuration document.
//!
//! # Design
//! - The document is read a single time at startup; there is no reload path.
//! - Resolution order: explicit CLI path, `VOXRELAY_CONFIG`, then
//!   `./voxrelay.json`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::model::Settings;
use crate::validate;

/// Environment variable that points at the configuration document.
pub const CONFIG_ENV_VAR: &str = "VOXRELAY_CONFIG";

/// Fallback configuration file name in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "voxrelay.json";

/// Resolve the configuration path from an optional CLI argument, the
/// environment, or the default file name.
#[must_use]
pub fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load, deserialize, and validate the configuration document at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read,
/// [`ConfigError::Parse`] when it is not valid JSON, and
/// [`ConfigError::InvalidField`] when a field fails validation.
pub fn load_settings(path: &Path) -> ConfigResult<Settings> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read_config",
        path: path.to_path_buf(),
        source,
    })?;
    let settings = parse_settings(&raw, path)?;
    validate::validate(&settings)?;
    Ok(settings)
}

pub(crate) fn parse_settings(raw: &str, path: &Path) -> ConfigResult<Settings> {
    serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
