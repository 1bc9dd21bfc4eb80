//! Typed configuration models for the watch daemon.
//!
//! # Design
//! - Pure data carriers deserialized once at startup by `loader.rs`.
//! - Optional sections fall back to the defaults in `defaults.rs` via serde.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Root configuration document for a Voxrelay instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory watched for new video files.
    pub watch_dir: PathBuf,
    /// Whether subdirectories of `watch_dir` are watched as well.
    #[serde(default = "defaults::recursive")]
    pub recursive: bool,
    /// Case-insensitive file extensions (including the leading dot) that
    /// qualify as video files.
    #[serde(default = "defaults::extensions")]
    pub extensions: Vec<String>,
    /// Directory where intermediate audio artifacts are written.
    #[serde(default = "defaults::temp_audio_dir")]
    pub temp_audio_dir: PathBuf,
    /// Write-completion probing parameters.
    #[serde(default)]
    pub stability: StabilitySettings,
    /// Maximum number of completed identities retained for deduplication.
    #[serde(default = "defaults::ledger_capacity")]
    pub ledger_capacity: usize,
    /// Transcript delivery endpoint.
    pub webhook: WebhookSettings,
    /// Speech-recognition backend invocation parameters.
    pub transcriber: TranscriberSettings,
    /// Audio extraction backend overrides.
    #[serde(default)]
    pub extractor: ExtractorSettings,
    /// Logging output configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Lowercased extension set used for candidate filtering.
    #[must_use]
    pub fn extension_set(&self) -> HashSet<String> {
        self.extensions
            .iter()
            .map(|ext| ext.to_ascii_lowercase())
            .collect()
    }
}

/// Parameters governing the size-stability probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilitySettings {
    /// Upper bound on how long a single file is probed, in seconds.
    #[serde(default = "defaults::max_wait_secs")]
    pub max_wait_secs: u64,
    /// Delay between consecutive size observations, in seconds.
    #[serde(default = "defaults::poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Consecutive identical non-zero size readings required for stability.
    #[serde(default = "defaults::required_stable_checks")]
    pub required_stable_checks: u32,
}

impl StabilitySettings {
    /// Probe budget as a [`Duration`].
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            max_wait_secs: defaults::max_wait_secs(),
            poll_interval_secs: defaults::poll_interval_secs(),
            required_stable_checks: defaults::required_stable_checks(),
        }
    }
}

/// Transcript delivery endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// Absolute URL the transcript message is posted to.
    pub url: String,
    /// Per-request timeout for the delivery call, in seconds.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl WebhookSettings {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Speech-recognition backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberSettings {
    /// Executable name or path of the transcription CLI.
    #[serde(default = "defaults::transcriber_command")]
    pub command: String,
    /// Path to the speech model weights passed to the CLI.
    pub model: PathBuf,
    /// Language hint forwarded to the recognizer.
    #[serde(default = "defaults::language")]
    pub language: String,
    /// Beam search width.
    #[serde(default = "defaults::beam_size")]
    pub beam_size: u32,
    /// Sampling temperature.
    #[serde(default = "defaults::temperature")]
    pub temperature: f32,
    /// Probability threshold above which a segment counts as non-speech.
    #[serde(default = "defaults::no_speech_threshold")]
    pub no_speech_threshold: f32,
    /// Whether decoding conditions on previously emitted text.
    #[serde(default = "defaults::condition_on_previous_text")]
    pub condition_on_previous_text: bool,
}

/// Audio extraction backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractorSettings {
    /// Explicit path to the `ffmpeg` executable; resolved from `PATH`
    /// when absent.
    #[serde(default)]
    pub command: Option<PathBuf>,
}

/// Logging output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level string (e.g., `info`, `debug`).
    #[serde(default = "defaults::log_level")]
    pub level: String,
    /// Output format name (`json`, `pretty`, or `auto`).
    #[serde(default = "defaults::log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            format: defaults::log_format(),
        }
    }
}
