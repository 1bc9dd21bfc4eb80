//! Default values for optional configuration fields.
//!
//! # Design
//! - Centralize fallbacks so serde defaults and `Default` impls agree.
//! - Keep time-based defaults explicit for auditability.

use std::path::PathBuf;

pub(crate) const fn recursive() -> bool {
    true
}

pub(crate) fn extensions() -> Vec<String> {
    [".mp4", ".mkv", ".avi", ".mov", ".flv", ".wmv"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

pub(crate) fn temp_audio_dir() -> PathBuf {
    PathBuf::from("temp_audio")
}

pub(crate) const fn max_wait_secs() -> u64 {
    300
}

pub(crate) const fn poll_interval_secs() -> u64 {
    5
}

pub(crate) const fn required_stable_checks() -> u32 {
    3
}

pub(crate) const fn ledger_capacity() -> usize {
    1_000
}

pub(crate) const fn request_timeout_secs() -> u64 {
    10
}

pub(crate) fn transcriber_command() -> String {
    "whisper-cli".to_string()
}

pub(crate) fn language() -> String {
    "zh".to_string()
}

pub(crate) const fn beam_size() -> u32 {
    5
}

pub(crate) const fn temperature() -> f32 {
    0.0
}

pub(crate) const fn no_speech_threshold() -> f32 {
    0.6
}

pub(crate) const fn condition_on_previous_text() -> bool {
    true
}

pub(crate) fn log_level() -> String {
    "info".to_string()
}

pub(crate) fn log_format() -> String {
    "auto".to_string()
}
