//! Validation helpers for loaded configuration documents.

use crate::error::{ConfigError, ConfigResult};
use crate::model::Settings;

fn invalid(section: &str, field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        section: section.to_string(),
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Check value-level constraints on a deserialized [`Settings`] document.
///
/// Filesystem-dependent checks (watch directory existence, temp directory
/// creation) are deferred to application bootstrap.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] encountered.
pub fn validate(settings: &Settings) -> ConfigResult<()> {
    if settings.watch_dir.as_os_str().is_empty() {
        return Err(invalid("root", "watch_dir", "must not be empty"));
    }
    if settings.extensions.is_empty() {
        return Err(invalid("root", "extensions", "must list at least one extension"));
    }
    for ext in &settings.extensions {
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(invalid(
                "root",
                "extensions",
                "entries must start with a dot followed by a suffix",
            ));
        }
    }
    if settings.ledger_capacity == 0 {
        return Err(invalid("root", "ledger_capacity", "must be positive"));
    }
    if settings.stability.poll_interval_secs == 0 {
        return Err(invalid("stability", "poll_interval_secs", "must be positive"));
    }
    if settings.stability.max_wait_secs < settings.stability.poll_interval_secs {
        return Err(invalid(
            "stability",
            "max_wait_secs",
            "must be at least the poll interval",
        ));
    }
    if settings.stability.required_stable_checks == 0 {
        return Err(invalid(
            "stability",
            "required_stable_checks",
            "must be positive",
        ));
    }
    if !settings.webhook.url.starts_with("http://") && !settings.webhook.url.starts_with("https://")
    {
        return Err(invalid("webhook", "url", "must be an absolute HTTP(S) URL"));
    }
    if settings.webhook.request_timeout_secs == 0 {
        return Err(invalid("webhook", "request_timeout_secs", "must be positive"));
    }
    if settings.transcriber.command.is_empty() {
        return Err(invalid("transcriber", "command", "must not be empty"));
    }
    if settings.transcriber.model.as_os_str().is_empty() {
        return Err(invalid("transcriber", "model", "must not be empty"));
    }
    if settings.transcriber.beam_size == 0 {
        return Err(invalid("transcriber", "beam_size", "must be positive"));
    }
    if !(0.0..=1.0).contains(&settings.transcriber.no_speech_threshold) {
        return Err(invalid(
            "transcriber",
            "no_speech_threshold",
            "must be between 0.0 and 1.0",
        ));
    }
    if settings.transcriber.temperature < 0.0 {
        return Err(invalid("transcriber", "temperature", "must not be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_settings;
    use std::path::Path;

    fn minimal_document() -> serde_json::Value {
        serde_json::json!({
            "watch_dir": "/videos",
            "webhook": { "url": "https://hooks.example.com/send" },
            "transcriber": { "model": "/models/ggml-base.bin" }
        })
    }

    fn settings_from(value: serde_json::Value) -> Settings {
        parse_settings(&value.to_string(), Path::new("test.json"))
            .expect("document should deserialize")
    }

    #[test]
    fn minimal_document_passes_validation() {
        let settings = settings_from(minimal_document());
        validate(&settings).expect("minimal document should validate");
        assert!(settings.recursive);
        assert_eq!(settings.ledger_capacity, 1_000);
        assert_eq!(settings.stability.required_stable_checks, 3);
        assert!(settings.extension_set().contains(".mp4"));
    }

    #[test]
    fn rejects_zero_ledger_capacity() {
        let mut value = minimal_document();
        value["ledger_capacity"] = serde_json::json!(0);
        let err = validate(&settings_from(value)).unwrap_err();
        assert!(err.to_string().contains("ledger_capacity"));
    }

    #[test]
    fn rejects_extension_without_dot() {
        let mut value = minimal_document();
        value["extensions"] = serde_json::json!(["mp4"]);
        let err = validate(&settings_from(value)).unwrap_err();
        assert!(err.to_string().contains("extensions"));
    }

    #[test]
    fn rejects_non_http_webhook_url() {
        let mut value = minimal_document();
        value["webhook"]["url"] = serde_json::json!("ftp://example.com");
        let err = validate(&settings_from(value)).unwrap_err();
        assert!(err.to_string().contains("webhook"));
    }

    #[test]
    fn rejects_poll_interval_above_budget() {
        let mut value = minimal_document();
        value["stability"] = serde_json::json!({
            "max_wait_secs": 2,
            "poll_interval_secs": 5
        });
        let err = validate(&settings_from(value)).unwrap_err();
        assert!(err.to_string().contains("max_wait_secs"));
    }
}
