//! Application bootstrap wiring.
//!
//! Loads the configuration document once, installs logging, assembles the
//! ledger/pipeline/watch services, and runs until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use voxrelay_config::{Settings, load_settings, resolve_config_path};
use voxrelay_events::EventBus;
use voxrelay_pipeline::{
    AudioExtractor, ExtractorOptions, PipelineService, TranscriberOptions, WebhookNotifier,
    WebhookOptions, WhisperCommand,
};
use voxrelay_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use voxrelay_watch::{DedupLedger, ProbeSettings, WatchOptions, WatchService};

use crate::error::{AppError, AppResult};
use crate::monitor::spawn_event_monitor;

/// Load configuration, wire the services, and block until shutdown.
///
/// # Errors
///
/// Returns an error when configuration loading/validation fails, a pipeline
/// collaborator cannot be assembled, or the watch loop aborts.
pub async fn run_app() -> AppResult<()> {
    let config_path = resolve_config_path(std::env::args_os().nth(1).map(PathBuf::from));
    let settings =
        load_settings(&config_path).map_err(|err| AppError::config("load_settings", err))?;

    let logging = LoggingConfig {
        level: &settings.logging.level,
        format: LogFormat::from_name(&settings.logging.format),
        build_sha: option_env!("BUILD_SHA").unwrap_or("dev"),
    };
    init_logging(&logging).map_err(|err| AppError::telemetry("init_logging", err))?;
    info!(
        config = %config_path.display(),
        build_sha = build_sha(),
        "voxrelay starting"
    );

    if !settings.watch_dir.is_dir() {
        return Err(AppError::WatchDirMissing {
            path: settings.watch_dir.clone(),
        });
    }
    tokio::fs::create_dir_all(&settings.temp_audio_dir)
        .await
        .map_err(|source| AppError::Io {
            operation: "create_temp_audio_dir",
            path: settings.temp_audio_dir.clone(),
            source,
        })?;

    let events = EventBus::new();
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("metrics.new", err))?;
    let ledger = DedupLedger::new(settings.ledger_capacity);

    let extractor = AudioExtractor::resolve(&extractor_options(&settings))
        .map_err(|err| AppError::pipeline("extractor.resolve", err))?;
    let transcriber = WhisperCommand::resolve(transcriber_options(&settings))
        .map_err(|err| AppError::pipeline("transcriber.resolve", err))?;
    let notifier = WebhookNotifier::new(&webhook_options(&settings))
        .map_err(|err| AppError::pipeline("notifier.new", err))?;

    let pipeline = Arc::new(PipelineService::new(
        extractor,
        Arc::new(transcriber),
        Arc::new(notifier),
        ledger.clone(),
        events.clone(),
        metrics.clone(),
    ));
    let watcher = WatchService::new(
        watch_options(&settings),
        probe_settings(&settings),
        ledger,
        pipeline,
        events.clone(),
        metrics,
    );

    let monitor = spawn_event_monitor(events);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut watch_task = tokio::spawn(async move { watcher.run(shutdown_rx).await });

    let joined = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(source) = signal {
                monitor.abort();
                return Err(AppError::Shutdown { source });
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            (&mut watch_task).await
        }
        joined = &mut watch_task => joined,
    };
    monitor.abort();

    joined
        .map_err(|source| AppError::Task {
            operation: "watch.run",
            source,
        })?
        .map_err(|err| AppError::watch("watch.run", err))?;
    info!("voxrelay stopped");
    Ok(())
}

fn watch_options(settings: &Settings) -> WatchOptions {
    WatchOptions {
        watch_dir: settings.watch_dir.clone(),
        recursive: settings.recursive,
        extensions: settings.extension_set(),
    }
}

fn probe_settings(settings: &Settings) -> ProbeSettings {
    ProbeSettings {
        max_wait: settings.stability.max_wait(),
        poll_interval: settings.stability.poll_interval(),
        required_stable_checks: settings.stability.required_stable_checks,
    }
}

fn extractor_options(settings: &Settings) -> ExtractorOptions {
    ExtractorOptions {
        command: settings.extractor.command.clone(),
        temp_audio_dir: settings.temp_audio_dir.clone(),
    }
}

fn transcriber_options(settings: &Settings) -> TranscriberOptions {
    TranscriberOptions {
        command: settings.transcriber.command.clone(),
        model: settings.transcriber.model.clone(),
        language: settings.transcriber.language.clone(),
        beam_size: settings.transcriber.beam_size,
        temperature: settings.transcriber.temperature,
        no_speech_threshold: settings.transcriber.no_speech_threshold,
        condition_on_previous_text: settings.transcriber.condition_on_previous_text,
    }
}

fn webhook_options(settings: &Settings) -> WebhookOptions {
    WebhookOptions {
        url: settings.webhook.url.clone(),
        request_timeout: settings.webhook.request_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> Settings {
        serde_json::from_value(serde_json::json!({
            "watch_dir": "/videos",
            "extensions": [".mp4", ".MKV"],
            "webhook": { "url": "https://hooks.example.com/send" },
            "transcriber": { "model": "/models/ggml-base.bin" }
        }))
        .expect("settings document")
    }

    #[test]
    fn watch_options_lowercase_the_extension_set() {
        let options = watch_options(&settings());
        assert!(options.recursive);
        assert!(options.extensions.contains(".mp4"));
        assert!(options.extensions.contains(".mkv"));
    }

    #[test]
    fn probe_settings_carry_configured_durations() {
        let probe = probe_settings(&settings());
        assert_eq!(probe.max_wait, Duration::from_secs(300));
        assert_eq!(probe.poll_interval, Duration::from_secs(5));
        assert_eq!(probe.required_stable_checks, 3);
    }

    #[test]
    fn webhook_options_carry_the_default_timeout() {
        let webhook = webhook_options(&settings());
        assert_eq!(webhook.request_timeout, Duration::from_secs(10));
        assert_eq!(webhook.url, "https://hooks.example.com/send");
    }
}
