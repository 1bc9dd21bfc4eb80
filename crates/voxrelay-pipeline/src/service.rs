//! End-to-end processing of one stable video file.
//!
//! Steps short-circuit in order: re-check the ledger, extract audio,
//! transcribe, deliver, clean up. Delivery failure is demoted to a warning
//! (the transcript is gone either way, reprocessing would not help), and
//! cleanup always runs once an artifact exists.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};
use voxrelay_events::{Event, EventBus};
use voxrelay_telemetry::Metrics;
use voxrelay_watch::{DedupLedger, FileIdentity, VideoProcessor};

use crate::deliver::Notifier;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::AudioExtractor;
use crate::transcribe::Transcriber;
use crate::transcript::TranscriptBuilder;

/// Orchestrates extraction, transcription, delivery, and cleanup.
pub struct PipelineService {
    extractor: AudioExtractor,
    transcriber: Arc<dyn Transcriber>,
    notifier: Arc<dyn Notifier>,
    ledger: DedupLedger,
    events: EventBus,
    metrics: Metrics,
}

impl std::fmt::Debug for PipelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineService")
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

impl PipelineService {
    /// Assemble a pipeline from its injected collaborators.
    #[must_use]
    pub fn new(
        extractor: AudioExtractor,
        transcriber: Arc<dyn Transcriber>,
        notifier: Arc<dyn Notifier>,
        ledger: DedupLedger,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            extractor,
            transcriber,
            notifier,
            ledger,
            events,
            metrics,
        }
    }

    async fn run_for(&self, identity: &FileIdentity) -> PipelineResult<()> {
        let display_path = identity.path.display().to_string();

        // The identity claimed at event time predates write completion;
        // re-derive and re-check so a file finished by another event is not
        // processed twice.
        let fresh = FileIdentity::capture(&identity.path)
            .await
            .map_err(|source| PipelineError::Io {
                operation: "stat_video",
                path: identity.path.clone(),
                source,
            })?;
        if self.ledger.is_completed(&fresh) {
            info!(path = %display_path, "file already processed elsewhere; skipping");
            return Ok(());
        }

        let audio = self
            .step("extract", &display_path, self.extractor.extract(&identity.path))
            .await?;

        let result = self.transcribe_and_deliver(identity, &display_path, &audio).await;
        self.cleanup(&display_path, &audio).await;
        result
    }

    async fn transcribe_and_deliver(
        &self,
        identity: &FileIdentity,
        display_path: &str,
        audio: &Path,
    ) -> PipelineResult<()> {
        let segments = self
            .step("transcribe", display_path, self.transcriber.transcribe(audio))
            .await?;

        let mut builder = TranscriptBuilder::new();
        for segment in segments {
            builder.push_segment(&segment);
        }
        let transcript = builder.finish();

        let title = format!("New video transcribed: {}", identity.file_name());
        self.publish(Event::PipelineStep {
            path: display_path.to_string(),
            step: "deliver".to_string(),
        });
        match self.notifier.deliver(&title, &transcript).await {
            Ok(()) => self.metrics.inc_pipeline_step("deliver", "completed"),
            Err(err) => {
                // Non-fatal: the file was transcribed; a redelivery would
                // reprocess the whole video for the same transcript.
                self.metrics.inc_pipeline_step("deliver", "failed");
                self.metrics.inc_delivery_failed();
                warn!(path = %display_path, error = %err, "webhook delivery failed");
                self.publish(Event::DeliveryFailed {
                    path: display_path.to_string(),
                    message: err.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn cleanup(&self, display_path: &str, audio: &Path) {
        self.publish(Event::PipelineStep {
            path: display_path.to_string(),
            step: "cleanup".to_string(),
        });
        match tokio::fs::remove_file(audio).await {
            Ok(()) => self.metrics.inc_pipeline_step("cleanup", "completed"),
            Err(err) => {
                self.metrics.inc_pipeline_step("cleanup", "failed");
                warn!(path = %audio.display(), error = %err, "could not remove audio artifact");
            }
        }
    }

    async fn step<T, F>(&self, step: &str, display_path: &str, work: F) -> PipelineResult<T>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        self.publish(Event::PipelineStep {
            path: display_path.to_string(),
            step: step.to_string(),
        });
        match work.await {
            Ok(value) => {
                self.metrics.inc_pipeline_step(step, "completed");
                Ok(value)
            }
            Err(err) => {
                self.metrics.inc_pipeline_step(step, "failed");
                error!(path = %display_path, step, error = %err, "pipeline step failed");
                Err(err)
            }
        }
    }

    fn publish(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        let _ = self.events.publish(event);
    }
}

#[async_trait]
impl VideoProcessor for PipelineService {
    async fn process(&self, identity: &FileIdentity) -> anyhow::Result<()> {
        self.run_for(identity).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractorOptions;
    use crate::transcribe::{Segment, SegmentIter};
    use crate::transcript::NO_SPEECH_SENTINEL;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct StaticTranscriber {
        segments: Vec<Segment>,
    }

    #[async_trait]
    impl Transcriber for StaticTranscriber {
        async fn transcribe(&self, _audio: &Path) -> PipelineResult<SegmentIter> {
            Ok(SegmentIter::new(self.segments.clone()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, title: &str, body: &str) -> PipelineResult<()> {
            self.messages
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((title.to_string(), body.to_string()));
            if self.fail {
                return Err(PipelineError::DeliveryRejected {
                    detail: "http status 500".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        video: PathBuf,
        audio: PathBuf,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let video = dir.path().join("clip.mp4");
        tokio::fs::write(&video, b"video bytes")
            .await
            .expect("write video");
        let audio = dir.path().join("clip.wav");
        Fixture { dir, video, audio }
    }

    async fn fake_ffmpeg(fixture: &Fixture) -> PathBuf {
        let script = fixture.dir.path().join("fake-ffmpeg");
        tokio::fs::write(
            &script,
            format!("#!/bin/sh\nprintf 'RIFFdata' > '{}'\n", fixture.audio.display()),
        )
        .await
        .expect("write script");
        let mut perms = tokio::fs::metadata(&script)
            .await
            .expect("script metadata")
            .permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&script, perms)
            .await
            .expect("make script executable");
        script
    }

    fn service(
        fixture: &Fixture,
        ffmpeg: PathBuf,
        transcriber: Arc<dyn Transcriber>,
        notifier: Arc<RecordingNotifier>,
    ) -> (PipelineService, DedupLedger) {
        let ledger = DedupLedger::new(16);
        let extractor = AudioExtractor::resolve(&ExtractorOptions {
            command: Some(ffmpeg),
            temp_audio_dir: fixture.dir.path().to_path_buf(),
        })
        .expect("resolve extractor");
        let service = PipelineService::new(
            extractor,
            transcriber,
            notifier,
            ledger.clone(),
            EventBus::new(),
            Metrics::new().expect("metrics"),
        );
        (service, ledger)
    }

    #[tokio::test]
    async fn full_run_delivers_a_formatted_transcript_and_cleans_up() {
        let fixture = fixture().await;
        let ffmpeg = fake_ffmpeg(&fixture).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let transcriber = Arc::new(StaticTranscriber {
            segments: vec![Segment {
                start_secs: 0.0,
                end_secs: 3.5,
                text: " 大家好 ".to_string(),
            }],
        });
        let (service, _ledger) = service(&fixture, ffmpeg, transcriber, Arc::clone(&notifier));

        let identity = FileIdentity::capture(&fixture.video)
            .await
            .expect("capture identity");
        service.process(&identity).await.expect("pipeline run");

        let messages = notifier
            .messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "New video transcribed: clip.mp4");
        assert_eq!(messages[0].1, "[00:00 - 00:03] 大家好。");
        assert!(!fixture.audio.exists(), "audio artifact should be removed");
    }

    #[tokio::test]
    async fn silent_audio_delivers_the_sentinel() {
        let fixture = fixture().await;
        let ffmpeg = fake_ffmpeg(&fixture).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let transcriber = Arc::new(StaticTranscriber {
            segments: Vec::new(),
        });
        let (service, _ledger) = service(&fixture, ffmpeg, transcriber, Arc::clone(&notifier));

        let identity = FileIdentity::capture(&fixture.video)
            .await
            .expect("capture identity");
        service.process(&identity).await.expect("pipeline run");

        let messages = notifier
            .messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        assert_eq!(messages[0].1, NO_SPEECH_SENTINEL);
    }

    #[tokio::test]
    async fn delivery_failure_is_non_fatal_and_still_cleans_up() {
        let fixture = fixture().await;
        let ffmpeg = fake_ffmpeg(&fixture).await;
        let notifier = Arc::new(RecordingNotifier {
            messages: Mutex::new(Vec::new()),
            fail: true,
        });
        let transcriber = Arc::new(StaticTranscriber {
            segments: vec![Segment {
                start_secs: 0.0,
                end_secs: 1.0,
                text: "你好".to_string(),
            }],
        });
        let (service, _ledger) = service(&fixture, ffmpeg, transcriber, Arc::clone(&notifier));

        let identity = FileIdentity::capture(&fixture.video)
            .await
            .expect("capture identity");
        service
            .process(&identity)
            .await
            .expect("delivery failure must not fail the pipeline");
        assert!(!fixture.audio.exists(), "audio artifact should be removed");
    }

    #[tokio::test]
    async fn already_completed_identities_are_skipped() {
        let fixture = fixture().await;
        let ffmpeg = fake_ffmpeg(&fixture).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let transcriber = Arc::new(StaticTranscriber {
            segments: Vec::new(),
        });
        let (service, ledger) = service(&fixture, ffmpeg, transcriber, Arc::clone(&notifier));

        let identity = FileIdentity::capture(&fixture.video)
            .await
            .expect("capture identity");
        assert_eq!(ledger.record_completed(identity.clone()), 0);

        service.process(&identity).await.expect("pipeline run");
        assert!(
            notifier
                .messages
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .is_empty(),
            "completed identity must not be reprocessed"
        );
    }

    #[tokio::test]
    async fn vanished_file_aborts_the_pipeline() {
        let fixture = fixture().await;
        let ffmpeg = fake_ffmpeg(&fixture).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let transcriber = Arc::new(StaticTranscriber {
            segments: Vec::new(),
        });
        let (service, _ledger) = service(&fixture, ffmpeg, transcriber, notifier);

        let identity = FileIdentity::capture(&fixture.video)
            .await
            .expect("capture identity");
        tokio::fs::remove_file(&fixture.video)
            .await
            .expect("remove video");

        let err = service.process(&identity).await.unwrap_err();
        assert!(err.to_string().contains("filesystem operation failed"));
    }
}
