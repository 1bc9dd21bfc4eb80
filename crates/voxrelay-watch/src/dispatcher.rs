//! Filesystem event dispatch.
//!
//! A `notify` watcher forwards raw create/modify events into an mpsc channel;
//! the dispatch loop filters candidates, claims their identity in the
//! [`DedupLedger`], and hands each claimed file to its own worker task. The
//! worker probes for write completion, invokes the processor, and records the
//! identity as completed on success. The claim guard releases on every other
//! exit path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use notify::{Event as RawEvent, EventKind, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use voxrelay_events::{ChangeKind, Event, EventBus, SkipReason};
use voxrelay_telemetry::Metrics;

use crate::error::{WatchError, WatchResult};
use crate::identity::FileIdentity;
use crate::ledger::{ClaimGuard, ClaimOutcome, DedupLedger};
use crate::prober::{ProbeOutcome, ProbeSettings, wait_for_stable};

/// Capacity of the channel between the watch backend and the dispatch loop.
const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Handler invoked for each file that passed stability probing.
#[async_trait]
pub trait VideoProcessor: Send + Sync {
    /// Run the full processing pipeline for one stable file.
    ///
    /// # Errors
    ///
    /// Returns an error when any mandatory pipeline step fails; the file's
    /// identity is then left unrecorded so a later event may retry it.
    async fn process(&self, identity: &FileIdentity) -> anyhow::Result<()>;
}

/// Static dispatch options derived from configuration.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory to watch.
    pub watch_dir: PathBuf,
    /// Whether subdirectories are watched too.
    pub recursive: bool,
    /// Lowercased qualifying extensions, each including the leading dot.
    pub extensions: HashSet<String>,
}

/// Watches one directory tree and drives per-file processing workers.
pub struct WatchService {
    options: WatchOptions,
    probe: ProbeSettings,
    ledger: DedupLedger,
    processor: Arc<dyn VideoProcessor>,
    events: EventBus,
    metrics: Metrics,
}

impl std::fmt::Debug for WatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchService")
            .field("options", &self.options)
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl WatchService {
    /// Assemble a watch service from its injected collaborators.
    #[must_use]
    pub fn new(
        options: WatchOptions,
        probe: ProbeSettings,
        ledger: DedupLedger,
        processor: Arc<dyn VideoProcessor>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            options,
            probe,
            ledger,
            processor,
            events,
            metrics,
        }
    }

    /// Attach the watch backend and dispatch events until `shutdown` flips
    /// or the backend channel closes.
    ///
    /// # Errors
    ///
    /// Returns an error when the watch backend cannot be created or attached
    /// to the configured directory.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WatchResult<()> {
        let (tx, mut rx) = mpsc::channel::<RawEvent>(EVENT_CHANNEL_CAPACITY);
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<RawEvent>| match result {
                Ok(event) => {
                    if tx.blocking_send(event).is_err() {
                        debug!("dispatch channel closed; dropping watch event");
                    }
                }
                Err(err) => warn!(error = %err, "watch backend reported an error"),
            })
            .map_err(|source| WatchError::Backend {
                operation: "create_watcher",
                source,
            })?;

        let mode = if self.options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&self.options.watch_dir, mode)
            .map_err(|source| WatchError::Backend {
                operation: "watch_path",
                source,
            })?;

        self.publish(Event::WatchStarted {
            path: self.options.watch_dir.display().to_string(),
            recursive: self.options.recursive,
        });
        info!(
            path = %self.options.watch_dir.display(),
            recursive = self.options.recursive,
            "watching for video files"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                maybe_event = rx.recv() => match maybe_event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
            }
        }

        drop(watcher);
        self.publish(Event::WatchStopped {});
        info!("watch stopped");
        Ok(())
    }

    async fn dispatch(&self, event: RawEvent) {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => return,
        };
        for path in event.paths {
            self.handle_candidate(path, kind).await;
        }
    }

    async fn handle_candidate(&self, path: PathBuf, kind: ChangeKind) {
        if !self.matches_extension(&path) {
            return;
        }
        self.publish(Event::FileDetected {
            path: path.display().to_string(),
            kind,
        });

        let identity = match FileIdentity::capture(&path).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not stat candidate; skipping");
                self.publish(Event::FileSkipped {
                    path: path.display().to_string(),
                    reason: SkipReason::StatFailed,
                });
                return;
            }
        };

        match self.ledger.try_claim(&identity) {
            ClaimOutcome::AlreadyCompleted => {
                debug!(path = %path.display(), "file already processed; skipping");
                self.publish(Event::FileSkipped {
                    path: path.display().to_string(),
                    reason: SkipReason::AlreadyCompleted,
                });
            }
            ClaimOutcome::InProgress => {
                debug!(path = %path.display(), "file already being processed; skipping duplicate event");
                self.publish(Event::FileSkipped {
                    path: path.display().to_string(),
                    reason: SkipReason::InProgress,
                });
            }
            ClaimOutcome::Claimed(guard) => {
                sync_ledger_gauges(&self.metrics, &self.ledger);
                self.spawn_worker(guard);
            }
        }
    }

    fn spawn_worker(&self, guard: ClaimGuard) {
        let probe = self.probe.clone();
        let ledger = self.ledger.clone();
        let processor = Arc::clone(&self.processor);
        let events = self.events.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            run_worker(guard, &probe, &ledger, processor, &events, &metrics).await;
            sync_ledger_gauges(&metrics, &ledger);
        });
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .is_some_and(|ext| self.options.extensions.contains(&ext))
    }

    fn publish(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        let _ = self.events.publish(event);
    }
}

async fn run_worker(
    guard: ClaimGuard,
    probe: &ProbeSettings,
    ledger: &DedupLedger,
    processor: Arc<dyn VideoProcessor>,
    events: &EventBus,
    metrics: &Metrics,
) {
    let path = guard.identity().path.clone();
    let display_path = path.display().to_string();
    let publish = |event: Event| {
        metrics.inc_event(event.kind());
        let _ = events.publish(event);
    };

    match wait_for_stable(&path, probe).await {
        ProbeOutcome::Stable { size } => {
            metrics.inc_probe("stable");
            info!(path = %display_path, size_bytes = size, "file finished writing");
            publish(Event::FileStable {
                path: display_path.clone(),
                size_bytes: size,
            });
        }
        ProbeOutcome::Missing => {
            metrics.inc_probe("missing");
            warn!(path = %display_path, "file disappeared while probing; abandoning");
            publish(Event::ProbeAbandoned {
                path: display_path.clone(),
            });
            return;
        }
        ProbeOutcome::TimedOut => {
            metrics.inc_probe("timeout");
            warn!(path = %display_path, "file never stabilized; abandoning");
            publish(Event::ProbeAbandoned {
                path: display_path.clone(),
            });
            return;
        }
    }

    publish(Event::PipelineStarted {
        path: display_path.clone(),
    });
    match processor.process(guard.identity()).await {
        Ok(()) => {
            metrics.inc_pipeline_completed();
            let mut evicted = 0;
            // The stable file carries a different size/mtime than the
            // identity claimed at event time; record both so later events
            // for the finished file are suppressed.
            if let Ok(fresh) = FileIdentity::capture(&path).await {
                evicted += ledger.record_completed(fresh);
            }
            evicted += guard.complete();
            if evicted > 0 {
                metrics.inc_ledger_evictions(u64::try_from(evicted).unwrap_or(u64::MAX));
                publish(Event::LedgerEvicted { removed: evicted });
            }
            info!(path = %display_path, "video processed and recorded");
            publish(Event::PipelineCompleted { path: display_path });
        }
        Err(err) => {
            metrics.inc_pipeline_failed();
            error!(path = %display_path, error = %err, "video processing failed");
            publish(Event::PipelineFailed {
                path: display_path,
                message: err.to_string(),
            });
        }
    }
}

fn sync_ledger_gauges(metrics: &Metrics, ledger: &DedupLedger) {
    let counts = ledger.counts();
    metrics.set_ledger_in_progress(i64::try_from(counts.in_progress).unwrap_or(i64::MAX));
    metrics.set_ledger_completed(i64::try_from(counts.completed).unwrap_or(i64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingProcessor {
        seen: Mutex<Vec<FileIdentity>>,
        fail: bool,
    }

    #[async_trait]
    impl VideoProcessor for RecordingProcessor {
        async fn process(&self, identity: &FileIdentity) -> anyhow::Result<()> {
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(identity.clone());
            if self.fail {
                anyhow::bail!("simulated pipeline failure");
            }
            Ok(())
        }
    }

    fn test_service(
        watch_dir: PathBuf,
        processor: Arc<RecordingProcessor>,
    ) -> (WatchService, DedupLedger) {
        let ledger = DedupLedger::new(16);
        let service = WatchService::new(
            WatchOptions {
                watch_dir,
                recursive: true,
                extensions: [".mp4".to_string()].into_iter().collect(),
            },
            ProbeSettings {
                max_wait: Duration::from_secs(2),
                poll_interval: Duration::from_millis(10),
                required_stable_checks: 2,
            },
            ledger.clone(),
            processor,
            EventBus::new(),
            Metrics::new().expect("metrics"),
        );
        (service, ledger)
    }

    /// Write under a non-qualifying name, then rename into place so the
    /// watcher sees a single event for a fully written file.
    async fn place_video(dir: &Path, name: &str) {
        let staging = dir.join("staging.partial");
        tokio::fs::write(&staging, b"video bytes")
            .await
            .expect("write staging file");
        tokio::fs::rename(&staging, dir.join(name))
            .await
            .expect("rename into place");
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..300 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn new_video_file_is_processed_exactly_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let processor = Arc::new(RecordingProcessor::default());
        let (service, ledger) = test_service(dir.path().to_path_buf(), Arc::clone(&processor));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = tokio::spawn(async move { service.run(shutdown_rx).await });

        // Give the backend a moment to attach before creating the file.
        tokio::time::sleep(Duration::from_millis(200)).await;
        place_video(dir.path(), "clip.mp4").await;

        assert!(
            wait_until(|| ledger.counts().completed > 0).await,
            "file was never recorded as completed"
        );
        assert!(
            wait_until(|| ledger.counts().in_progress == 0).await,
            "claim was never released"
        );
        assert_eq!(
            processor
                .seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
            1
        );

        shutdown_tx.send(true).expect("signal shutdown");
        run.await
            .expect("join watch task")
            .expect("watch task result");
    }

    #[tokio::test]
    async fn non_video_files_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let processor = Arc::new(RecordingProcessor::default());
        let (service, ledger) = test_service(dir.path().to_path_buf(), Arc::clone(&processor));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = tokio::spawn(async move { service.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::fs::write(dir.path().join("notes.txt"), b"not a video")
            .await
            .expect("write file");
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(ledger.counts().completed, 0);
        assert!(
            processor
                .seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .is_empty()
        );

        shutdown_tx.send(true).expect("signal shutdown");
        run.await
            .expect("join watch task")
            .expect("watch task result");
    }

    #[tokio::test]
    async fn failed_processing_leaves_identity_unrecorded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let processor = Arc::new(RecordingProcessor {
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        let (service, ledger) = test_service(dir.path().to_path_buf(), Arc::clone(&processor));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = tokio::spawn(async move { service.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        place_video(dir.path(), "clip.mp4").await;

        assert!(
            wait_until(|| {
                !processor
                    .seen
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .is_empty()
            })
            .await,
            "processor was never invoked"
        );
        assert!(
            wait_until(|| ledger.counts().in_progress == 0).await,
            "claim was never released"
        );
        assert_eq!(ledger.counts().completed, 0);

        shutdown_tx.send(true).expect("signal shutdown");
        run.await
            .expect("join watch task")
            .expect("watch task result");
    }
}
