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

//! Core event bus for the Voxrelay daemon.
//!
//! The bus provides a typed event enum, sequential identifiers, and support
//! for replaying recent events to late subscribers (e.g. a diagnostics
//! consumer attached after startup). Internally it uses `tokio::broadcast`
//! with a bounded buffer; when the channel overflows, the oldest events are
//! dropped, matching the desired backpressure behaviour.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};

/// Identifier assigned to each event emitted by the daemon.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// The filesystem change kind that triggered a detection.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The file was newly created under the watch root.
    Created,
    /// An existing file was written to.
    Modified,
}

/// Why a detected file was dropped before processing.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The identity already has a completed pipeline run.
    AlreadyCompleted,
    /// The identity is currently claimed by an in-flight worker.
    InProgress,
    /// The file could not be stat'ed (removed or unreadable).
    StatFailed,
}

/// Typed domain events surfaced across the daemon.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The watch source attached to the configured root.
    WatchStarted {
        /// Watched directory.
        path: String,
        /// Whether subdirectories are watched too.
        recursive: bool,
    },
    /// The watch source detached during shutdown.
    WatchStopped {},
    /// A qualifying video file event passed the extension filter.
    FileDetected {
        /// Path of the detected file.
        path: String,
        /// Create or modify.
        kind: ChangeKind,
    },
    /// A detected file was dropped without processing.
    FileSkipped {
        /// Path of the skipped file.
        path: String,
        /// Why it was skipped.
        reason: SkipReason,
    },
    /// The stability prober decided the file finished being written.
    FileStable {
        /// Path of the stable file.
        path: String,
        /// Final observed size.
        size_bytes: u64,
    },
    /// The stability prober gave up (timeout or file removed mid-probe).
    ProbeAbandoned {
        /// Path of the abandoned file.
        path: String,
    },
    /// The processing pipeline started for a claimed file.
    PipelineStarted {
        /// Path being processed.
        path: String,
    },
    /// A pipeline step began executing.
    PipelineStep {
        /// Path being processed.
        path: String,
        /// Step label (extract, transcribe, deliver, cleanup).
        step: String,
    },
    /// The pipeline finished and the identity was recorded as completed.
    PipelineCompleted {
        /// Path that completed.
        path: String,
    },
    /// The pipeline aborted at some step.
    PipelineFailed {
        /// Path that failed.
        path: String,
        /// Failure description.
        message: String,
    },
    /// Webhook delivery failed (non-fatal to the pipeline).
    DeliveryFailed {
        /// Path whose transcript failed to deliver.
        path: String,
        /// Failure description.
        message: String,
    },
    /// The completed ledger evicted its oldest entries.
    LedgerEvicted {
        /// Number of entries removed.
        removed: usize,
    },
    /// Component health transitioned.
    HealthChanged {
        /// Currently degraded component names; empty means recovered.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator for log and metrics consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WatchStarted { .. } => "watch_started",
            Self::WatchStopped {} => "watch_stopped",
            Self::FileDetected { .. } => "file_detected",
            Self::FileSkipped { .. } => "file_skipped",
            Self::FileStable { .. } => "file_stable",
            Self::ProbeAbandoned { .. } => "probe_abandoned",
            Self::PipelineStarted { .. } => "pipeline_started",
            Self::PipelineStep { .. } => "pipeline_step",
            Self::PipelineCompleted { .. } => "pipeline_completed",
            Self::PipelineFailed { .. } => "pipeline_failed",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::LedgerEvicted { .. } => "ledger_evicted",
            Self::HealthChanged { .. } => "health_changed",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned at publish time.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// The published event.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
    replay_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("replay_capacity", &self.replay_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel uses the same capacity as the in-memory replay
    /// buffer, ensuring dropped events impact both structures consistently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(std::sync::atomic::AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event to the bus, assigning it a sequential identifier.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use = "callers may ignore the id explicitly with `let _ =`"]
    pub fn publish(&self, event: Event) -> EventId {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer.lock().expect("event buffer mutex poisoned");
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.buffer.lock().expect("event buffer mutex poisoned");
            for item in buffer.iter() {
                if item.id > since {
                    backlog.push_back(item.clone());
                }
            }
        }

        let receiver = self.sender.subscribe();
        EventStream { backlog, receiver }
    }

    /// Returns the last assigned identifier, if any events have been published.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.buffer.lock().expect("event buffer mutex poisoned");
        buffer.back().map(|event| event.id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events either from the replay backlog or from
/// the live broadcast channel.
#[derive(Debug)]
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => self.receiver.recv().await.ok(),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::task;
    use tokio::time::timeout;

    const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

    fn sample_step_event(id: usize) -> Event {
        Event::PipelineStep {
            path: format!("/library/video-{id}.mp4"),
            step: "extract".to_string(),
        }
    }

    #[test]
    fn event_kinds_are_stable() {
        let event = Event::FileSkipped {
            path: "/library/a.mp4".to_string(),
            reason: SkipReason::InProgress,
        };
        assert_eq!(event.kind(), "file_skipped");

        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["type"], "file_skipped");
        assert_eq!(json["reason"], "in_progress");
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for i in 0..5 {
            last_id = bus.publish(sample_step_event(i));
        }
        assert_eq!(last_id, 5);
        assert_eq!(bus.last_event_id(), Some(5));

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event);
            }
        }

        assert_eq!(received.len(), 3);
        assert_eq!(received.first().unwrap().id, 3);
        assert_eq!(received.last().unwrap().id, 5);
    }

    #[tokio::test]
    async fn load_test_does_not_stall_publishers() {
        let bus = Arc::new(EventBus::with_capacity(512));
        let mut stream = bus.subscribe(None);

        let publisher = {
            let bus = bus.clone();
            task::spawn(async move {
                for i in 0..500 {
                    let publish_bus = bus.clone();
                    timeout(PUBLISH_TIMEOUT, async move {
                        let _ = publish_bus.publish(sample_step_event(i));
                    })
                    .await
                    .expect("publish timed out");
                }
            })
        };

        let consumer = task::spawn(async move {
            let mut ids = HashSet::new();
            while ids.len() < 500 {
                if let Some(event) = stream.next().await {
                    ids.insert(event.id);
                }
            }
            ids
        });

        publisher.await.expect("publisher task panicked");
        let ids = consumer.await.expect("consumer task panicked");
        assert_eq!(ids.len(), 500);
    }
}
