//! Bus consumer that journals domain events and tracks webhook health.
//!
//! Delivery failures are non-fatal to individual pipelines, so repeated ones
//! would otherwise only show up as scattered warnings. The monitor folds them
//! into a single health state and publishes `HealthChanged` transitions.

use std::collections::HashSet;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use voxrelay_events::{Event, EventBus};

/// Spawn the monitor task; aborted at shutdown.
pub(crate) fn spawn_event_monitor(events: EventBus) -> JoinHandle<()> {
    tokio::spawn(async move {
        monitor_loop(&events).await;
    })
}

async fn monitor_loop(events: &EventBus) {
    let mut stream = events.subscribe(None);
    let mut health = WebhookHealth::default();
    while let Some(envelope) = stream.next().await {
        debug!(id = envelope.id, kind = envelope.event.kind(), "domain event");
        if let Some(transition) = health.observe(&envelope.event) {
            let degraded = match transition {
                HealthTransition::Degraded => {
                    warn!("webhook delivery degraded");
                    vec!["webhook".to_string()]
                }
                HealthTransition::Recovered => {
                    info!("webhook delivery recovered");
                    Vec::new()
                }
            };
            let _ = events.publish(Event::HealthChanged { degraded });
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HealthTransition {
    Degraded,
    Recovered,
}

/// Folds per-pipeline delivery outcomes into one webhook health flag.
///
/// A pipeline that completes without a preceding delivery failure proves the
/// endpoint works again; one that completes after its delivery failed does
/// not.
#[derive(Debug, Default)]
pub(crate) struct WebhookHealth {
    degraded: bool,
    failed_paths: HashSet<String>,
}

impl WebhookHealth {
    pub(crate) fn observe(&mut self, event: &Event) -> Option<HealthTransition> {
        match event {
            Event::DeliveryFailed { path, .. } => {
                self.failed_paths.insert(path.clone());
                if self.degraded {
                    None
                } else {
                    self.degraded = true;
                    Some(HealthTransition::Degraded)
                }
            }
            Event::PipelineCompleted { path } => {
                if self.failed_paths.remove(path) || !self.degraded {
                    None
                } else {
                    self.degraded = false;
                    Some(HealthTransition::Recovered)
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn delivery_failures_flip_health_once() {
        let mut health = WebhookHealth::default();
        let failed = Event::DeliveryFailed {
            path: "/videos/a.mp4".to_string(),
            message: "http status 500".to_string(),
        };
        assert_eq!(health.observe(&failed), Some(HealthTransition::Degraded));
        assert_eq!(health.observe(&failed), None);
    }

    #[test]
    fn completion_with_clean_delivery_recovers() {
        let mut health = WebhookHealth::default();
        health.observe(&Event::DeliveryFailed {
            path: "/videos/a.mp4".to_string(),
            message: "http status 500".to_string(),
        });

        // The failed pipeline's own completion proves nothing.
        assert_eq!(
            health.observe(&Event::PipelineCompleted {
                path: "/videos/a.mp4".to_string(),
            }),
            None
        );
        // A later pipeline that delivered cleanly does.
        assert_eq!(
            health.observe(&Event::PipelineCompleted {
                path: "/videos/b.mp4".to_string(),
            }),
            Some(HealthTransition::Recovered)
        );
    }

    #[tokio::test]
    async fn monitor_publishes_health_transitions() {
        let events = EventBus::new();
        let mut stream = events.subscribe(None);
        let monitor = spawn_event_monitor(events.clone());
        // Let the monitor attach before publishing.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let _ = events.publish(Event::DeliveryFailed {
            path: "/videos/a.mp4".to_string(),
            message: "http status 500".to_string(),
        });

        let mut saw_degraded = false;
        for _ in 0..4 {
            let envelope = timeout(Duration::from_secs(2), stream.next())
                .await
                .expect("event within deadline")
                .expect("open stream");
            if let Event::HealthChanged { degraded } = envelope.event {
                assert_eq!(degraded, vec!["webhook".to_string()]);
                saw_degraded = true;
                break;
            }
        }
        assert!(saw_degraded, "monitor never published HealthChanged");
        monitor.abort();
    }
}
