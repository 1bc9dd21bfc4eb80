//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes a minimal set of counters/gauges relevant to the watch loop
//!   and the processing pipeline.

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

struct MetricsInner {
    registry: Registry,
    events_emitted_total: IntCounterVec,
    probes_total: IntCounterVec,
    pipeline_steps_total: IntCounterVec,
    pipelines_completed_total: IntCounter,
    pipelines_failed_total: IntCounter,
    deliveries_failed_total: IntCounter,
    ledger_in_progress: IntGauge,
    ledger_completed: IntGauge,
    ledger_evictions_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Identities currently claimed by in-flight workers.
    pub ledger_in_progress: i64,
    /// Identities recorded as completed.
    pub ledger_completed: i64,
    /// Total completed-ledger evictions performed.
    pub ledger_evictions_total: u64,
    /// Total pipelines that ran to completion.
    pub pipelines_completed_total: u64,
    /// Total pipelines that aborted at some step.
    pub pipelines_failed_total: u64,
    /// Total webhook deliveries that failed.
    pub deliveries_failed_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )?;
        let probes_total = IntCounterVec::new(
            Opts::new("probes_total", "Stability probes finished by outcome"),
            &["outcome"],
        )?;
        let pipeline_steps_total = IntCounterVec::new(
            Opts::new(
                "pipeline_steps_total",
                "Processing pipeline steps executed by status",
            ),
            &["step", "status"],
        )?;
        let pipelines_completed_total = IntCounter::with_opts(Opts::new(
            "pipelines_completed_total",
            "Pipelines that ran to completion",
        ))?;
        let pipelines_failed_total = IntCounter::with_opts(Opts::new(
            "pipelines_failed_total",
            "Pipelines that aborted at some step",
        ))?;
        let deliveries_failed_total = IntCounter::with_opts(Opts::new(
            "deliveries_failed_total",
            "Webhook deliveries that failed",
        ))?;
        let ledger_in_progress = IntGauge::with_opts(Opts::new(
            "ledger_in_progress",
            "Identities currently claimed by workers",
        ))?;
        let ledger_completed = IntGauge::with_opts(Opts::new(
            "ledger_completed",
            "Identities recorded as completed",
        ))?;
        let ledger_evictions_total = IntCounter::with_opts(Opts::new(
            "ledger_evictions_total",
            "Completed-ledger evictions performed",
        ))?;

        registry.register(Box::new(events_emitted_total.clone()))?;
        registry.register(Box::new(probes_total.clone()))?;
        registry.register(Box::new(pipeline_steps_total.clone()))?;
        registry.register(Box::new(pipelines_completed_total.clone()))?;
        registry.register(Box::new(pipelines_failed_total.clone()))?;
        registry.register(Box::new(deliveries_failed_total.clone()))?;
        registry.register(Box::new(ledger_in_progress.clone()))?;
        registry.register(Box::new(ledger_completed.clone()))?;
        registry.register(Box::new(ledger_evictions_total.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                events_emitted_total,
                probes_total,
                pipeline_steps_total,
                pipelines_completed_total,
                pipelines_failed_total,
                deliveries_failed_total,
                ledger_in_progress,
                ledger_completed,
                ledger_evictions_total,
            }),
        })
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Increment the probe counter for the given outcome
    /// (`stable`, `timeout`, `missing`).
    pub fn inc_probe(&self, outcome: &str) {
        self.inner
            .probes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the processing pipeline step counter.
    pub fn inc_pipeline_step(&self, step: &str, status: &str) {
        self.inner
            .pipeline_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Record a pipeline that ran to completion.
    pub fn inc_pipeline_completed(&self) {
        self.inner.pipelines_completed_total.inc();
    }

    /// Record a pipeline that aborted at some step.
    pub fn inc_pipeline_failed(&self) {
        self.inner.pipelines_failed_total.inc();
    }

    /// Record a failed webhook delivery.
    pub fn inc_delivery_failed(&self) {
        self.inner.deliveries_failed_total.inc();
    }

    /// Set the in-progress ledger gauge.
    pub fn set_ledger_in_progress(&self, count: i64) {
        self.inner.ledger_in_progress.set(count);
    }

    /// Set the completed ledger gauge.
    pub fn set_ledger_completed(&self, count: i64) {
        self.inner.ledger_completed.set(count);
    }

    /// Record evicted completed-ledger entries.
    pub fn inc_ledger_evictions(&self, removed: u64) {
        self.inner.ledger_evictions_total.inc_by(removed);
    }

    /// Render the metrics registry using the Prometheus text exposition
    /// format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant gauges and
    /// counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ledger_in_progress: self.inner.ledger_in_progress.get(),
            ledger_completed: self.inner.ledger_completed.get(),
            ledger_evictions_total: self.inner.ledger_evictions_total.get(),
            pipelines_completed_total: self.inner.pipelines_completed_total.get(),
            pipelines_failed_total: self.inner.pipelines_failed_total.get(),
            deliveries_failed_total: self.inner.deliveries_failed_total.get(),
        }
    }
}
