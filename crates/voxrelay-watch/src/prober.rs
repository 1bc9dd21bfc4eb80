//! Write-completion detection by size-stability polling.
//!
//! # Design
//! - The tick logic is a pure state machine ([`ProbeState::observe`]) so the
//!   stability contract is unit-testable without timers.
//! - [`wait_for_stable`] wraps it in an async sleep loop; each file is
//!   probed on its own task and never blocks another file.
//! - A missing file aborts the probe immediately; a zero-size file is never
//!   considered stable.

use std::path::Path;
use std::time::Duration;

/// Parameters governing a stability probe.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Upper bound on total probing time for one file.
    pub max_wait: Duration,
    /// Delay between consecutive size observations.
    pub poll_interval: Duration,
    /// Consecutive identical non-zero readings required for stability.
    pub required_stable_checks: u32,
}

impl ProbeSettings {
    /// Number of observations the `max_wait` budget allows.
    #[must_use]
    pub fn max_ticks(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let ticks = self.max_wait.as_millis() / interval;
        u32::try_from(ticks.max(1)).unwrap_or(u32::MAX)
    }
}

/// Verdict of a single size observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// The size held steady long enough; the file is complete.
    Stable,
    /// Keep observing.
    Pending,
    /// The file disappeared; abort the probe.
    Missing,
    /// The observation budget ran out before the size settled.
    Exhausted,
}

/// Terminal outcome of a full probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The file finished being written at the given size.
    Stable {
        /// Final observed size in bytes.
        size: u64,
    },
    /// The file disappeared mid-probe.
    Missing,
    /// The file never settled within the budget.
    TimedOut,
}

/// Deterministic tick state for one probe.
#[derive(Debug)]
pub struct ProbeState {
    required: u32,
    max_ticks: u32,
    ticks: u32,
    streak: u32,
    last_size: Option<u64>,
}

impl ProbeState {
    /// Start a probe requiring `required_stable_checks` identical readings
    /// within `max_ticks` observations.
    #[must_use]
    pub const fn new(required_stable_checks: u32, max_ticks: u32) -> Self {
        Self {
            required: required_stable_checks,
            max_ticks,
            ticks: 0,
            streak: 0,
            last_size: None,
        }
    }

    /// Feed one size observation (`None` when the file cannot be stat'd).
    ///
    /// A non-zero size equal to the previous reading extends the stable
    /// streak; any change re-baselines the streak at one; a zero size never
    /// counts toward stability.
    pub fn observe(&mut self, size: Option<u64>) -> ProbeVerdict {
        let Some(size) = size else {
            return ProbeVerdict::Missing;
        };
        self.ticks += 1;
        if size == 0 {
            self.streak = 0;
        } else if self.last_size == Some(size) {
            self.streak += 1;
        } else {
            self.streak = 1;
        }
        self.last_size = Some(size);

        if self.streak >= self.required {
            ProbeVerdict::Stable
        } else if self.ticks >= self.max_ticks {
            ProbeVerdict::Exhausted
        } else {
            ProbeVerdict::Pending
        }
    }

    /// Most recent observed size.
    #[must_use]
    pub const fn last_size(&self) -> Option<u64> {
        self.last_size
    }
}

/// Poll `path` until its size holds steady, it disappears, or the budget
/// runs out.
pub async fn wait_for_stable(path: &Path, settings: &ProbeSettings) -> ProbeOutcome {
    let mut state = ProbeState::new(settings.required_stable_checks, settings.max_ticks());
    loop {
        let size = tokio::fs::metadata(path)
            .await
            .ok()
            .map(|metadata| metadata.len());
        match state.observe(size) {
            ProbeVerdict::Stable => {
                return ProbeOutcome::Stable {
                    size: state.last_size().unwrap_or_default(),
                };
            }
            ProbeVerdict::Missing => return ProbeOutcome::Missing,
            ProbeVerdict::Exhausted => return ProbeOutcome::TimedOut,
            ProbeVerdict::Pending => tokio::time::sleep(settings.poll_interval).await,
        }
    }
}
