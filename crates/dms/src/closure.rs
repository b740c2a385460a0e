//! Eye-closure tracking
//!
//! Turns a stream of `(ear, now)` samples into a closed/open decision. A
//! closure streak starts at the first sample below threshold and is cleared by
//! any single sample at or above it.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::DmsConfig;

/// Outcome of one tracker update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClosureUpdate {
    /// EAR was below threshold for this sample
    pub closed: bool,
    /// Length of the current closure streak
    pub elapsed: Duration,
    /// Streak reached the hold duration
    pub should_alarm: bool,
}

impl ClosureUpdate {
    const OPEN: Self = Self {
        closed: false,
        elapsed: Duration::ZERO,
        should_alarm: false,
    };
}

/// Tracks how long the eyes have been continuously closed
#[derive(Debug, Clone)]
pub struct EyeClosureTracker {
    threshold: f64,
    hold_duration: Duration,
    closed_since: Option<Instant>,
}

impl EyeClosureTracker {
    pub fn new(threshold: f64, hold_duration: Duration) -> Self {
        Self {
            threshold,
            hold_duration,
            closed_since: None,
        }
    }

    pub fn from_config(config: &DmsConfig) -> Self {
        Self::new(config.ear_threshold, config.hold_duration())
    }

    /// Feed one EAR sample taken at `now`
    pub fn update(&mut self, ear: f64, now: Instant) -> ClosureUpdate {
        if ear >= self.threshold {
            if self.closed_since.take().is_some() {
                debug!("Eyes reopened (ear {:.3})", ear);
            }
            return ClosureUpdate::OPEN;
        }

        let since = *self.closed_since.get_or_insert_with(|| {
            debug!("Eyes closed (ear {:.3})", ear);
            now
        });
        let elapsed = now.saturating_duration_since(since);

        ClosureUpdate {
            closed: true,
            elapsed,
            should_alarm: elapsed >= self.hold_duration,
        }
    }

    /// Start of the current closure streak
    pub fn closed_since(&self) -> Option<Instant> {
        self.closed_since
    }

    /// Streak length at `now`, zero when the eyes are open
    pub fn closed_for(&self, now: Instant) -> Duration {
        self.closed_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or(Duration::ZERO)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold_duration
    }

    /// Forget any closure streak
    pub fn reset(&mut self) {
        self.closed_since = None;
    }
}

impl Default for EyeClosureTracker {
    fn default() -> Self {
        Self::from_config(&DmsConfig::default())
    }
}
