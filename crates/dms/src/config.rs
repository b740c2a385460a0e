//! DMS configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// EAR below this counts as a closed eye
pub const EYE_AR_THRESH: f64 = 0.25;

/// Seconds the eyes must stay closed before the alarm fires
pub const EYE_CLOSED_HOLD_SECS: f64 = 2.0;

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Eye aspect ratio threshold for a closed eye
    pub ear_threshold: f64,

    /// Eyes closed duration before drowsiness alarm (seconds)
    pub hold_duration_secs: f64,

    /// Recorded landmark file for the replay detector
    pub landmarks_path: PathBuf,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: EYE_AR_THRESH,
            hold_duration_secs: EYE_CLOSED_HOLD_SECS,
            landmarks_path: PathBuf::from("landmarks.json"),
        }
    }
}

impl DmsConfig {
    /// Hold duration as a `Duration`; negative or NaN values clamp to zero
    pub fn hold_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.hold_duration_secs).unwrap_or(Duration::ZERO)
    }
}
