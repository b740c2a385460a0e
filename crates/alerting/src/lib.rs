//! Alerting System
//!
//! Drives the audible drowsiness alarm: a single background sound loop that
//! is started and stopped by the detection loop.

mod config;
mod controller;
mod sound;
mod tone;

pub use config::AlarmConfig;
pub use controller::{AlarmController, AlarmState};
pub use sound::{CancelToken, SoundPlayer, SoundSource, SystemPlayer, Tone};
pub use tone::{play_tone, SineWave};

use std::path::PathBuf;
use thiserror::Error;

/// Alarm error types
#[derive(Debug, Error)]
pub enum AlarmError {
    /// Sound asset missing on disk
    #[error("Alarm sound not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    /// Player ran but reported failure
    #[error("Playback failed: {0}")]
    Playback(String),

    /// Player process or alarm thread could not be started
    #[error("Failed to spawn: {0}")]
    Spawn(String),

    /// A previous alarm task has not exited yet
    #[error("Previous alarm task is still running")]
    TaskStillRunning,
}
