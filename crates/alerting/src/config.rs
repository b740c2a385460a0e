//! Alarm configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sound::Tone;

/// Alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Sound file looped while the alarm is on (default: alarm.wav)
    pub sound_path: Option<PathBuf>,
    /// External player used for the sound file
    pub player_command: String,
    /// Arguments placed before the file path
    pub player_args: Vec<String>,
    /// Fallback beep pitch (Hz)
    pub beep_frequency_hz: u32,
    /// Fallback beep length (milliseconds)
    pub beep_duration_ms: u64,
    /// Silence between fallback beeps (milliseconds)
    pub beep_pause_ms: u64,
    /// Upper bound on waiting for the sound loop to exit (milliseconds)
    pub stop_timeout_ms: u64,
    /// Delay before retrying a failed playback (milliseconds)
    pub retry_pause_ms: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        let (player_command, player_args) = default_player();
        Self {
            sound_path: Some(PathBuf::from("alarm.wav")),
            player_command,
            player_args,
            beep_frequency_hz: 2500,
            beep_duration_ms: 1000,
            beep_pause_ms: 500,
            stop_timeout_ms: 1000,
            retry_pause_ms: 250,
        }
    }
}

impl AlarmConfig {
    pub fn tone(&self) -> Tone {
        Tone {
            frequency_hz: self.beep_frequency_hz,
            duration: Duration::from_millis(self.beep_duration_ms),
            pause: Duration::from_millis(self.beep_pause_ms),
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}

fn default_player() -> (String, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("afplay".to_string(), Vec::new())
    } else {
        ("aplay".to_string(), vec!["-q".to_string()])
    }
}
