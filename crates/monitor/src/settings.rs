//! Layered runtime settings
//!
//! Defaults, then `drowsiness.toml` in the working directory (optional), then
//! `DROWSY__<SECTION>__<KEY>` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use alerting::AlarmConfig;
use camera_capture::{CaptureConfig, FRAME_HEIGHT, FRAME_WIDTH};
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use serde::Deserialize;

/// Settings file looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "drowsiness.toml";

/// Where frames come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureDevice {
    /// Recorded image sequence in `frames_dir`
    #[default]
    Frames,
    /// Live webcam `camera_index`
    Camera,
}

/// Frame source settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub device: CaptureDevice,
    /// Directory of recorded frames
    pub frames_dir: PathBuf,
    pub camera_index: u32,
    /// Processing width
    pub width: u32,
    /// Processing height
    pub height: u32,
    /// Replay rate; unpaced when absent
    pub fps: Option<u32>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device: CaptureDevice::Frames,
            frames_dir: PathBuf::from("frames"),
            camera_index: 0,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            fps: None,
        }
    }
}

impl CaptureSettings {
    pub fn to_config(&self) -> CaptureConfig {
        CaptureConfig {
            frames_dir: self.frames_dir.clone(),
            frame_interval: self
                .fps
                .filter(|&fps| fps > 0)
                .map(|fps| Duration::from_micros(1_000_000 / fps as u64))
                .unwrap_or(Duration::ZERO),
        }
    }
}

/// Overlay output settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Show annotated frames in a window; `q` or closing it quits
    pub window: bool,
    /// Write annotated frames here. Ignored when `window` is set
    pub output_dir: Option<PathBuf>,
}

/// Application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub capture: CaptureSettings,
    pub dms: DmsConfig,
    pub alarm: AlarmConfig,
    pub overlay: OverlaySettings,
}

impl Settings {
    /// Load from the default settings file and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_SETTINGS_FILE))
    }

    /// Load from a specific settings file (may be missing) and environment
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("DROWSY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
