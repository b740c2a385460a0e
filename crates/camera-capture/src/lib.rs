//! Camera Capture Library for the Drowsiness Monitor
//!
//! Pull-model frame sources feeding the detection loop.
//! Supports:
//! - Live cameras through `nokhwa` (feature `webcam`)
//! - Recorded image sequences (one file per frame)
//! - Scripted in-memory sources for tests and replays
//!
//! Frames are delivered as packed BGR and normalized to 640x480 before
//! processing.

#[cfg(feature = "webcam")]
pub mod camera;
pub mod frame;
pub mod source;

#[cfg(feature = "webcam")]
pub use camera::CameraSource;
pub use frame::{GrayFrame, PixelFormat, VideoFrame};
pub use source::{FrameSource, ImageSequenceSource, ScriptedSource};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Processing width expected by the detection loop
pub const FRAME_WIDTH: u32 = 640;

/// Processing height expected by the detection loop
pub const FRAME_HEIGHT: u32 = 480;

/// Camera error types
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open capture source: {0}")]
    Open(String),

    #[error("Failed to read frame {sequence}: {reason}")]
    Read { sequence: u32, reason: String },

    #[error("Invalid format: {0}")]
    Format(String),
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Directory holding the recorded frames
    pub frames_dir: PathBuf,
    /// Delay between frames, emulating a live camera rate
    pub frame_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            frame_interval: Duration::ZERO,
        }
    }
}
