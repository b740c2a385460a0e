//! Driver Monitoring System (DMS)
//!
//! Drowsiness detection from facial landmarks:
//! - Eye aspect ratio (EAR) per eye
//! - Eye-closure streak tracking against a hold duration
//! - Pluggable 68-point landmark detectors

pub mod analysis;
pub mod closure;
pub mod config;
pub mod detector;
pub mod ear;
pub mod landmark;

pub use analysis::DmsAnalysis;
pub use closure::{ClosureUpdate, EyeClosureTracker};
pub use config::{DmsConfig, EYE_AR_THRESH, EYE_CLOSED_HOLD_SECS};
pub use detector::{LandmarkDetector, RecordedLandmarks, ScriptedDetector};
pub use ear::{eye_aspect_ratio, EarReading, Point};
pub use landmark::{FaceBbox, FaceLandmarks, LEFT_EYE, NUM_LANDMARKS, RIGHT_EYE};

use std::time::Instant;

use camera_capture::GrayFrame;
use thiserror::Error;
use tracing::warn;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Invalid landmark input: {0}")]
    InvalidInput(String),

    #[error("Expected {expected} landmarks, got {actual}")]
    MissingLandmarks { expected: usize, actual: usize },

    #[error("Landmark file error: {0}")]
    LandmarkFile(String),

    #[error("Detection failed: {0}")]
    Detection(String),
}

/// Driver monitoring module: detector plus closure tracker
pub struct DmsModule<D> {
    detector: D,
    tracker: EyeClosureTracker,
}

impl<D: LandmarkDetector> DmsModule<D> {
    /// Create a new DMS module with configuration
    pub fn new(config: &DmsConfig, detector: D) -> Self {
        Self {
            detector,
            tracker: EyeClosureTracker::from_config(config),
        }
    }

    /// Analyze a single grayscale frame sampled at `now`
    pub fn analyze(&mut self, frame: &GrayFrame, now: Instant) -> Result<DmsAnalysis, DmsError> {
        let faces = self.detector.detect(frame)?;
        let face_count = faces.len();

        // First detected face wins. With none, the tracker is left alone so a
        // closure streak survives a missed detection.
        let Some(face) = faces.into_iter().next() else {
            return Ok(DmsAnalysis::default());
        };

        let ear = match face.ear() {
            Ok(ear) => ear,
            Err(e) => {
                warn!("Skipping frame {}: {}", frame.sequence, e);
                return Ok(DmsAnalysis {
                    face_count,
                    face: Some(face),
                    ..Default::default()
                });
            }
        };

        let closure = self.tracker.update(ear.average, now);

        Ok(DmsAnalysis {
            face_count,
            face: Some(face),
            ear: Some(ear),
            closure: Some(closure),
        })
    }

    pub fn tracker(&self) -> &EyeClosureTracker {
        &self.tracker
    }
}
