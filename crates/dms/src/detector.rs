//! Face and landmark detection backends

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use camera_capture::GrayFrame;
use serde::Deserialize;
use tracing::{info, warn};

use crate::landmark::FaceLandmarks;
use crate::DmsError;

/// Face detector plus 68-point landmark predictor.
///
/// Returns every face found in the grayscale frame, in detection order.
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &GrayFrame) -> Result<Vec<FaceLandmarks>, DmsError>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, frame: &GrayFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
        (**self).detect(frame)
    }
}

#[derive(Debug, Deserialize)]
struct RecordedFile {
    frames: Vec<RecordedFrame>,
}

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    sequence: u32,
    #[serde(default)]
    faces: Vec<FaceLandmarks>,
}

/// Landmarks exported by an external 68-point model, keyed by frame sequence.
///
/// File layout:
///
/// ```json
/// { "frames": [ { "sequence": 0, "faces": [ { "bbox": {...}, "points": [[x, y], ...] } ] } ] }
/// ```
///
/// Frames absent from the file have no faces.
#[derive(Debug, Default)]
pub struct RecordedLandmarks {
    frames: HashMap<u32, Vec<FaceLandmarks>>,
}

impl RecordedLandmarks {
    /// Load a recording from disk
    pub fn load(path: &Path) -> Result<Self, DmsError> {
        info!("Loading recorded landmarks from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| DmsError::LandmarkFile(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, DmsError> {
        let file: RecordedFile =
            serde_json::from_str(content).map_err(|e| DmsError::LandmarkFile(e.to_string()))?;

        let mut frames = HashMap::with_capacity(file.frames.len());
        for frame in file.frames {
            for face in &frame.faces {
                face.validate()?;
            }
            if frames.insert(frame.sequence, frame.faces).is_some() {
                warn!("Duplicate landmark entry for frame {}, keeping the last", frame.sequence);
            }
        }

        info!("Loaded landmarks for {} frames", frames.len());
        Ok(Self { frames })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkDetector for RecordedLandmarks {
    fn detect(&mut self, frame: &GrayFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
        Ok(self.frames.get(&frame.sequence).cloned().unwrap_or_default())
    }
}

/// Returns a queued set of faces per call, then nothing
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Vec<FaceLandmarks>>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, faces: Vec<FaceLandmarks>) -> &mut Self {
        self.script.push_back(faces);
        self
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &GrayFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(sequence: u32) -> GrayFrame {
        GrayFrame {
            data: vec![0; 4],
            width: 2,
            height: 2,
            timestamp_ns: 0,
            sequence,
        }
    }

    fn face_json(x_offset: f64) -> String {
        let points: Vec<String> = (0..68)
            .map(|i| format!("[{}, {}]", i as f64 + x_offset, i % 7))
            .collect();
        format!(
            r#"{{ "bbox": {{ "x": 1, "y": 2, "width": 3, "height": 4 }}, "points": [{}] }}"#,
            points.join(",")
        )
    }

    #[test]
    fn test_recorded_lookup_by_sequence() {
        let json = format!(
            r#"{{ "frames": [ {{ "sequence": 3, "faces": [{}, {}] }}, {{ "sequence": 4 }} ] }}"#,
            face_json(0.0),
            face_json(100.0)
        );
        let mut detector = RecordedLandmarks::from_json(&json).unwrap();
        assert_eq!(detector.frame_count(), 2);

        let faces = detector.detect(&gray(3)).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].bbox.width, 3.0);
        assert_eq!(faces[1].left_eye()[0].x, 136.0);

        assert!(detector.detect(&gray(4)).unwrap().is_empty());
        assert!(detector.detect(&gray(99)).unwrap().is_empty());
    }

    #[test]
    fn test_recorded_rejects_short_faces() {
        let json = r#"{ "frames": [ { "sequence": 0, "faces": [ { "points": [[0, 0], [1, 1]] } ] } ] }"#;
        assert!(matches!(
            RecordedLandmarks::from_json(json),
            Err(DmsError::MissingLandmarks { actual: 2, .. })
        ));
    }

    #[test]
    fn test_recorded_rejects_malformed_json() {
        assert!(matches!(
            RecordedLandmarks::from_json("{ not json"),
            Err(DmsError::LandmarkFile(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RecordedLandmarks::load(Path::new("/no/such/landmarks.json")),
            Err(DmsError::LandmarkFile(_))
        ));
    }

    #[test]
    fn test_scripted_detector_drains() {
        let mut detector = ScriptedDetector::new();
        detector.push(Vec::new());
        assert!(detector.detect(&gray(0)).unwrap().is_empty());
        assert!(detector.detect(&gray(1)).unwrap().is_empty());
    }
}
