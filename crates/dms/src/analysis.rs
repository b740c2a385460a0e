//! DMS analysis results

use serde::Serialize;

use crate::closure::ClosureUpdate;
use crate::ear::EarReading;
use crate::landmark::FaceLandmarks;

/// Per-frame analysis result
#[derive(Debug, Clone, Default, Serialize)]
pub struct DmsAnalysis {
    /// Faces returned by the detector
    pub face_count: usize,

    /// Face that was evaluated (the first one detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face: Option<FaceLandmarks>,

    /// Eye aspect ratios of the evaluated face
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ear: Option<EarReading>,

    /// Tracker output; `None` when the tracker was not fed this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closure: Option<ClosureUpdate>,
}

impl DmsAnalysis {
    pub fn face_detected(&self) -> bool {
        self.face_count > 0
    }

    /// A face was found but its eye geometry was unusable
    pub fn skipped(&self) -> bool {
        self.face.is_some() && self.closure.is_none()
    }

    pub fn should_alarm(&self) -> bool {
        self.closure.map(|c| c.should_alarm).unwrap_or(false)
    }

    /// Eyes were measured open this frame
    pub fn eyes_open(&self) -> bool {
        self.closure.map(|c| !c.closed).unwrap_or(false)
    }
}
