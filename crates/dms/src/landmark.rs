//! 68-point facial landmark scheme (iBUG 300-W / Multi-PIE ordering)

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::ear::{EarReading, Point};
use crate::DmsError;

/// Landmarks per face
pub const NUM_LANDMARKS: usize = 68;

/// Subject's right eye, left in the image
pub const LEFT_EYE: Range<usize> = 36..42;

/// Subject's left eye, right in the image
pub const RIGHT_EYE: Range<usize> = 42..48;

/// Face bounding box in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceBbox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One detected face with its 68 landmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    #[serde(default)]
    pub bbox: FaceBbox,
    points: Vec<Point>,
}

impl FaceLandmarks {
    /// Wrap a full landmark set
    pub fn new(bbox: FaceBbox, points: Vec<Point>) -> Result<Self, DmsError> {
        if points.len() != NUM_LANDMARKS {
            return Err(DmsError::MissingLandmarks {
                expected: NUM_LANDMARKS,
                actual: points.len(),
            });
        }
        Ok(Self { bbox, points })
    }

    /// Landmark by index in the 68-point scheme
    pub fn part(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn left_eye(&self) -> &[Point] {
        &self.points[LEFT_EYE]
    }

    pub fn right_eye(&self) -> &[Point] {
        &self.points[RIGHT_EYE]
    }

    /// EAR of both eyes
    pub fn ear(&self) -> Result<EarReading, DmsError> {
        EarReading::from_eyes(self.left_eye(), self.right_eye())
    }

    /// Re-check the point count after deserialization
    pub(crate) fn validate(&self) -> Result<(), DmsError> {
        if self.points.len() != NUM_LANDMARKS {
            return Err(DmsError::MissingLandmarks {
                expected: NUM_LANDMARKS,
                actual: self.points.len(),
            });
        }
        Ok(())
    }
}
