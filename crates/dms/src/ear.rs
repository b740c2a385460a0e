//! Eye Aspect Ratio (EAR)
//!
//! Six landmarks per eye, in the 68-point ordering:
//!
//! ```text
//!        p1   p2
//!   p0            p3
//!        p5   p4
//! ```
//!
//! `ear = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)`. An open eye sits around
//! 0.3, a closed one approaches 0.

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Points needed per eye
pub const EYE_POINTS: usize = 6;

/// 2D landmark position in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f64, f64) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Compute the eye aspect ratio of one eye.
///
/// Only the first six points are used. Fails with [`DmsError::InvalidInput`]
/// when fewer are given or when the eye corners coincide.
pub fn eye_aspect_ratio(eye: &[Point]) -> Result<f64, DmsError> {
    if eye.len() < EYE_POINTS {
        return Err(DmsError::InvalidInput(format!(
            "eye needs {} landmarks, got {}",
            EYE_POINTS,
            eye.len()
        )));
    }

    let vertical_a = eye[1].distance(&eye[5]);
    let vertical_b = eye[2].distance(&eye[4]);
    let horizontal = eye[0].distance(&eye[3]);

    if horizontal <= f64::EPSILON {
        return Err(DmsError::InvalidInput(
            "eye corners coincide (zero horizontal distance)".into(),
        ));
    }

    Ok((vertical_a + vertical_b) / (2.0 * horizontal))
}

/// Per-frame EAR reading for both eyes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarReading {
    pub left: f64,
    pub right: f64,
    pub average: f64,
}

impl EarReading {
    /// Compute both eyes and their mean; the first failure wins
    pub fn from_eyes(left: &[Point], right: &[Point]) -> Result<Self, DmsError> {
        let left = eye_aspect_ratio(left)?;
        let right = eye_aspect_ratio(right)?;
        Ok(Self {
            left,
            right,
            average: (left + right) / 2.0,
        })
    }
}
