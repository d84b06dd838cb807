//! Which way the device should be tilted to bring the markers back to
//! their calibrated positions.
//!
//! The estimator averages the signed error between observed and expected
//! markers. Signs are kept, so markers that drift in opposite directions
//! cancel out and only a consistent bias across the whole set produces a
//! correction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TiltThreshold;
use crate::error::{Error, Result};
use crate::geometry::centroid;
use crate::relative::{reconstruct_expected, RelativeVectorSet};
use crate::types::{AnchorSet, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiltDirection {
    Up,
    Down,
    Left,
    Right,
}

impl TiltDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TiltDirection::Up => "up",
            TiltDirection::Down => "down",
            TiltDirection::Left => "left",
            TiltDirection::Right => "right",
        }
    }
}

impl fmt::Display for TiltDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean signed error of observed markers against expected ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltError {
    pub avg_x: f32,
    pub avg_y: f32,
    /// Largest distance from the expected markers' centroid to any of them.
    pub scale: f32,
}

impl TiltError {
    pub fn measure(current: &[Point], expected: &[Point]) -> Result<Self> {
        if current.len() != expected.len() {
            return Err(Error::MarkerCountMismatch {
                expected: expected.len(),
                found: current.len(),
            });
        }

        let errors: Vec<Point> = current
            .iter()
            .zip(expected)
            .map(|(c, e)| *c - *e)
            .collect();
        let avg = centroid(&errors)?;

        let center = centroid(expected)?;
        let scale = expected
            .iter()
            .map(|p| p.distance(&center))
            .fold(0.0, f32::max);

        Ok(Self {
            avg_x: avg.x,
            avg_y: avg.y,
            scale,
        })
    }

    /// Error magnitudes in the units of the threshold mode.
    fn normalized(&self, threshold: &TiltThreshold) -> (f32, f32) {
        match threshold {
            TiltThreshold::Pixels(_) => (self.avg_x.abs(), self.avg_y.abs()),
            TiltThreshold::ScaleRelative(_) if self.scale > 0.0 => {
                (self.avg_x.abs() / self.scale, self.avg_y.abs() / self.scale)
            }
            TiltThreshold::ScaleRelative(_) => (0.0, 0.0),
        }
    }

    /// Vertical correction first, then horizontal.
    pub fn classify(&self, threshold: &TiltThreshold) -> Vec<TiltDirection> {
        let (x, y) = self.normalized(threshold);
        let limit = threshold.value();
        let mut directions = Vec::with_capacity(2);

        // Markers sitting low (positive y error) need the device tilted up.
        if y > limit {
            directions.push(if self.avg_y > 0.0 {
                TiltDirection::Up
            } else {
                TiltDirection::Down
            });
        }

        // Markers sitting right (positive x error) need the device tilted left.
        if x > limit {
            directions.push(if self.avg_x > 0.0 {
                TiltDirection::Left
            } else {
                TiltDirection::Right
            });
        }

        directions
    }
}

/// Tilt corrections for the current markers.
///
/// `current` and `calibrated` must have the same length, otherwise
/// [`Error::MarkerCountMismatch`] is returned. With no markers at all there
/// is nothing to correct.
pub fn estimate_tilt(
    current: &[Point],
    calibrated: &[RelativeVectorSet],
    anchors: &AnchorSet,
    threshold: &TiltThreshold,
) -> Result<Vec<TiltDirection>> {
    if current.len() != calibrated.len() {
        return Err(Error::MarkerCountMismatch {
            expected: calibrated.len(),
            found: current.len(),
        });
    }
    if current.is_empty() {
        return Ok(Vec::new());
    }

    let expected = reconstruct_expected(calibrated, anchors);
    let error = TiltError::measure(current, &expected)?;
    let directions = error.classify(threshold);

    tracing::debug!(
        avg_x = error.avg_x,
        avg_y = error.avg_y,
        scale = error.scale,
        ?directions,
        "estimated marker tilt"
    );
    Ok(directions)
}

/// "up and left", "down", ...
pub fn join_directions(directions: &[TiltDirection]) -> String {
    directions
        .iter()
        .map(TiltDirection::as_str)
        .collect::<Vec<_>>()
        .join(" and ")
}
