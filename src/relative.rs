//! Marker positions expressed relative to the facial anchors.
//!
//! At calibration time every marker is stored as three offsets, one from
//! each anchor of the facial triangle. At runtime the offsets are added
//! back onto the *current* anchors, which predicts where each marker
//! should be if the device has not moved relative to the face. Storing
//! offsets rather than absolute positions is what lets the comparison
//! survive head translation between calibration and runtime.

use serde::{Deserialize, Serialize};

use crate::geometry::subtract;
use crate::types::{AnchorSet, Point};

/// Offsets from each facial anchor to one marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativeVectorSet {
    pub from_left_eye: Point,
    pub from_right_eye: Point,
    pub from_nose_lower: Point,
}

impl RelativeVectorSet {
    pub fn new(marker: Point, anchors: &AnchorSet) -> Self {
        Self {
            from_left_eye: subtract(marker, anchors.left_eye_center),
            from_right_eye: subtract(marker, anchors.right_eye_center),
            from_nose_lower: subtract(marker, anchors.nose_lower_center),
        }
    }

    /// The marker position predicted by each anchor separately.
    pub fn project(&self, anchors: &AnchorSet) -> [Point; 3] {
        [
            anchors.left_eye_center + self.from_left_eye,
            anchors.right_eye_center + self.from_right_eye,
            anchors.nose_lower_center + self.from_nose_lower,
        ]
    }

    /// Mean of the three per-anchor predictions.
    pub fn expected(&self, anchors: &AnchorSet) -> Point {
        let [l, r, n] = self.project(anchors);
        Point::new((l.x + r.x + n.x) / 3.0, (l.y + r.y + n.y) / 3.0)
    }
}

/// One vector set per marker, in marker order.
pub fn compute_vectors(markers: &[Point], anchors: &AnchorSet) -> Vec<RelativeVectorSet> {
    markers
        .iter()
        .map(|m| RelativeVectorSet::new(*m, anchors))
        .collect()
}

/// Expected marker positions given the current anchors.
pub fn reconstruct_expected(vectors: &[RelativeVectorSet], anchors: &AnchorSet) -> Vec<Point> {
    vectors.iter().map(|v| v.expected(anchors)).collect()
}

/// Per-anchor predictions for every marker, for overlay drawing.
pub fn project_vectors(vectors: &[RelativeVectorSet], anchors: &AnchorSet) -> Vec<[Point; 3]> {
    vectors.iter().map(|v| v.project(anchors)).collect()
}
