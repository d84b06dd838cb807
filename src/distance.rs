use std::fmt;

use serde::{Deserialize, Serialize};

/// Distance directive derived from the face bounding box area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFeedback {
    MoveFarther,
    MoveCloser,
    Good,
}

impl DistanceFeedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceFeedback::MoveFarther => "Move farther away",
            DistanceFeedback::MoveCloser => "Move closer",
            DistanceFeedback::Good => "Good distance",
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self, DistanceFeedback::Good)
    }
}

impl fmt::Display for DistanceFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ratio of the live box area to the calibrated one.
///
/// `None` when the calibrated area is unusable.
pub fn box_area_ratio(current_area: f32, calibrated_area: f32) -> Option<f32> {
    if calibrated_area.is_finite() && calibrated_area > 0.0 && current_area.is_finite() {
        Some(current_area / calibrated_area)
    } else {
        None
    }
}

/// Classify a box area ratio.
///
/// A larger box means the face is closer than at calibration. Anything
/// inside `1 ± threshold` is [`DistanceFeedback::Good`], regardless of the
/// previous frame's feedback.
pub fn evaluate_distance(box_area_ratio: f32, threshold: f32) -> DistanceFeedback {
    if box_area_ratio > 1.0 + threshold {
        DistanceFeedback::MoveFarther
    } else if box_area_ratio < 1.0 - threshold {
        DistanceFeedback::MoveCloser
    } else {
        DistanceFeedback::Good
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ratio() {
        assert_eq!(evaluate_distance(1.0, 0.1).as_str(), "Good distance");
        assert_eq!(evaluate_distance(1.2, 0.1).as_str(), "Move farther away");
        assert_eq!(evaluate_distance(0.8, 0.1).as_str(), "Move closer");
    }

    #[test]
    fn band_edges_are_good() {
        assert!(evaluate_distance(1.09, 0.1).is_good());
        assert!(evaluate_distance(0.91, 0.1).is_good());
    }

    #[test]
    fn ratio_requires_positive_calibrated_area() {
        assert_eq!(box_area_ratio(1200.0, 1000.0), Some(1.2));
        assert_eq!(box_area_ratio(1200.0, 0.0), None);
        assert_eq!(box_area_ratio(1200.0, -5.0), None);
        assert_eq!(box_area_ratio(f32::NAN, 1000.0), None);
    }
}
