use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A 2D point in image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Point {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// An axis-aligned candidate rectangle from the blob detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CandidateRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Scale position and size, mapping a downscaled detection back to
    /// full-resolution coordinates.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// Facial reference points for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSet {
    pub left_eye_center: Point,
    pub right_eye_center: Point,
    pub nose_lower_center: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nose_center: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nose_upper_center: Option<Point>,
}

impl AnchorSet {
    pub const fn new(
        left_eye_center: Point,
        right_eye_center: Point,
        nose_lower_center: Point,
    ) -> Self {
        Self {
            left_eye_center,
            right_eye_center,
            nose_lower_center,
            nose_center: None,
            nose_upper_center: None,
        }
    }

    pub fn triangle(&self) -> FacialTriangle {
        FacialTriangle {
            left_eye_center: self.left_eye_center,
            right_eye_center: self.right_eye_center,
            nose_lower_center: self.nose_lower_center,
        }
    }
}

/// The three anchors used for alignment: both eye centres and the lower nose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacialTriangle {
    pub left_eye_center: Point,
    pub right_eye_center: Point,
    pub nose_lower_center: Point,
}

impl FacialTriangle {
    /// Vertices in drawing order: left eye, right eye, lower nose.
    pub fn vertices(&self) -> [Point; 3] {
        [
            self.left_eye_center,
            self.right_eye_center,
            self.nose_lower_center,
        ]
    }
}

/// Sensor orientation reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    LandscapeRight,
    LandscapeLeft,
    Portrait,
    PortraitUpsideDown,
    /// Face-up, face-down or anything the camera could not classify.
    #[serde(other)]
    Unknown,
}

impl Orientation {
    /// The coordinate that markers are compared and sorted along.
    ///
    /// Landscape frames use y, portrait frames use x. `Unknown` has no axis.
    pub fn axis_value(&self, p: &Point) -> Option<f32> {
        match self {
            Orientation::LandscapeRight | Orientation::LandscapeLeft => Some(p.y),
            Orientation::Portrait | Orientation::PortraitUpsideDown => Some(p.x),
            Orientation::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::LandscapeRight => "landscape-right",
            Orientation::LandscapeLeft => "landscape-left",
            Orientation::Portrait => "portrait",
            Orientation::PortraitUpsideDown => "portrait-upside-down",
            Orientation::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "landscape-right" => Orientation::LandscapeRight,
            "landscape-left" => Orientation::LandscapeLeft,
            "portrait" => Orientation::Portrait,
            "portrait-upside-down" => Orientation::PortraitUpsideDown,
            _ => Orientation::Unknown,
        })
    }
}

/// Raw output of the landmark detector for one frame.
///
/// Every field may be missing. A frame only has a usable face when both
/// eye centres and the lower nose centre are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LandmarkPayload {
    pub left_eye_center: Option<Point>,
    pub right_eye_center: Option<Point>,
    pub nose_lower_center: Option<Point>,
    pub nose_center: Option<Point>,
    pub nose_upper_center: Option<Point>,
    pub bounding_box_area: Option<f32>,
}

impl LandmarkPayload {
    pub fn anchors(&self) -> Option<AnchorSet> {
        Some(AnchorSet {
            left_eye_center: self.left_eye_center?,
            right_eye_center: self.right_eye_center?,
            nose_lower_center: self.nose_lower_center?,
            nose_center: self.nose_center,
            nose_upper_center: self.nose_upper_center,
        })
    }

    /// Bounding box area, if the detector reported a positive one.
    pub fn box_area(&self) -> Option<f32> {
        self.bounding_box_area.filter(|a| a.is_finite() && *a > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(3.0, 4.0);

        let sum = a + b;
        assert_eq!(sum.x, 4.0);
        assert_eq!(sum.y, 6.0);

        let diff = b - a;
        assert_eq!(diff.x, 2.0);
        assert_eq!(diff.y, 2.0);
    }

    #[test]
    fn candidate_rect_scaling() {
        let rect = CandidateRect::new(10.0, 20.0, 2.0, 3.0);
        let big = rect.scaled(4.0);
        assert_eq!(big, CandidateRect::new(40.0, 80.0, 8.0, 12.0));
        assert_eq!(big.center(), Point::new(44.0, 86.0));
        assert_eq!(rect.area(), 6.0);
    }

    #[test]
    fn payload_without_nose_has_no_anchors() {
        let payload = LandmarkPayload {
            left_eye_center: Some(Point::new(100.0, 100.0)),
            right_eye_center: Some(Point::new(200.0, 100.0)),
            ..Default::default()
        };
        assert!(payload.anchors().is_none());
    }

    #[test]
    fn payload_parses_with_missing_fields() {
        let json = r#"{"leftEyeCenter":{"x":1,"y":2},"rightEyeCenter":{"x":3,"y":2},
            "noseLowerCenter":{"x":2,"y":5},"boundingBoxArea":1200}"#;
        let payload: LandmarkPayload = serde_json::from_str(json).unwrap();
        let anchors = payload.anchors().unwrap();
        assert_eq!(anchors.nose_lower_center, Point::new(2.0, 5.0));
        assert!(anchors.nose_center.is_none());
        assert_eq!(payload.box_area(), Some(1200.0));
    }

    #[test]
    fn orientation_names_round_trip() {
        for o in [
            Orientation::LandscapeRight,
            Orientation::LandscapeLeft,
            Orientation::Portrait,
            Orientation::PortraitUpsideDown,
        ] {
            assert_eq!(o.as_str().parse::<Orientation>().unwrap(), o);
        }
        assert_eq!("face-up".parse::<Orientation>().unwrap(), Orientation::Unknown);
        let parsed: Orientation = serde_json::from_str("\"face-down\"").unwrap();
        assert_eq!(parsed, Orientation::Unknown);
    }
}
