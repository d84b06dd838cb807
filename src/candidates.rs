//! Turning raw blob rectangles into an ordered list of marker points.
//!
//! The blob detector runs on a downscaled frame and returns rectangles in
//! no particular order. Filtering happens in three steps:
//!
//! 1. Drop rectangles whose downscaled area is outside the configured band.
//! 2. Upscale the survivors and keep those whose centre lies on the marker
//!    side of the eye line for the current orientation.
//! 3. Sort along the orientation axis (descending) and keep the first
//!    `max_markers`.
//!
//! Which side of the eye line counts as "marker side" is a policy tied to
//! how the sensor is mounted:
//!
//! | orientation            | kept when          |
//! |------------------------|--------------------|
//! | `landscape-right`      | `center.y < eye`   |
//! | `landscape-left`       | `center.y > eye`   |
//! | `portrait`             | `center.x < eye`   |
//! | `portrait-upside-down` | `center.x > eye`   |
//!
//! An unknown orientation keeps every in-band candidate in detection order.

use std::cmp::Ordering;

use crate::config::CandidateConfig;
use crate::types::{AnchorSet, CandidateRect, Orientation, Point};

/// A candidate that survived filtering, in full-resolution coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub rect: CandidateRect,
    pub point: Point,
}

/// Eye line position along the orientation axis, in full-resolution px.
///
/// Landscape frames use the mean eye y, portrait frames the mean eye x.
/// Returns `None` for an unknown orientation.
pub fn eye_level(anchors: &AnchorSet, orientation: Orientation, offset: f32) -> Option<f32> {
    let left = orientation.axis_value(&anchors.left_eye_center)?;
    let right = orientation.axis_value(&anchors.right_eye_center)?;
    Some((left + right) / 2.0 + offset)
}

fn on_marker_side(orientation: Orientation, center: &Point, eye_level: f32) -> bool {
    match orientation {
        Orientation::LandscapeRight => center.y < eye_level,
        Orientation::LandscapeLeft => center.y > eye_level,
        Orientation::Portrait => center.x < eye_level,
        Orientation::PortraitUpsideDown => center.x > eye_level,
        Orientation::Unknown => true,
    }
}

fn axis_cmp(orientation: Orientation, a: &Point, b: &Point) -> Ordering {
    match (orientation.axis_value(a), orientation.axis_value(b)) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        _ => Ordering::Equal,
    }
}

/// Filters blob detections down to at most `max_markers` markers.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    config: CandidateConfig,
}

impl CandidateFilter {
    pub fn new(config: CandidateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CandidateConfig {
        &self.config
    }

    fn in_area_band(&self, rect: &CandidateRect) -> bool {
        let area = rect.area();
        area >= self.config.min_area && area <= self.config.max_area
    }

    /// Filter and rank downscaled detections against an eye line.
    ///
    /// `eye_level` is in full-resolution pixels on the orientation axis.
    /// Ties in the sort keep detection order.
    pub fn filter(
        &self,
        rects: &[CandidateRect],
        orientation: Orientation,
        eye_level: f32,
    ) -> Vec<Marker> {
        let mut markers: Vec<Marker> = rects
            .iter()
            .filter(|r| self.in_area_band(r))
            .map(|r| {
                let rect = r.scaled(self.config.upscale_factor);
                Marker {
                    rect,
                    point: rect.center(),
                }
            })
            .filter(|m| on_marker_side(orientation, &m.point, eye_level))
            .collect();

        // Stable sort, so equal keys stay in detection order.
        markers.sort_by(|a, b| axis_cmp(orientation, &b.point, &a.point));
        markers.truncate(self.config.max_markers);

        tracing::debug!(
            detected = rects.len(),
            kept = markers.len(),
            %orientation,
            eye_level,
            "filtered marker candidates"
        );
        markers
    }
}

/// Order markers ascending along the orientation axis.
///
/// Calibration and runtime frames both go through this ordering so their
/// relative vectors pair up by position. Equal keys keep their input order.
pub fn order_markers(markers: &mut [Marker], orientation: Orientation) {
    markers.sort_by(|a, b| axis_cmp(orientation, &a.point, &b.point));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> CandidateFilter {
        CandidateFilter::new(CandidateConfig::default())
    }

    /// A 2×2 downscaled rectangle whose upscaled centre is `(cx, cy)`.
    fn rect_at(cx: f32, cy: f32) -> CandidateRect {
        CandidateRect::new(cx / 4.0 - 1.0, cy / 4.0 - 1.0, 2.0, 2.0)
    }

    fn points(markers: &[Marker]) -> Vec<Point> {
        markers.iter().map(|m| m.point).collect()
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(filter()
            .filter(&[], Orientation::LandscapeRight, 100.0)
            .is_empty());
    }

    #[test]
    fn rectangles_are_upscaled() {
        let markers = filter().filter(
            &[CandidateRect::new(10.0, 5.0, 2.0, 3.0)],
            Orientation::LandscapeRight,
            1000.0,
        );
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].rect, CandidateRect::new(40.0, 20.0, 8.0, 12.0));
        assert_eq!(markers[0].point, Point::new(44.0, 26.0));
    }

    #[test]
    fn area_band_drops_specks_and_large_blobs() {
        let rects = [
            CandidateRect::new(10.0, 10.0, 1.0, 1.0),   // 1 px², too small
            CandidateRect::new(20.0, 10.0, 2.0, 1.0),   // 2 px², lower edge
            CandidateRect::new(30.0, 10.0, 10.0, 10.0), // 100 px², upper edge
            CandidateRect::new(40.0, 10.0, 20.0, 20.0), // 400 px², too large
        ];
        let markers = filter().filter(&rects, Orientation::LandscapeRight, 1000.0);
        let xs: Vec<f32> = markers.iter().map(|m| m.rect.x).collect();
        assert_eq!(markers.len(), 2);
        assert!(xs.contains(&80.0));
        assert!(xs.contains(&120.0));
    }

    #[test]
    fn landscape_right_keeps_points_above_eye_line() {
        let rects = [rect_at(100.0, 80.0), rect_at(120.0, 120.0), rect_at(140.0, 60.0)];
        let markers = filter().filter(&rects, Orientation::LandscapeRight, 100.0);
        assert!(markers.iter().all(|m| m.point.y < 100.0));
        // Descending y: nearest to the eye line first.
        assert_eq!(
            points(&markers),
            vec![Point::new(100.0, 80.0), Point::new(140.0, 60.0)]
        );
    }

    #[test]
    fn landscape_left_keeps_points_below_eye_line() {
        let rects = [rect_at(100.0, 80.0), rect_at(120.0, 120.0), rect_at(140.0, 160.0)];
        let markers = filter().filter(&rects, Orientation::LandscapeLeft, 100.0);
        assert_eq!(
            points(&markers),
            vec![Point::new(140.0, 160.0), Point::new(120.0, 120.0)]
        );
    }

    #[test]
    fn portrait_orientations_use_x() {
        let rects = [rect_at(80.0, 100.0), rect_at(120.0, 100.0), rect_at(60.0, 40.0)];

        let portrait = filter().filter(&rects, Orientation::Portrait, 100.0);
        assert_eq!(
            points(&portrait),
            vec![Point::new(80.0, 100.0), Point::new(60.0, 40.0)]
        );

        let upside_down = filter().filter(&rects, Orientation::PortraitUpsideDown, 100.0);
        assert_eq!(points(&upside_down), vec![Point::new(120.0, 100.0)]);
    }

    #[test]
    fn unknown_orientation_keeps_all_in_detection_order() {
        let rects = [rect_at(100.0, 300.0), rect_at(20.0, 10.0), rect_at(60.0, 200.0)];
        let markers = filter().filter(&rects, Orientation::Unknown, 0.0);
        assert_eq!(
            points(&markers),
            vec![
                Point::new(100.0, 300.0),
                Point::new(20.0, 10.0),
                Point::new(60.0, 200.0)
            ]
        );
    }

    #[test]
    fn never_more_than_max_markers() {
        let rects: Vec<CandidateRect> = (0..12)
            .map(|i| rect_at(20.0 * i as f32, 10.0 + 4.0 * i as f32))
            .collect();
        let markers = filter().filter(&rects, Orientation::LandscapeRight, 1000.0);
        assert_eq!(markers.len(), 5);
        // The five largest y values survive.
        assert_eq!(markers[0].point.y, 54.0);
        assert_eq!(markers[4].point.y, 38.0);
    }

    #[test]
    fn ties_keep_detection_order() {
        let rects = [rect_at(40.0, 80.0), rect_at(20.0, 80.0), rect_at(60.0, 80.0)];
        let markers = filter().filter(&rects, Orientation::LandscapeRight, 100.0);
        let xs: Vec<f32> = markers.iter().map(|m| m.point.x).collect();
        assert_eq!(xs, vec![40.0, 20.0, 60.0]);

        let mut ordered = markers.clone();
        order_markers(&mut ordered, Orientation::LandscapeRight);
        let xs: Vec<f32> = ordered.iter().map(|m| m.point.x).collect();
        assert_eq!(xs, vec![40.0, 20.0, 60.0]);
    }

    #[test]
    fn order_markers_sorts_ascending() {
        let rects = [rect_at(120.0, 80.0), rect_at(150.0, 60.0), rect_at(180.0, 76.0)];
        let mut markers = filter().filter(&rects, Orientation::LandscapeRight, 100.0);
        order_markers(&mut markers, Orientation::LandscapeRight);
        let ys: Vec<f32> = markers.iter().map(|m| m.point.y).collect();
        assert_eq!(ys, vec![60.0, 76.0, 80.0]);
    }

    #[test]
    fn eye_level_follows_orientation() {
        let anchors = AnchorSet::new(
            Point::new(100.0, 90.0),
            Point::new(200.0, 110.0),
            Point::new(150.0, 150.0),
        );
        assert_eq!(eye_level(&anchors, Orientation::LandscapeRight, 0.0), Some(100.0));
        assert_eq!(eye_level(&anchors, Orientation::LandscapeLeft, -5.0), Some(95.0));
        assert_eq!(eye_level(&anchors, Orientation::Portrait, 0.0), Some(150.0));
        assert_eq!(eye_level(&anchors, Orientation::Unknown, 0.0), None);
    }
}
