use crate::types::{FacialTriangle, Point};

#[inline]
fn axis_within(delta: f32, tolerance_px: f32) -> bool {
    delta == 0.0 || delta.abs() < tolerance_px
}

#[inline]
fn within(current: Point, calibrated: Point, tolerance_px: f32) -> bool {
    axis_within(current.x - calibrated.x, tolerance_px)
        && axis_within(current.y - calibrated.y, tolerance_px)
}

/// Whether the live facial triangle matches the calibrated one.
///
/// Each of the three vertices must be strictly closer than `tolerance_px`
/// to its calibrated counterpart on both axes. An exact match always
/// passes, so a zero tolerance accepts only identical triangles.
pub fn is_aligned(
    current: &FacialTriangle,
    calibrated: &FacialTriangle,
    tolerance_px: f32,
) -> bool {
    current
        .vertices()
        .iter()
        .zip(calibrated.vertices().iter())
        .all(|(c, k)| within(*c, *k, tolerance_px))
}

/// Largest per-axis vertex offset between two triangles, in pixels.
pub fn max_offset(current: &FacialTriangle, calibrated: &FacialTriangle) -> f32 {
    current
        .vertices()
        .iter()
        .zip(calibrated.vertices().iter())
        .map(|(c, k)| (c.x - k.x).abs().max((c.y - k.y).abs()))
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> FacialTriangle {
        FacialTriangle {
            left_eye_center: Point::new(100.0, 100.0),
            right_eye_center: Point::new(200.0, 100.0),
            nose_lower_center: Point::new(150.0, 150.0),
        }
    }

    fn shifted(t: &FacialTriangle, dx: f32, dy: f32) -> FacialTriangle {
        let d = Point::new(dx, dy);
        FacialTriangle {
            left_eye_center: t.left_eye_center + d,
            right_eye_center: t.right_eye_center + d,
            nose_lower_center: t.nose_lower_center + d,
        }
    }

    #[test]
    fn reflexive_for_any_tolerance() {
        let t = triangle();
        for tol in [0.0, 0.5, 45.0, 1000.0] {
            assert!(is_aligned(&t, &t, tol));
        }
    }

    #[test]
    fn small_shift_is_aligned() {
        let t = triangle();
        assert!(is_aligned(&shifted(&t, 30.0, -44.0), &t, 45.0));
    }

    #[test]
    fn shift_beyond_tolerance_on_either_axis_fails() {
        let t = triangle();
        assert!(!is_aligned(&shifted(&t, 46.0, 0.0), &t, 45.0));
        assert!(!is_aligned(&shifted(&t, 0.0, -60.0), &t, 45.0));
    }

    #[test]
    fn offset_equal_to_tolerance_fails() {
        let t = triangle();
        assert!(!is_aligned(&shifted(&t, 45.0, 0.0), &t, 45.0));
        assert!(!is_aligned(&shifted(&t, 0.0, -45.0), &t, 45.0));
        assert!(is_aligned(&shifted(&t, 44.9, -44.9), &t, 45.0));
    }

    #[test]
    fn zero_tolerance_rejects_any_offset() {
        let t = triangle();
        assert!(!is_aligned(&shifted(&t, 0.5, 0.0), &t, 0.0));
    }

    #[test]
    fn one_bad_vertex_fails() {
        let t = triangle();
        let mut moved = t;
        moved.nose_lower_center = Point::new(150.0, 220.0);
        assert!(!is_aligned(&moved, &t, 45.0));
        assert_eq!(max_offset(&moved, &t), 70.0);
    }

    #[test]
    fn tolerance_does_not_scale_with_coordinates() {
        // A face near the origin is held to the same pixel tolerance.
        let near_origin = FacialTriangle {
            left_eye_center: Point::new(2.0, 3.0),
            right_eye_center: Point::new(40.0, 3.0),
            nose_lower_center: Point::new(21.0, 30.0),
        };
        assert!(is_aligned(&shifted(&near_origin, 10.0, 10.0), &near_origin, 45.0));
    }
}
