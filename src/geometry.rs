//! Point and vector helpers shared by the alignment stages.

use crate::error::{Error, Result};
use crate::types::Point;

/// Arithmetic mean of a set of points.
///
/// Fails with [`Error::EmptyInput`] rather than inventing an origin point.
pub fn centroid(points: &[Point]) -> Result<Point> {
    if points.is_empty() {
        return Err(Error::EmptyInput {
            operation: "centroid",
        });
    }

    let mut sum = Point::zero();
    for p in points {
        sum += *p;
    }
    let n = points.len() as f32;
    Ok(Point::new(sum.x / n, sum.y / n))
}

/// Vector from `b` to `a`.
#[inline]
pub fn subtract(a: Point, b: Point) -> Point {
    a - b
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Point, b: Point) -> f32 {
    a.distance(&b)
}
