//! Distance helpers shared by hit testing and the eraser.

use kurbo::{Point, Rect, Vec2};

/// Distance from a point to the segment `a`–`b`.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline.
///
/// A single-point polyline degenerates to the distance to that point; an
/// empty one is infinitely far away.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => (point - *only).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Smallest rectangle containing every point.
pub fn bounding_rect(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
    let mut iter = points.into_iter();
    let first = iter.next()?;
    Some(iter.fold(Rect::from_points(first, first), |rect, p| rect.union_pt(p)))
}

/// Even-odd point-in-polygon test over an implicitly closed ring.
pub fn polygon_contains(point: Point, ring: &[Point]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Unit direction from `from` to `to`, or zero for coincident points.
pub fn direction(from: Point, to: Point) -> Vec2 {
    let v = to - from;
    let len = v.hypot();
    if len < f64::EPSILON { Vec2::ZERO } else { v / len }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((point_to_segment_dist(Point::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-9);
        // Beyond the end clamps to the endpoint.
        assert!((point_to_segment_dist(Point::new(13.0, 4.0), a, b) - 5.0).abs() < 1e-9);
        // Degenerate segment.
        assert!((point_to_segment_dist(Point::new(3.0, 4.0), a, a) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_polyline_distance() {
        let pts = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        assert!((point_to_polyline_dist(Point::new(12.0, 5.0), &pts) - 2.0).abs() < 1e-9);
        assert!(point_to_polyline_dist(Point::ZERO, &[]).is_infinite());
    }

    #[test]
    fn test_bounding_rect() {
        let rect = bounding_rect([Point::new(5.0, 1.0), Point::new(-2.0, 8.0)]).unwrap();
        assert_eq!(rect, Rect::new(-2.0, 1.0, 5.0, 8.0));
        assert!(bounding_rect(std::iter::empty()).is_none());
    }

    #[test]
    fn test_polygon_contains() {
        let tri = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(0.0, 10.0)];
        assert!(polygon_contains(Point::new(2.0, 2.0), &tri));
        assert!(!polygon_contains(Point::new(8.0, 8.0), &tri));
    }
}
