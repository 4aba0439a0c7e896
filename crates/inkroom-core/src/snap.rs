//! Grid snapping for tool input.

use kurbo::Point;

/// Round a point to the nearest grid intersection.
///
/// A non-positive or non-finite grid size leaves the point unchanged.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    if !grid_size.is_finite() || grid_size <= 0.0 {
        return point;
    }
    Point::new(
        (point.x / grid_size).round() * grid_size,
        (point.y / grid_size).round() * grid_size,
    )
}
