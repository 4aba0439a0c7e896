//! View transform: pan and zoom between screen and document space.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

/// Zoom level shown as "100%".
pub const BASE_ZOOM: f64 = 1.0;

/// Pan and zoom of the viewport.
///
/// Document coordinates map to screen coordinates as `screen = doc * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Screen-space translation.
    pub pan: Vec2,
    /// Scale factor, always within [`MIN_ZOOM`, `MAX_ZOOM`].
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: BASE_ZOOM,
        }
    }
}

/// Clamp a requested zoom into the allowed range.
///
/// Returns `None` for non-finite input.
pub fn clamp_zoom(zoom: f64) -> Option<f64> {
    zoom.is_finite().then(|| zoom.clamp(MIN_ZOOM, MAX_ZOOM))
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.zoom)
    }

    /// Screen-to-document transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.pan)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Set the zoom level, clamped. Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f64) {
        if let Some(zoom) = clamp_zoom(zoom) {
            self.zoom = zoom;
        }
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        self.pan = pan;
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Zoom by `factor`, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let Some(new_zoom) = clamp_zoom(self.zoom * factor) else {
            return;
        };
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;

        let new_screen = self.world_to_screen(world_point);
        self.pan += screen_point - new_screen;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
