//! Drawing targets.

use crate::image::DecodedImage;
use kurbo::{Affine, BezPath, Point, Rect, Size, Stroke};
use peniko::{Color, Mix};

/// A 2D target the scene renderer paints into.
///
/// Coordinates are transformed by the given affine before rasterization.
/// Layers nest: everything painted between `push_layer` and `pop_layer` is
/// composited as one group.
pub trait Surface {
    /// Size in device pixels.
    fn size(&self) -> Size;

    /// Replace every pixel with `color` and drop any open layers.
    fn clear(&mut self, color: Color);

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Color);

    fn stroke_path(&mut self, path: &BezPath, transform: Affine, stroke: &Stroke, color: Color);

    /// Draw a single line of text with its baseline starting at `origin`.
    fn fill_text(
        &mut self,
        text: &str,
        origin: Point,
        font_size: f64,
        font_family: &str,
        transform: Affine,
        color: Color,
    );

    /// Draw `image` scaled into `rect`.
    fn draw_image(&mut self, image: &DecodedImage, rect: Rect, transform: Affine);

    fn push_layer(&mut self, opacity: f32, blend: Mix);

    fn pop_layer(&mut self);
}
