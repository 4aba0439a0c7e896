//! CPU raster surface backed by tiny-skia.

use crate::image::DecodedImage;
use crate::renderer::RendererError;
use crate::surface::Surface;
use ab_glyph::{Font, FontArc, ScaleFont, point};
use kurbo::{Affine, BezPath, Cap, Join, PathEl, Point, Rect, Size, Stroke};
use peniko::{Color, Mix};
use tiny_skia::{
    BlendMode, ColorU8, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap,
    PixmapPaint, Transform,
};

struct Group {
    pixmap: Pixmap,
    opacity: f32,
    blend: BlendMode,
}

/// Rasterizes into an RGBA8 pixmap.
///
/// Text needs a font; without one, text runs are skipped.
pub struct PixmapSurface {
    base: Pixmap,
    groups: Vec<Group>,
    font: Option<FontArc>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, RendererError> {
        let base = Pixmap::new(width, height).ok_or_else(|| {
            RendererError::InitFailed(format!("Invalid surface size {width}x{height}"))
        })?;
        Ok(Self {
            base,
            groups: Vec::new(),
            font: None,
        })
    }

    /// Use the TrueType/OpenType font in `data` for text.
    pub fn with_font(mut self, data: Vec<u8>) -> Result<Self, RendererError> {
        let font = FontArc::try_from_vec(data)
            .map_err(|e| RendererError::InitFailed(format!("Invalid font: {e}")))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn width(&self) -> u32 {
        self.base.width()
    }

    pub fn height(&self) -> u32 {
        self.base.height()
    }

    /// Straight-alpha RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.base.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    /// Straight-alpha RGBA8 rows, top to bottom.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.base
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    fn target(&mut self) -> &mut Pixmap {
        match self.groups.last_mut() {
            Some(group) => &mut group.pixmap,
            None => &mut self.base,
        }
    }
}

fn to_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

fn to_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(p1, p2) => pb.quad_to(p1.x as f32, p1.y as f32, p2.x as f32, p2.y as f32),
            PathEl::CurveTo(p1, p2, p3) => pb.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

fn to_paint(color: Color) -> Paint<'static> {
    let rgba = color.to_rgba8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba.r, rgba.g, rgba.b, rgba.a);
    paint.anti_alias = true;
    paint
}

fn to_stroke(stroke: &Stroke) -> tiny_skia::Stroke {
    tiny_skia::Stroke {
        width: stroke.width as f32,
        miter_limit: stroke.miter_limit as f32,
        line_cap: match stroke.start_cap {
            Cap::Butt => LineCap::Butt,
            Cap::Square => LineCap::Square,
            Cap::Round => LineCap::Round,
        },
        line_join: match stroke.join {
            Join::Bevel => LineJoin::Bevel,
            Join::Miter => LineJoin::Miter,
            Join::Round => LineJoin::Round,
        },
        dash: None,
    }
}

fn to_blend(mix: Mix) -> BlendMode {
    match mix {
        Mix::Multiply => BlendMode::Multiply,
        Mix::Screen => BlendMode::Screen,
        Mix::Overlay => BlendMode::Overlay,
        Mix::Darken => BlendMode::Darken,
        Mix::Lighten => BlendMode::Lighten,
        _ => BlendMode::SourceOver,
    }
}

impl Surface for PixmapSurface {
    fn size(&self) -> Size {
        Size::new(self.base.width() as f64, self.base.height() as f64)
    }

    fn clear(&mut self, color: Color) {
        self.groups.clear();
        let c = color.to_rgba8();
        self.base
            .fill(tiny_skia::Color::from_rgba8(c.r, c.g, c.b, c.a));
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Color) {
        let Some(path) = to_path(path) else { return };
        let paint = to_paint(color);
        self.target()
            .fill_path(&path, &paint, FillRule::Winding, to_transform(transform), None);
    }

    fn stroke_path(&mut self, path: &BezPath, transform: Affine, stroke: &Stroke, color: Color) {
        let Some(path) = to_path(path) else { return };
        let paint = to_paint(color);
        let stroke = to_stroke(stroke);
        self.target()
            .stroke_path(&path, &paint, &stroke, to_transform(transform), None);
    }

    fn fill_text(
        &mut self,
        text: &str,
        origin: Point,
        font_size: f64,
        _font_family: &str,
        transform: Affine,
        color: Color,
    ) {
        let Some(font) = self.font.clone() else {
            log::debug!("No font loaded; skipping text run");
            return;
        };
        // Glyphs are rasterized upright in device space at the transformed size.
        let scale = transform.determinant().abs().sqrt();
        let px_size = (font_size * scale) as f32;
        if px_size <= 0.0 || !px_size.is_finite() {
            return;
        }
        let start = transform * origin;
        let scaled = font.as_scaled(px_size);
        let rgba = color.to_rgba8();
        let target = self.target();

        let mut cx = start.x as f32;
        let base_y = start.y as f32;
        let mut prev_glyph: Option<ab_glyph::GlyphId> = None;
        for ch in text.chars() {
            let gid = font.glyph_id(ch);
            if let Some(prev) = prev_glyph {
                cx += scaled.kern(prev, gid);
            }
            let glyph = gid.with_scale_and_position(px_size, point(cx, base_y));
            cx += scaled.h_advance(gid);
            prev_glyph = Some(gid);

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, cov| {
                if cov <= 0.0 {
                    return;
                }
                let alpha = (cov * rgba.a as f32).round().min(255.0) as u8;
                let x = bounds.min.x + px as f32;
                let y = bounds.min.y + py as f32;
                if let Some(rect) = tiny_skia::Rect::from_xywh(x, y, 1.0, 1.0) {
                    let mut paint = Paint::default();
                    paint.set_color_rgba8(rgba.r, rgba.g, rgba.b, alpha);
                    target.fill_rect(rect, &paint, Transform::identity(), None);
                }
            });
        }
    }

    fn draw_image(&mut self, image: &DecodedImage, rect: Rect, transform: Affine) {
        let Some(mut pixmap) = Pixmap::new(image.width, image.height) else {
            return;
        };
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.rgba.chunks_exact(4)) {
            *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
        }
        let placement = transform
            * Affine::translate((rect.x0, rect.y0))
            * Affine::scale_non_uniform(
                rect.width() / image.width as f64,
                rect.height() / image.height as f64,
            );
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.target()
            .draw_pixmap(0, 0, pixmap.as_ref(), &paint, to_transform(placement), None);
    }

    fn push_layer(&mut self, opacity: f32, blend: Mix) {
        let Some(pixmap) = Pixmap::new(self.base.width(), self.base.height()) else {
            return;
        };
        self.groups.push(Group {
            pixmap,
            opacity: opacity.clamp(0.0, 1.0),
            blend: to_blend(blend),
        });
    }

    fn pop_layer(&mut self) {
        let Some(group) = self.groups.pop() else {
            return;
        };
        let paint = PixmapPaint {
            opacity: group.opacity,
            blend_mode: group.blend,
            quality: FilterQuality::Nearest,
        };
        self.target().draw_pixmap(
            0,
            0,
            group.pixmap.as_ref(),
            &paint,
            Transform::identity(),
            None,
        );
    }
}
