//! Scene rendering: document, background and preview onto a [`Surface`].

use crate::image::ImageCache;
use crate::surface::Surface;
use inkroom_core::canvas::Canvas;
use inkroom_core::document::CanvasState;
use inkroom_core::element::{
    CalloutType, DEFAULT_FONT_SIZE, Element, ElementKind, HexColor, NOTE_FONT_SIZE,
};
use inkroom_core::settings::{BackgroundKind, CanvasSettings, MIN_GRID_SIZE, ToolSettings};
use kurbo::{
    Affine, BezPath, Cap, Circle, Ellipse, Join, Line, Point, Rect, RoundedRect, Shape, Size,
    Stroke, Vec2,
};
use peniko::Color;
use std::f64::consts::FRAC_PI_6;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Image error: {0}")]
    Image(String),
}

const NOTE_FILL: Color = Color::from_rgba8(0xfe, 0xf0, 0x8a, 255);
const NOTE_BORDER: Color = Color::from_rgba8(0xca, 0x8a, 0x04, 255);
const NOTE_TEXT: Color = Color::from_rgba8(0x71, 0x3f, 0x12, 255);
const TEXT_INSET: Vec2 = Vec2::new(10.0, 25.0);
const CALLOUT_RADIUS: f64 = 8.0;
const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// Context for a single render frame.
pub struct RenderContext<'a> {
    pub state: &'a CanvasState,
    pub tool_settings: &'a ToolSettings,
    /// Uncommitted element painted above everything else.
    pub preview: Option<Element>,
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
}

impl<'a> RenderContext<'a> {
    pub fn new(state: &'a CanvasState, tool_settings: &'a ToolSettings, viewport_size: Size) -> Self {
        Self {
            state,
            tool_settings,
            preview: None,
            viewport_size,
            scale_factor: 1.0,
        }
    }

    /// Frame for a canvas, including its in-progress gesture.
    pub fn for_canvas(canvas: &'a Canvas, viewport_size: Size) -> Self {
        Self {
            preview: canvas.preview(),
            ..Self::new(canvas.store.state(), canvas.store.tool_settings(), viewport_size)
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_preview(mut self, preview: Option<Element>) -> Self {
        self.preview = preview;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer: Send + Sync {
    /// Paint one full frame. Must not depend on anything but `ctx`.
    fn build_scene(&mut self, ctx: &RenderContext, surface: &mut dyn Surface);

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        match ctx.state.settings.background {
            BackgroundKind::Transparent => Color::TRANSPARENT,
            _ => ctx.state.settings.background_color.into(),
        }
    }
}

/// Paints canvas state with the per-kind element rules.
#[derive(Debug, Default)]
pub struct SceneRenderer {
    images: ImageCache,
}

fn styled(color: HexColor, opacity: f64) -> Color {
    let color: Color = color.into();
    color.multiply_alpha(opacity.clamp(0.0, 1.0) as f32)
}

fn round_stroke(width: f64) -> Stroke {
    Stroke::new(width).with_caps(Cap::Round).with_join(Join::Round)
}

fn segment(a: Point, b: Point) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(a);
    path.line_to(b);
    path
}

/// Quadratic curve through the midpoints of consecutive samples.
fn smoothed_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let Some((first, rest)) = points.split_first() else {
        return path;
    };
    path.move_to(*first);
    for pair in rest.windows(2) {
        path.quad_to(pair[0], pair[0].midpoint(pair[1]));
    }
    if let Some(last) = rest.last() {
        path.line_to(*last);
    }
    path
}

fn closed_polygon(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    for (i, p) in points.iter().enumerate() {
        if i == 0 {
            path.move_to(*p);
        } else {
            path.line_to(*p);
        }
    }
    path.close_path();
    path
}

/// Shaft plus two head segments at ±30° from the shaft.
fn arrow_path(start: Point, end: Point, stroke_width: f64) -> BezPath {
    let mut path = segment(start, end);
    let head = 5.0 * stroke_width;
    let angle = (end - start).atan2();
    for side in [-FRAC_PI_6, FRAC_PI_6] {
        let theta = angle + side;
        path.move_to(end);
        path.line_to(end - Vec2::new(theta.cos(), theta.sin()) * head);
    }
    path
}

fn speech_bubble(rect: Rect) -> BezPath {
    let mut path = RoundedRect::from_rect(rect, CALLOUT_RADIUS).to_path(0.1);
    let tail_x = rect.x0 + rect.width() * 0.25;
    path.move_to(Point::new(tail_x, rect.y1));
    path.line_to(Point::new(tail_x - 10.0, rect.y1 + 20.0));
    path.line_to(Point::new(tail_x + 15.0, rect.y1));
    path.close_path();
    path
}

fn thought_bubble(rect: Rect) -> BezPath {
    let mut path = Ellipse::from_rect(rect).to_path(0.1);
    let base = Point::new(rect.x0 + rect.width() * 0.25, rect.y1);
    for (offset, r) in [(Vec2::new(-4.0, 8.0), 6.0), (Vec2::new(-12.0, 20.0), 4.0)] {
        path.extend(Circle::new(base + offset, r).path_elements(0.1));
    }
    path
}

impl SceneRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded images held between frames.
    pub fn image_cache(&self) -> &ImageCache {
        &self.images
    }

    fn render_background(&self, settings: &CanvasSettings, viewport: Rect, surface: &mut dyn Surface) {
        if settings.background != BackgroundKind::Transparent {
            surface.fill_path(
                &viewport.to_path(0.1),
                Affine::IDENTITY,
                settings.background_color.into(),
            );
        }
        if !settings.grid_size.is_finite() {
            return;
        }
        // Patterns are laid out in screen space; states that skipped
        // normalization still get a bounded number of marks.
        let step = settings.grid_size.max(MIN_GRID_SIZE);
        let color: Color = settings.grid_color.into();
        let thin = Stroke::new(0.5);

        match settings.background {
            BackgroundKind::White | BackgroundKind::Transparent => {}
            BackgroundKind::Grid => {
                surface.stroke_path(&grid_lines(viewport, step, true, true), Affine::IDENTITY, &thin, color);
            }
            BackgroundKind::Lined => {
                surface.stroke_path(&grid_lines(viewport, step, false, true), Affine::IDENTITY, &thin, color);
            }
            BackgroundKind::Graph => {
                surface.stroke_path(&grid_lines(viewport, step, true, true), Affine::IDENTITY, &thin, color);
                // Major lines every fifth cell.
                surface.stroke_path(
                    &grid_lines(viewport, step * 5.0, true, true),
                    Affine::IDENTITY,
                    &Stroke::new(1.0),
                    color,
                );
            }
            BackgroundKind::Dots => {
                let mut dots = BezPath::new();
                let mut x = viewport.x0;
                while x <= viewport.x1 {
                    let mut y = viewport.y0;
                    while y <= viewport.y1 {
                        dots.extend(Circle::new((x, y), 1.0).path_elements(0.1));
                        y += step;
                    }
                    x += step;
                }
                surface.fill_path(&dots, Affine::IDENTITY, color);
            }
        }
    }

    fn render_element(&mut self, element: &Element, smoothing: f64, transform: Affine, surface: &mut dyn Surface) {
        if !element.is_renderable() {
            return;
        }
        let color = styled(element.color, element.opacity);
        let fill = element.fill_color.map(|c| styled(c, element.opacity));
        let stroke = round_stroke(element.stroke_width);
        let transform = match (element.rotation, element.bounds()) {
            (Some(angle), Some(bounds)) if angle != 0.0 && !element.kind.is_path() => {
                transform * Affine::rotate_about(angle, bounds.center())
            }
            _ => transform,
        };

        match element.kind {
            ElementKind::Pen
            | ElementKind::Brush
            | ElementKind::Pencil
            | ElementKind::Marker
            | ElementKind::Highlighter => {
                let points = element.path_points();
                if smoothing > 0.0 && points.len() >= 3 {
                    surface.stroke_path(&smoothed_path(&points), transform, &stroke, color);
                } else {
                    for (i, pair) in points.windows(2).enumerate() {
                        let width = round_stroke(element.segment_width(i + 1));
                        surface.stroke_path(&segment(pair[0], pair[1]), transform, &width, color);
                    }
                }
            }
            ElementKind::Line => {
                let points = element.path_points();
                surface.stroke_path(&segment(points[0], points[1]), transform, &stroke, color);
            }
            ElementKind::Arrow => {
                let points = element.path_points();
                let path = arrow_path(points[0], points[1], element.stroke_width);
                surface.stroke_path(&path, transform, &stroke, color);
            }
            ElementKind::Measure => {
                let points = element.path_points();
                let (a, b) = (points[0], points[1]);
                let mut path = segment(a, b);
                let normal = (b - a).normalize().turn_90() * 6.0;
                if normal.is_finite() {
                    for end in [a, b] {
                        path.move_to(end - normal);
                        path.line_to(end + normal);
                    }
                }
                surface.stroke_path(&path, transform, &stroke, color);
                let label = format!("{:.0}px", a.distance(b));
                let at = a.midpoint(b) + Vec2::new(8.0, -8.0);
                surface.fill_text(&label, at, 12.0, DEFAULT_FONT_FAMILY, transform, color);
            }
            ElementKind::Rectangle => {
                let Some(size) = element.box_size() else { return };
                let path = Rect::from_origin_size(element.origin(), size).abs().to_path(0.1);
                if let Some(fill) = fill {
                    surface.fill_path(&path, transform, fill);
                }
                surface.stroke_path(&path, transform, &stroke, color);
            }
            ElementKind::Circle => {
                let Some(radius) = element.radius else { return };
                let path = Circle::new(element.origin(), radius.abs()).to_path(0.1);
                if let Some(fill) = fill {
                    surface.fill_path(&path, transform, fill);
                }
                surface.stroke_path(&path, transform, &stroke, color);
            }
            ElementKind::Polygon => {
                let path = closed_polygon(&element.path_points());
                if let Some(fill) = fill {
                    surface.fill_path(&path, transform, fill);
                }
                surface.stroke_path(&path, transform, &stroke, color);
            }
            ElementKind::Text => {
                let Some(text) = element.text.as_deref() else { return };
                surface.fill_text(
                    text,
                    element.origin(),
                    element.font_size.unwrap_or(DEFAULT_FONT_SIZE),
                    element.font_family.as_deref().unwrap_or(DEFAULT_FONT_FAMILY),
                    transform,
                    color,
                );
            }
            ElementKind::StickyNote => {
                let Some(size) = element.box_size() else { return };
                let path = Rect::from_origin_size(element.origin(), size).to_path(0.1);
                let alpha = element.opacity.clamp(0.0, 1.0) as f32;
                surface.fill_path(&path, transform, fill.unwrap_or(NOTE_FILL.multiply_alpha(alpha)));
                surface.stroke_path(&path, transform, &Stroke::new(1.0), NOTE_BORDER.multiply_alpha(alpha));
                if let Some(note) = element.note.as_deref().filter(|n| !n.is_empty()) {
                    surface.fill_text(
                        note,
                        element.origin() + TEXT_INSET,
                        NOTE_FONT_SIZE,
                        DEFAULT_FONT_FAMILY,
                        transform,
                        NOTE_TEXT.multiply_alpha(alpha),
                    );
                }
            }
            ElementKind::Callout => {
                let Some(size) = element.box_size() else { return };
                let rect = Rect::from_origin_size(element.origin(), size);
                let path = match element.callout_type.unwrap_or_default() {
                    CalloutType::Rectangle => rect.to_path(0.1),
                    CalloutType::Rounded => RoundedRect::from_rect(rect, CALLOUT_RADIUS).to_path(0.1),
                    CalloutType::Speech => speech_bubble(rect),
                    CalloutType::Thought => thought_bubble(rect),
                };
                let alpha = element.opacity.clamp(0.0, 1.0) as f32;
                surface.fill_path(&path, transform, fill.unwrap_or(Color::WHITE.multiply_alpha(alpha)));
                surface.stroke_path(&path, transform, &stroke, color);
                if let Some(text) = element.text.as_deref().filter(|t| !t.is_empty()) {
                    surface.fill_text(
                        text,
                        element.origin() + TEXT_INSET,
                        NOTE_FONT_SIZE,
                        DEFAULT_FONT_FAMILY,
                        transform,
                        Color::BLACK.multiply_alpha(alpha),
                    );
                }
            }
            ElementKind::Image => {
                let Some(size) = element.box_size() else { return };
                let rect = Rect::from_origin_size(element.origin(), size);
                let source = element.image_data.as_deref().or(element.image_url.as_deref());
                match source.and_then(|s| self.images.get(s)) {
                    Some(image) => surface.draw_image(&image, rect, transform),
                    None => render_image_placeholder(rect, transform, surface),
                }
            }
            ElementKind::Unknown => {}
        }
    }
}

/// Lines across `viewport` every `step` pixels.
fn grid_lines(viewport: Rect, step: f64, vertical: bool, horizontal: bool) -> BezPath {
    let mut path = BezPath::new();
    if vertical {
        let mut x = viewport.x0;
        while x <= viewport.x1 {
            path.extend(Line::new((x, viewport.y0), (x, viewport.y1)).path_elements(0.1));
            x += step;
        }
    }
    if horizontal {
        let mut y = viewport.y0;
        while y <= viewport.y1 {
            path.extend(Line::new((viewport.x0, y), (viewport.x1, y)).path_elements(0.1));
            y += step;
        }
    }
    path
}

/// Gray box with an X for images that couldn't be loaded.
fn render_image_placeholder(rect: Rect, transform: Affine, surface: &mut dyn Surface) {
    let rect_path = rect.to_path(0.1);
    surface.fill_path(&rect_path, transform, Color::from_rgba8(200, 200, 200, 255));

    let stroke = Stroke::new(2.0);
    let mut x_path = segment(Point::new(rect.x0, rect.y0), Point::new(rect.x1, rect.y1));
    x_path.move_to(Point::new(rect.x1, rect.y0));
    x_path.line_to(Point::new(rect.x0, rect.y1));
    surface.stroke_path(&x_path, transform, &stroke, Color::from_rgba8(150, 150, 150, 255));

    surface.stroke_path(&rect_path, transform, &stroke, Color::from_rgba8(100, 100, 100, 255));
}

impl Renderer for SceneRenderer {
    fn build_scene(&mut self, ctx: &RenderContext, surface: &mut dyn Surface) {
        let settings = &ctx.state.settings;
        let viewport = Rect::from_origin_size(Point::ZERO, ctx.viewport_size);

        surface.clear(Color::TRANSPARENT);
        self.render_background(settings, viewport, surface);

        let transform = Affine::scale(ctx.scale_factor) * ctx.state.camera.transform();
        let smoothing = ctx.tool_settings.smoothing;

        for layer in ctx.state.visible_layers() {
            surface.push_layer(layer.opacity.clamp(0.0, 1.0) as f32, layer.blend_mode.into());
            for element in &layer.elements {
                self.render_element(element, smoothing, transform, surface);
            }
            surface.pop_layer();
        }

        if let Some(preview) = &ctx.preview {
            self.render_element(preview, smoothing, transform, surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PIXEL_PNG;
    use crate::pixmap::PixmapSurface;
    use crate::recording::{DrawCommand, RecordingSurface};
    use kurbo::PathEl;
    use inkroom_core::document::{CanvasPatch, DocumentStore};
    use inkroom_core::element::StrokePoint;
    use inkroom_core::layer::Layer;
    use inkroom_core::settings::SettingsPatch;

    fn viewport() -> Size {
        Size::new(400.0, 300.0)
    }

    fn render(store: &DocumentStore) -> Vec<DrawCommand> {
        let mut renderer = SceneRenderer::new();
        let mut surface = RecordingSurface::new(viewport());
        let ctx = RenderContext::new(store.state(), store.tool_settings(), viewport());
        renderer.build_scene(&ctx, &mut surface);
        surface.take_commands()
    }

    fn strokes(commands: &[DrawCommand]) -> usize {
        commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Stroke { .. }))
            .count()
    }

    #[test]
    fn test_empty_document_paints_background() {
        let store = DocumentStore::new();
        let commands = render(&store);
        assert!(matches!(commands[0], DrawCommand::Clear(_)));
        assert!(matches!(
            &commands[1],
            DrawCommand::Fill { color, .. } if *color == Color::WHITE
        ));
        // One group for the default layer.
        assert!(commands.contains(&DrawCommand::PopLayer));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let mut store = DocumentStore::new();
        store.add_element(Element::rectangle(10.0, 10.0, 50.0, 40.0));
        store.add_element(Element::text(Point::new(5.0, 5.0), "hello"));

        let mut renderer = SceneRenderer::new();
        let mut surface = RecordingSurface::new(viewport());
        let ctx = RenderContext::new(store.state(), store.tool_settings(), viewport());
        renderer.build_scene(&ctx, &mut surface);
        let first = surface.take_commands();
        renderer.build_scene(&ctx, &mut surface);
        assert_eq!(first, surface.take_commands());
    }

    #[test]
    fn test_rectangle_fill_then_stroke() {
        let mut store = DocumentStore::new();
        let mut rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        rect.fill_color = Some(HexColor::rgb(255, 0, 0));
        store.add_element(rect);

        let commands = render(&store);
        let push = commands
            .iter()
            .position(|c| matches!(c, DrawCommand::PushLayer { .. }))
            .unwrap();
        assert!(matches!(commands[push + 1], DrawCommand::Fill { .. }));
        assert!(matches!(commands[push + 2], DrawCommand::Stroke { .. }));
    }

    #[test]
    fn test_layers_paint_by_order_and_skip_hidden() {
        let mut top = Layer::with_id("top", "Top", 2);
        top.elements.push(Element::text(Point::new(0.0, 0.0), "top"));
        let mut bottom = Layer::with_id("bottom", "Bottom", 1);
        bottom.elements.push(Element::text(Point::new(0.0, 0.0), "bottom"));
        let mut hidden = Layer::with_id("hidden", "Hidden", 0);
        hidden.visible = false;
        hidden.elements.push(Element::text(Point::new(0.0, 0.0), "hidden"));

        let mut store = DocumentStore::new();
        store.load_canvas(CanvasPatch::layers(vec![top, hidden, bottom]));

        let mut renderer = SceneRenderer::new();
        let mut surface = RecordingSurface::new(viewport());
        let ctx = RenderContext::new(store.state(), store.tool_settings(), viewport());
        renderer.build_scene(&ctx, &mut surface);
        assert_eq!(surface.texts(), vec!["bottom", "top"]);
    }

    #[test]
    fn test_layer_opacity_and_element_opacity() {
        let mut layer = Layer::with_id("l", "L", 0);
        layer.opacity = 0.5;
        let mut line = Element::with_points(
            ElementKind::Line,
            vec![StrokePoint::new(0.0, 0.0), StrokePoint::new(10.0, 0.0)],
        );
        line.opacity = 0.5;
        layer.elements.push(line);
        let mut store = DocumentStore::new();
        store.load_canvas(CanvasPatch::layers(vec![layer]));

        let commands = render(&store);
        assert!(commands.contains(&DrawCommand::PushLayer {
            opacity: 0.5,
            blend: peniko::Mix::Normal
        }));
        let stroke_alpha = commands.iter().find_map(|c| match c {
            DrawCommand::Stroke { color, .. } => Some(color.components[3]),
            _ => None,
        });
        assert_eq!(stroke_alpha, Some(0.5));
    }

    #[test]
    fn test_unrenderable_elements_are_skipped() {
        let mut store = DocumentStore::new();
        store.add_element(Element::new(ElementKind::Rectangle));
        store.add_element(Element::new(ElementKind::Unknown));
        store.add_element(Element::with_points(ElementKind::Pen, vec![StrokePoint::new(1.0, 1.0)]));
        assert_eq!(strokes(&render(&store)), 0);
    }

    #[test]
    fn test_pressure_segments_without_smoothing() {
        let mut store = DocumentStore::new();
        store.update_tool_settings(inkroom_core::settings::ToolSettingsPatch {
            smoothing: Some(0.0),
            ..Default::default()
        });
        let mut pen = Element::with_points(
            ElementKind::Pen,
            vec![
                StrokePoint::new(0.0, 0.0).with_pressure(1.0),
                StrokePoint::new(5.0, 0.0).with_pressure(0.5),
                StrokePoint::new(10.0, 0.0).with_pressure(0.75),
                StrokePoint::new(15.0, 0.0).with_pressure(2.0),
            ],
        );
        pen.stroke_width = 4.0;
        pen.pressure = true;
        store.add_element(pen);

        let widths: Vec<f64> = render(&store)
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Stroke { width, .. } => Some(*width),
                _ => None,
            })
            .collect();
        // Out-of-range pressure is clamped to 1 when the point is built.
        assert_eq!(widths, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_smoothed_path_is_single_stroke() {
        let mut store = DocumentStore::new();
        store.add_element(Element::with_points(
            ElementKind::Pen,
            (0..5).map(|i| StrokePoint::new(i as f64 * 3.0, 0.0)).collect(),
        ));
        assert_eq!(strokes(&render(&store)), 1);
    }

    #[test]
    fn test_arrow_head_geometry() {
        let path = arrow_path(Point::new(0.0, 0.0), Point::new(100.0, 0.0), 2.0);
        let ends: Vec<Point> = path
            .elements()
            .iter()
            .filter_map(|el| match el {
                kurbo::PathEl::LineTo(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(ends.len(), 3);
        for head in &ends[1..] {
            assert!((head.distance(Point::new(100.0, 0.0)) - 10.0).abs() < 1e-9);
            assert!((head.y.abs() - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sticky_note_defaults() {
        let mut store = DocumentStore::new();
        let mut note = Element::boxed(ElementKind::StickyNote, Point::new(10.0, 20.0), None);
        note.note = Some("remember".into());
        store.add_element(note);

        let commands = render(&store);
        let fill = commands.iter().rev().find_map(|c| match c {
            DrawCommand::Fill { path, color, .. } => Some((path.bounding_box(), *color)),
            _ => None,
        });
        let (bounds, color) = fill.unwrap();
        assert_eq!(bounds, Rect::new(10.0, 20.0, 160.0, 170.0));
        assert_eq!(color, NOTE_FILL);
        let text = commands.iter().find_map(|c| match c {
            DrawCommand::Text { text, origin, font_size, .. } => Some((text.clone(), *origin, *font_size)),
            _ => None,
        });
        assert_eq!(text, Some(("remember".into(), Point::new(20.0, 45.0), 14.0)));
    }

    #[test]
    fn test_image_decodes_or_falls_back() {
        let mut store = DocumentStore::new();
        let mut good = Element::boxed(ElementKind::Image, Point::ZERO, Some(Size::new(20.0, 20.0)));
        good.image_data = Some(PIXEL_PNG.to_string());
        let mut remote = Element::boxed(ElementKind::Image, Point::ZERO, None);
        remote.image_url = Some("https://example.com/cat.png".into());
        store.add_element(good);
        store.add_element(remote);

        let commands = render(&store);
        let images = commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Image { .. }))
            .count();
        assert_eq!(images, 1);
        // Placeholder: box fill, X, border.
        assert_eq!(strokes(&commands), 2);
    }

    #[test]
    fn test_camera_transform_applied() {
        let mut store = DocumentStore::new();
        store.set_zoom(2.0);
        store.add_element(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        let commands = render(&store);
        let transform = commands.iter().find_map(|c| match c {
            DrawCommand::Stroke { transform, .. } => Some(*transform),
            _ => None,
        });
        assert_eq!(transform.map(|t| t * Point::new(10.0, 10.0)), Some(Point::new(20.0, 20.0)));
    }

    #[test]
    fn test_background_patterns() {
        let mut store = DocumentStore::new();
        store.update_settings(SettingsPatch {
            background: Some(BackgroundKind::Transparent),
            ..Default::default()
        });
        let commands = render(&store);
        assert!(!commands.iter().any(|c| matches!(c, DrawCommand::Fill { .. })));

        store.update_settings(SettingsPatch {
            background: Some(BackgroundKind::Grid),
            ..Default::default()
        });
        let commands = render(&store);
        assert!(matches!(
            &commands[2],
            DrawCommand::Stroke { width, transform, .. } if *width == 0.5 && *transform == Affine::IDENTITY
        ));
    }

    #[test]
    fn test_tiny_grid_size_stays_bounded() {
        let mut state = CanvasState::default();
        state.settings.background = BackgroundKind::Dots;
        state.settings.grid_size = 0.01;
        let tools = ToolSettings::default();
        let mut renderer = SceneRenderer::new();
        let mut surface = RecordingSurface::new(viewport());
        renderer.build_scene(&RenderContext::new(&state, &tools, viewport()), &mut surface);

        let commands = surface.take_commands();
        let DrawCommand::Fill { path, .. } = &commands[2] else {
            panic!("expected dot fill, got {:?}", commands[2]);
        };
        let dots = path
            .elements()
            .iter()
            .filter(|el| matches!(el, PathEl::MoveTo(_)))
            .count();
        // 400x300 viewport at the minimum spacing of 2.
        assert_eq!(dots, 201 * 151);

        state.settings.background = BackgroundKind::Graph;
        state.settings.grid_size = 1e-12;
        renderer.build_scene(&RenderContext::new(&state, &tools, viewport()), &mut surface);
        assert!(strokes(&surface.take_commands()) >= 2);
    }

    #[test]
    fn test_pixmap_rendering_is_idempotent() {
        let mut store = DocumentStore::new();
        let mut rect = Element::rectangle(4.0, 4.0, 30.0, 20.0);
        rect.fill_color = Some(HexColor::rgb(255, 0, 0));
        store.add_element(rect);
        store.add_element(Element::with_points(
            ElementKind::Pen,
            vec![
                StrokePoint::new(2.0, 50.0),
                StrokePoint::new(20.0, 40.0),
                StrokePoint::new(40.0, 60.0),
            ],
        ));
        store.add_element(Element::circle(Point::new(48.0, 16.0), 10.0));

        let size = Size::new(64.0, 64.0);
        let mut renderer = SceneRenderer::new();
        let ctx = RenderContext::new(store.state(), store.tool_settings(), size);
        let mut surface = PixmapSurface::new(64, 64).unwrap();
        renderer.build_scene(&ctx, &mut surface);
        let first = surface.to_rgba();
        renderer.build_scene(&ctx, &mut surface);
        assert_eq!(first, surface.to_rgba());

        let mut fresh = PixmapSurface::new(64, 64).unwrap();
        SceneRenderer::new().build_scene(&ctx, &mut fresh);
        assert_eq!(first, fresh.to_rgba());
        assert_eq!(surface.pixel(10, 10), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_preview_painted_last() {
        let mut store = DocumentStore::new();
        store.add_element(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        let mut renderer = SceneRenderer::new();
        let mut surface = RecordingSurface::new(viewport());
        let ctx = RenderContext::new(store.state(), store.tool_settings(), viewport())
            .with_preview(Some(Element::text(Point::new(1.0, 1.0), "draft")));
        renderer.build_scene(&ctx, &mut surface);
        assert!(matches!(
            surface.commands().last(),
            Some(DrawCommand::Text { text, .. }) if text == "draft"
        ));
    }
}
