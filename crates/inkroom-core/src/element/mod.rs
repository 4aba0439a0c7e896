//! Drawing elements: the primitives stored inside layers.
//!
//! Elements use a flat record layout that matches the persisted JSON shape
//! (camelCase keys, `type` as the kind tag). Geometry fields are optional; an
//! element whose geometry is incomplete for its kind is kept in the document
//! but skipped when painting.

mod color;
mod geometry;

pub use color::{HexColor, InvalidColor};
pub use geometry::{
    bounding_rect, direction, point_to_polyline_dist, point_to_segment_dist, polygon_contains,
};

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an element. Persisted documents use free-form strings.
pub type ElementId = String;

/// Default box of a sticky note when none was dragged out.
pub const STICKY_NOTE_SIZE: Size = Size::new(150.0, 150.0);
/// Default box of a callout when none was dragged out.
pub const CALLOUT_SIZE: Size = Size::new(200.0, 100.0);
/// Default box of an image element without explicit dimensions.
pub const IMAGE_SIZE: Size = Size::new(200.0, 150.0);

pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
pub const DEFAULT_FONT_SIZE: f64 = 16.0;
pub const NOTE_FONT_SIZE: f64 = 14.0;

/// The closed set of element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Pen,
    Brush,
    Pencil,
    Marker,
    Highlighter,
    Line,
    Rectangle,
    Circle,
    Arrow,
    Text,
    StickyNote,
    Callout,
    Image,
    Polygon,
    Measure,
    /// A kind written by a newer or foreign client. Never rendered.
    #[serde(other)]
    Unknown,
}

impl ElementKind {
    /// Freehand kinds drawn from a sequence of sampled points.
    pub fn is_path(self) -> bool {
        matches!(
            self,
            Self::Pen | Self::Brush | Self::Pencil | Self::Marker | Self::Highlighter
        )
    }

    /// Kinds defined by a start and an end point.
    pub fn is_segment(self) -> bool {
        matches!(self, Self::Line | Self::Arrow | Self::Measure)
    }

    /// Kinds laid out as an axis-aligned box from `x`/`y`.
    pub fn is_boxed(self) -> bool {
        matches!(
            self,
            Self::Rectangle | Self::StickyNote | Self::Callout | Self::Image
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pen => "pen",
            Self::Brush => "brush",
            Self::Pencil => "pencil",
            Self::Marker => "marker",
            Self::Highlighter => "highlighter",
            Self::Line => "line",
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Arrow => "arrow",
            Self::Text => "text",
            Self::StickyNote => "sticky-note",
            Self::Callout => "callout",
            Self::Image => "image",
            Self::Polygon => "polygon",
            Self::Measure => "measure",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PenType {
    #[default]
    Ballpoint,
    Fountain,
    Marker,
    Highlighter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrushType {
    #[default]
    Round,
    Flat,
    Textured,
    Spray,
}

/// Outline of a callout bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalloutType {
    Rectangle,
    #[default]
    Rounded,
    Speech,
    Thought,
}

/// Stylus tilt in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tilt {
    pub x: f64,
    pub y: f64,
}

/// A sampled input position in document space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt: Option<Tilt>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            pressure: None,
            tilt: None,
            timestamp: None,
        }
    }

    /// Attach a pressure reading, clamped to `[0, 1]`.
    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = pressure.is_finite().then(|| pressure.clamp(0.0, 1.0));
        self
    }

    pub fn with_tilt(mut self, tilt: Tilt) -> Self {
        self.tilt = Some(tilt);
        self
    }

    pub fn with_timestamp(mut self, millis: u64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Same sample at a different position.
    pub fn moved_to(mut self, point: Point) -> Self {
        self.x = point.x;
        self.y = point.y;
        self
    }
}

impl From<Point> for StrokePoint {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

fn default_stroke_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}

fn default_opacity() -> f64 {
    1.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A single drawing element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default)]
    pub layer_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<StrokePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default)]
    pub color: HexColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<HexColor>,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callout_type: Option<CalloutType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pen_type: Option<PenType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brush_type: Option<BrushType>,
    /// Whether stroke width follows per-point pressure.
    #[serde(default, skip_serializing_if = "is_false")]
    pub pressure: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
}

/// Generate a fresh element id.
pub fn new_element_id() -> ElementId {
    format!("element-{}", Uuid::new_v4())
}

impl Element {
    /// An element of the given kind with default style and no geometry.
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: new_element_id(),
            kind,
            layer_id: String::new(),
            points: Vec::new(),
            x: None,
            y: None,
            width: None,
            height: None,
            radius: None,
            color: HexColor::BLACK,
            fill_color: None,
            stroke_width: DEFAULT_STROKE_WIDTH,
            opacity: 1.0,
            rotation: None,
            text: None,
            font_size: None,
            font_family: None,
            note: None,
            callout_type: None,
            image_url: None,
            image_data: None,
            pen_type: None,
            brush_type: None,
            pressure: false,
            locked: false,
        }
    }

    /// A point-sequence element (freehand, segment or polygon kinds).
    pub fn with_points(kind: ElementKind, points: Vec<StrokePoint>) -> Self {
        let mut element = Self::new(kind);
        element.points = points;
        element.x = Some(0.0);
        element.y = Some(0.0);
        element
    }

    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        let mut element = Self::new(ElementKind::Rectangle);
        element.x = Some(x);
        element.y = Some(y);
        element.width = Some(width);
        element.height = Some(height);
        element
    }

    pub fn circle(center: Point, radius: f64) -> Self {
        let mut element = Self::new(ElementKind::Circle);
        element.x = Some(center.x);
        element.y = Some(center.y);
        element.radius = Some(radius);
        element
    }

    pub fn text(position: Point, text: impl Into<String>) -> Self {
        let mut element = Self::new(ElementKind::Text);
        element.x = Some(position.x);
        element.y = Some(position.y);
        element.text = Some(text.into());
        element
    }

    /// A boxed container (sticky note, callout, image) anchored at `origin`.
    pub fn boxed(kind: ElementKind, origin: Point, size: Option<Size>) -> Self {
        let mut element = Self::new(kind);
        element.x = Some(origin.x);
        element.y = Some(origin.y);
        if let Some(size) = size {
            element.width = Some(size.width);
            element.height = Some(size.height);
        }
        element
    }

    /// Position, defaulting missing coordinates to zero.
    pub fn origin(&self) -> Point {
        Point::new(self.x.unwrap_or(0.0), self.y.unwrap_or(0.0))
    }

    /// Sample positions as plain points.
    pub fn path_points(&self) -> Vec<Point> {
        self.points.iter().map(StrokePoint::point).collect()
    }

    /// Effective box size of boxed kinds, applying per-kind defaults.
    pub fn box_size(&self) -> Option<Size> {
        let fallback = match self.kind {
            ElementKind::StickyNote => STICKY_NOTE_SIZE,
            ElementKind::Callout => CALLOUT_SIZE,
            ElementKind::Image => IMAGE_SIZE,
            ElementKind::Rectangle => {
                return Some(Size::new(self.width?, self.height?));
            }
            _ => return None,
        };
        let width = self.width.filter(|w| *w != 0.0).unwrap_or(fallback.width);
        let height = self.height.filter(|h| *h != 0.0).unwrap_or(fallback.height);
        Some(Size::new(width, height))
    }

    /// Whether the element carries the geometry its kind needs to be painted.
    pub fn is_renderable(&self) -> bool {
        use ElementKind::*;
        match self.kind {
            Pen | Brush | Pencil | Marker | Highlighter => self.points.len() >= 2,
            Line | Arrow | Measure => self.points.len() >= 2,
            Polygon => self.points.len() >= 3,
            Rectangle => self.width.is_some() && self.height.is_some(),
            Circle => self.radius.is_some(),
            Text => self.text.as_deref().is_some_and(|t| !t.is_empty()),
            StickyNote | Callout => true,
            Image => self.image_data.is_some() || self.image_url.is_some(),
            Unknown => false,
        }
    }

    /// Axis-aligned bounds in document space, when geometry is present.
    pub fn bounds(&self) -> Option<Rect> {
        use ElementKind::*;
        let rect = match self.kind {
            Pen | Brush | Pencil | Marker | Highlighter | Line | Arrow | Measure | Polygon => {
                bounding_rect(self.points.iter().map(StrokePoint::point))?
            }
            Rectangle | StickyNote | Callout | Image => {
                let size = self.box_size()?;
                Rect::from_origin_size(self.origin(), size).abs()
            }
            Circle => {
                let r = self.radius?.abs();
                Rect::from_center_size(self.origin(), Size::new(r * 2.0, r * 2.0))
            }
            Text => {
                let text = self.text.as_deref().filter(|t| !t.is_empty())?;
                let size = self.font_size.unwrap_or(DEFAULT_FONT_SIZE);
                let width = text.chars().count() as f64 * size * 0.6;
                let origin = self.origin();
                // Text is anchored at its baseline.
                Rect::new(origin.x, origin.y - size, origin.x + width, origin.y + size * 0.25)
            }
            Unknown => return None,
        };
        Some(rect)
    }

    /// Whether `point` touches the element within `tolerance`.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        use ElementKind::*;
        let reach = tolerance + self.stroke_width.max(0.0) / 2.0;
        match self.kind {
            Pen | Brush | Pencil | Marker | Highlighter => {
                point_to_polyline_dist(point, &self.path_points()) <= reach
            }
            Line | Arrow | Measure => match self.points.as_slice() {
                [a, b, ..] => point_to_segment_dist(point, a.point(), b.point()) <= reach,
                _ => false,
            },
            Polygon => {
                let ring = self.path_points();
                if ring.len() < 3 {
                    return false;
                }
                if self.fill_color.is_some() && polygon_contains(point, &ring) {
                    return true;
                }
                let mut closed = ring.clone();
                closed.push(ring[0]);
                point_to_polyline_dist(point, &closed) <= reach
            }
            Circle => {
                let Some(r) = self.radius else { return false };
                let dist = (point - self.origin()).hypot();
                if self.fill_color.is_some() {
                    dist <= r.abs() + reach
                } else {
                    (dist - r.abs()).abs() <= reach
                }
            }
            Rectangle | StickyNote | Callout | Image | Text => self
                .bounds()
                .is_some_and(|b| b.inflate(reach, reach).contains(point)),
            Unknown => false,
        }
    }

    /// Move the element's position and every sample point.
    pub fn translate(&mut self, delta: Vec2) {
        if let Some(x) = self.x.as_mut() {
            *x += delta.x;
        }
        if let Some(y) = self.y.as_mut() {
            *y += delta.y;
        }
        for p in &mut self.points {
            p.x += delta.x;
            p.y += delta.y;
        }
    }

    /// Pressure-scaled width of the segment ending at `index`.
    pub fn segment_width(&self, index: usize) -> f64 {
        if !self.pressure {
            return self.stroke_width;
        }
        match self.points.get(index).and_then(|p| p.pressure) {
            Some(p) if p > 0.0 => self.stroke_width * p,
            _ => self.stroke_width,
        }
    }
}

/// A partial update to an element. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementPatch {
    pub points: Option<Vec<StrokePoint>>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub radius: Option<f64>,
    pub color: Option<HexColor>,
    pub fill_color: Option<HexColor>,
    pub stroke_width: Option<f64>,
    pub opacity: Option<f64>,
    pub rotation: Option<f64>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub note: Option<String>,
    pub callout_type: Option<CalloutType>,
    pub image_url: Option<String>,
    pub image_data: Option<String>,
    pub locked: Option<bool>,
}

impl ElementPatch {
    /// Merge the set fields into `element`.
    ///
    /// Opacity is clamped to `[0, 1]`; a non-positive stroke width is ignored.
    pub fn apply(self, element: &mut Element) {
        if let Some(points) = self.points {
            element.points = points;
        }
        macro_rules! merge {
            ($($field:ident),*) => {
                $(if self.$field.is_some() { element.$field = self.$field; })*
            };
        }
        merge!(
            x, y, width, height, radius, fill_color, rotation, text, font_size, font_family,
            note, callout_type, image_url, image_data
        );
        if let Some(color) = self.color {
            element.color = color;
        }
        if let Some(width) = self.stroke_width.filter(|w| *w > 0.0) {
            element.stroke_width = width;
        }
        if let Some(opacity) = self.opacity.filter(|o| o.is_finite()) {
            element.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(locked) = self.locked {
            element.locked = locked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<StrokePoint> {
        coords.iter().map(|&(x, y)| StrokePoint::new(x, y)).collect()
    }

    #[test]
    fn test_renderable_rules() {
        assert!(!Element::with_points(ElementKind::Pen, pts(&[(0.0, 0.0)])).is_renderable());
        assert!(Element::with_points(ElementKind::Pen, pts(&[(0.0, 0.0), (1.0, 1.0)])).is_renderable());
        assert!(!Element::with_points(ElementKind::Polygon, pts(&[(0.0, 0.0), (1.0, 1.0)])).is_renderable());
        assert!(!Element::new(ElementKind::Rectangle).is_renderable());
        assert!(Element::rectangle(0.0, 0.0, 0.0, 0.0).is_renderable());
        assert!(!Element::new(ElementKind::Circle).is_renderable());
        assert!(!Element::text(Point::ZERO, "").is_renderable());
        assert!(Element::text(Point::ZERO, "hi").is_renderable());
        assert!(Element::new(ElementKind::StickyNote).is_renderable());
        assert!(Element::new(ElementKind::Callout).is_renderable());
        assert!(!Element::new(ElementKind::Image).is_renderable());
        assert!(!Element::new(ElementKind::Unknown).is_renderable());
    }

    #[test]
    fn test_json_shape() {
        let mut rect = Element::rectangle(10.0, 10.0, 100.0, 50.0);
        rect.id = "element-1".into();
        rect.layer_id = "layer-1".into();
        rect.fill_color = Some(HexColor::WHITE);
        let json = serde_json::to_value(&rect).unwrap();
        assert_eq!(json["type"], "rectangle");
        assert_eq!(json["layerId"], "layer-1");
        assert_eq!(json["fillColor"], "#ffffff");
        assert_eq!(json["strokeWidth"], 2.0);
        assert!(json.get("points").is_none());

        let back: Element = serde_json::from_value(json).unwrap();
        assert_eq!(back, rect);
    }

    #[test]
    fn test_deserialize_sparse_and_unknown() {
        let el: Element =
            serde_json::from_str(r#"{"id":"a","type":"sticky-note","x":5,"y":6}"#).unwrap();
        assert_eq!(el.kind, ElementKind::StickyNote);
        assert_eq!(el.color, HexColor::BLACK);
        assert_eq!(el.stroke_width, DEFAULT_STROKE_WIDTH);
        assert_eq!(el.opacity, 1.0);

        let odd: Element = serde_json::from_str(r#"{"id":"b","type":"laser"}"#).unwrap();
        assert_eq!(odd.kind, ElementKind::Unknown);
        assert!(!odd.is_renderable());
        assert!(odd.bounds().is_none());
    }

    #[test]
    fn test_bounds_defaults() {
        let note = Element::boxed(ElementKind::StickyNote, Point::new(10.0, 20.0), None);
        assert_eq!(note.bounds(), Some(Rect::new(10.0, 20.0, 160.0, 170.0)));

        let callout = Element::boxed(ElementKind::Callout, Point::ZERO, None);
        assert_eq!(callout.bounds(), Some(Rect::new(0.0, 0.0, 200.0, 100.0)));

        let circle = Element::circle(Point::new(5.0, 5.0), 5.0);
        assert_eq!(circle.bounds(), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_hit_test() {
        let line = Element::with_points(ElementKind::Line, pts(&[(0.0, 0.0), (100.0, 0.0)]));
        assert!(line.hit_test(Point::new(50.0, 3.0), 2.0));
        assert!(!line.hit_test(Point::new(50.0, 10.0), 2.0));

        let ring = Element::circle(Point::ZERO, 10.0);
        assert!(ring.hit_test(Point::new(10.0, 0.0), 1.0));
        assert!(!ring.hit_test(Point::ZERO, 1.0));

        let mut disc = ring.clone();
        disc.fill_color = Some(HexColor::WHITE);
        assert!(disc.hit_test(Point::ZERO, 1.0));

        let rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        assert!(rect.hit_test(Point::new(5.0, 5.0), 0.0));
    }

    #[test]
    fn test_translate_moves_points_and_origin() {
        let mut el = Element::with_points(ElementKind::Pen, pts(&[(1.0, 1.0), (2.0, 3.0)]));
        el.translate(Vec2::new(20.0, 20.0));
        assert_eq!(el.origin(), Point::new(20.0, 20.0));
        assert_eq!(el.path_points(), vec![Point::new(21.0, 21.0), Point::new(22.0, 23.0)]);
    }

    #[test]
    fn test_segment_width_uses_pressure_only_when_flagged() {
        let mut el = Element::with_points(
            ElementKind::Pen,
            vec![StrokePoint::new(0.0, 0.0), StrokePoint::new(1.0, 0.0).with_pressure(0.5)],
        );
        el.stroke_width = 4.0;
        assert_eq!(el.segment_width(1), 4.0);
        el.pressure = true;
        assert_eq!(el.segment_width(1), 2.0);
    }

    #[test]
    fn test_patch_merges_and_clamps() {
        let mut el = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        ElementPatch {
            width: Some(40.0),
            opacity: Some(3.0),
            stroke_width: Some(-1.0),
            ..Default::default()
        }
        .apply(&mut el);
        assert_eq!(el.width, Some(40.0));
        assert_eq!(el.height, Some(10.0));
        assert_eq!(el.opacity, 1.0);
        assert_eq!(el.stroke_width, DEFAULT_STROKE_WIDTH);
    }

    #[test]
    fn test_pressure_clamped() {
        assert_eq!(StrokePoint::new(0.0, 0.0).with_pressure(1.7).pressure, Some(1.0));
        assert_eq!(StrokePoint::new(0.0, 0.0).with_pressure(f64::NAN).pressure, None);
    }
}
