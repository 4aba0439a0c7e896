//! Tool state machine turning pointer input into document edits.
//!
//! All coordinates here are document space; the editor session converts
//! screen input before calling in.

use crate::document::DocumentStore;
use crate::element::{Element, ElementId, ElementKind, StrokePoint};
use crate::settings::{CanvasSettings, ToolSettings};
use crate::snap::snap_to_grid;
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Minimum stroke width of highlighter strokes.
pub const HIGHLIGHTER_MIN_WIDTH: f64 = 12.0;

/// Extra reach, in document units, used by select and eraser hit tests.
pub const HIT_TOLERANCE: f64 = 4.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    #[default]
    Pen,
    Brush,
    Pencil,
    Marker,
    Highlighter,
    Eraser,
    Select,
    Rectangle,
    Circle,
    Line,
    Arrow,
    Polygon,
    Text,
    StickyNote,
    Callout,
    Image,
    Measure,
}

impl ToolKind {
    /// The element kind this tool produces from a drag, if any.
    pub fn element_kind(self) -> Option<ElementKind> {
        Some(match self {
            Self::Pen => ElementKind::Pen,
            Self::Brush => ElementKind::Brush,
            Self::Pencil => ElementKind::Pencil,
            Self::Marker => ElementKind::Marker,
            Self::Highlighter => ElementKind::Highlighter,
            Self::Rectangle => ElementKind::Rectangle,
            Self::Circle => ElementKind::Circle,
            Self::Line => ElementKind::Line,
            Self::Arrow => ElementKind::Arrow,
            Self::Measure => ElementKind::Measure,
            Self::StickyNote => ElementKind::StickyNote,
            Self::Callout => ElementKind::Callout,
            // Text, polygons and images need content the pointer can't supply.
            Self::Polygon | Self::Text | Self::Image | Self::Select | Self::Eraser => {
                return None;
            }
        })
    }

    /// Freehand tools that accumulate every sampled point.
    pub fn is_freehand(self) -> bool {
        self.element_kind().is_some_and(ElementKind::is_path)
    }

    /// Tools whose points follow the grid when snapping is on.
    fn snaps(self) -> bool {
        self.element_kind().is_some_and(|k| !k.is_path())
    }
}

/// State of a pointer interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolState {
    #[default]
    Idle,
    Drawing {
        tool: ToolKind,
        origin: StrokePoint,
        current: StrokePoint,
        /// Samples collected so far (freehand tools only).
        points: Vec<StrokePoint>,
        /// Elements removed by this eraser gesture.
        erased: usize,
    },
}

/// What a pointer event did.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    /// Nothing happened.
    Ignored,
    /// A gesture started; nothing committed yet.
    Started,
    /// The in-progress preview changed.
    Preview,
    /// An element was added to the document.
    Committed(ElementId),
    /// The selection was replaced.
    Selected(Vec<ElementId>),
    /// The eraser removed this many elements.
    Erased(usize),
    /// A gesture ended without committing anything.
    Finished,
    /// A gesture was aborted.
    Cancelled,
}

/// Drives one tool interaction at a time.
#[derive(Debug, Clone)]
pub struct ToolManager {
    state: ToolState,
    hit_tolerance: f64,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolManager {
    pub fn new() -> Self {
        Self::with_tolerance(HIT_TOLERANCE)
    }

    pub fn with_tolerance(hit_tolerance: f64) -> Self {
        Self {
            state: ToolState::Idle,
            hit_tolerance,
        }
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Drawing { .. })
    }

    pub fn pointer_down(&mut self, store: &mut DocumentStore, sample: StrokePoint) -> ToolEvent {
        let tool = store.active_tool();
        let sample = snap_sample(tool, sample, store.settings());
        let points = if tool.is_freehand() {
            vec![sample]
        } else {
            Vec::new()
        };
        self.state = ToolState::Drawing {
            tool,
            origin: sample,
            current: sample,
            points,
            erased: 0,
        };
        if tool == ToolKind::Eraser {
            return self.erase_at(store, sample.point());
        }
        ToolEvent::Started
    }

    pub fn pointer_move(&mut self, store: &mut DocumentStore, sample: StrokePoint) -> ToolEvent {
        let tool = match &self.state {
            ToolState::Drawing { tool, .. } => *tool,
            ToolState::Idle => return ToolEvent::Ignored,
        };
        let sample = snap_sample(tool, sample, store.settings());
        if let ToolState::Drawing {
            current, points, ..
        } = &mut self.state
        {
            *current = sample;
            if tool.is_freehand() {
                points.push(sample);
            }
        }
        match tool {
            ToolKind::Eraser => self.erase_at(store, sample.point()),
            ToolKind::Select => ToolEvent::Ignored,
            _ => ToolEvent::Preview,
        }
    }

    /// Finish the gesture, committing at most one element.
    pub fn pointer_up(&mut self, store: &mut DocumentStore, sample: StrokePoint) -> ToolEvent {
        let ToolState::Drawing {
            tool,
            origin,
            points,
            erased,
            ..
        } = std::mem::take(&mut self.state)
        else {
            return ToolEvent::Ignored;
        };
        let release = snap_sample(tool, sample, store.settings());
        match tool {
            ToolKind::Eraser => ToolEvent::Erased(erased),
            ToolKind::Select => {
                let hit = store
                    .elements_at(release.point(), self.hit_tolerance)
                    .into_iter()
                    .next();
                match hit {
                    Some(id) => {
                        store.select_elements(vec![id.clone()]);
                        ToolEvent::Selected(vec![id])
                    }
                    None => {
                        store.clear_selection();
                        ToolEvent::Selected(Vec::new())
                    }
                }
            }
            _ => {
                let element = build_element(
                    tool,
                    origin,
                    release,
                    &points,
                    store.tool_settings(),
                );
                match element {
                    Some(element) => ToolEvent::Committed(store.add_element(element)),
                    None => ToolEvent::Finished,
                }
            }
        }
    }

    /// The pointer left the surface: abort without committing.
    pub fn pointer_leave(&mut self) -> ToolEvent {
        match std::mem::take(&mut self.state) {
            ToolState::Idle => ToolEvent::Ignored,
            ToolState::Drawing { .. } => ToolEvent::Cancelled,
        }
    }

    /// Element that would be committed if the pointer were released now.
    pub fn preview(&self, tool_settings: &ToolSettings) -> Option<Element> {
        let ToolState::Drawing {
            tool,
            origin,
            current,
            points,
            ..
        } = &self.state
        else {
            return None;
        };
        build_element(*tool, *origin, *current, points, tool_settings)
    }

    fn erase_at(&mut self, store: &mut DocumentStore, point: Point) -> ToolEvent {
        let reach = self.hit_tolerance.max(store.tool_settings().stroke_width / 2.0);
        let hits = store.elements_at(point, reach);
        if hits.is_empty() {
            return ToolEvent::Ignored;
        }
        if let ToolState::Drawing { erased, .. } = &mut self.state {
            // One undo step per gesture.
            if *erased == 0 {
                store.checkpoint();
            }
            let removed = store.remove_elements(&hits);
            *erased += removed;
            log::debug!("Eraser removed {removed} element(s)");
            return ToolEvent::Erased(removed);
        }
        ToolEvent::Ignored
    }
}

fn snap_sample(tool: ToolKind, sample: StrokePoint, settings: &CanvasSettings) -> StrokePoint {
    if settings.snap_to_grid && tool.snaps() {
        sample.moved_to(snap_to_grid(sample.point(), settings.grid_size))
    } else {
        sample
    }
}

/// Construct the element a gesture produces, styled from the tool settings.
pub fn build_element(
    tool: ToolKind,
    origin: StrokePoint,
    end: StrokePoint,
    points: &[StrokePoint],
    settings: &ToolSettings,
) -> Option<Element> {
    let kind = tool.element_kind()?;
    let (start, stop) = (origin.point(), end.point());
    let mut element = match kind {
        k if k.is_path() => {
            if points.len() < 2 {
                return None;
            }
            let mut element = Element::with_points(kind, points.to_vec());
            element.pressure = settings.pressure_sensitivity;
            match kind {
                ElementKind::Pen => element.pen_type = Some(settings.pen_type),
                ElementKind::Brush => element.brush_type = Some(settings.brush_type),
                _ => {}
            }
            element
        }
        ElementKind::Line | ElementKind::Arrow | ElementKind::Measure => {
            Element::with_points(kind, vec![origin, end])
        }
        ElementKind::Rectangle => {
            let rect = Rect::from_points(start, stop);
            let mut element = Element::rectangle(rect.x0, rect.y0, rect.width(), rect.height());
            element.fill_color = Some(settings.fill_color);
            element
        }
        ElementKind::Circle => {
            let mut element = Element::circle(start, (stop - start).hypot());
            element.fill_color = Some(settings.fill_color);
            element
        }
        ElementKind::StickyNote | ElementKind::Callout => {
            let rect = Rect::from_points(start, stop);
            let size = (rect.width() > 0.0 && rect.height() > 0.0)
                .then(|| Size::new(rect.width(), rect.height()));
            let mut element = Element::boxed(kind, rect.origin(), size);
            if kind == ElementKind::Callout {
                element.font_size = Some(settings.font_size);
            }
            element
        }
        _ => return None,
    };

    element.color = settings.color;
    element.stroke_width = settings.stroke_width;
    element.opacity = settings.opacity;
    if kind == ElementKind::Highlighter {
        element.stroke_width = element.stroke_width.max(HIGHLIGHTER_MIN_WIDTH);
        element.opacity = settings.opacity * 0.5;
    }
    Some(element)
}
