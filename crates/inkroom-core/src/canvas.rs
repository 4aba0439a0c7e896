//! Editor session: wires pointer and keyboard input to the document store.

use crate::config::EditorConfig;
use crate::document::DocumentStore;
use crate::element::{Element, ElementId, ElementKind, StrokePoint, Tilt};
use crate::shortcuts::{EditorCommand, KeyInput, ShortcutRegistry};
use crate::tools::{ToolEvent, ToolManager};
use kurbo::{Point, Size};

/// How much of the view needs repainting after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Repaint {
    None,
    /// Only the in-progress preview changed.
    Preview,
    /// Document or view changed.
    Full,
}

/// A pointer sample in screen coordinates, relative to the canvas origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub position: Point,
    pub pressure: Option<f64>,
    pub tilt: Option<Tilt>,
    pub timestamp: Option<u64>,
}

impl PointerInput {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            pressure: None,
            tilt: None,
            timestamp: None,
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }
}

/// Result of feeding one pointer event to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerResponse {
    pub event: ToolEvent,
    pub repaint: Repaint,
    /// Document-space pointer position, for the presence channel.
    pub cursor: Option<Point>,
}

/// Result of a keyboard command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Handled(Repaint),
    /// The host should run a save through its persistence bridge.
    SaveRequested,
}

/// One open canvas: the document plus the pointer state driving it.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub store: DocumentStore,
    tools: ToolManager,
    zoom_in_factor: f64,
    zoom_out_factor: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self::with_config(&EditorConfig::default())
    }

    pub fn with_config(config: &EditorConfig) -> Self {
        Self {
            store: DocumentStore::with_limits(config.history_limit, config.paste_offset),
            tools: ToolManager::with_tolerance(config.hit_tolerance),
            zoom_in_factor: config.zoom_in_factor,
            zoom_out_factor: config.zoom_out_factor,
        }
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    /// `doc = (screen - pan) / zoom`
    pub fn to_document(&self, screen: Point) -> Point {
        self.store.camera().screen_to_world(screen)
    }

    /// `screen = doc * zoom + pan`
    pub fn to_screen(&self, document: Point) -> Point {
        self.store.camera().world_to_screen(document)
    }

    fn sample(&self, input: PointerInput) -> StrokePoint {
        let mut sample = StrokePoint::from(self.to_document(input.position));
        if let Some(pressure) = input.pressure {
            sample = sample.with_pressure(pressure);
        }
        sample.tilt = input.tilt;
        sample.timestamp = input.timestamp;
        sample
    }

    fn respond(&self, event: ToolEvent, cursor: Option<Point>) -> PointerResponse {
        let repaint = match &event {
            ToolEvent::Ignored => Repaint::None,
            ToolEvent::Started | ToolEvent::Preview => Repaint::Preview,
            ToolEvent::Committed(_)
            | ToolEvent::Selected(_)
            | ToolEvent::Erased(_)
            | ToolEvent::Finished
            | ToolEvent::Cancelled => Repaint::Full,
        };
        PointerResponse {
            event,
            repaint,
            cursor,
        }
    }

    pub fn pointer_down(&mut self, input: PointerInput) -> PointerResponse {
        let sample = self.sample(input);
        let event = self.tools.pointer_down(&mut self.store, sample);
        self.respond(event, Some(sample.point()))
    }

    pub fn pointer_move(&mut self, input: PointerInput) -> PointerResponse {
        let sample = self.sample(input);
        let event = self.tools.pointer_move(&mut self.store, sample);
        self.respond(event, Some(sample.point()))
    }

    pub fn pointer_up(&mut self, input: PointerInput) -> PointerResponse {
        let sample = self.sample(input);
        let event = self.tools.pointer_up(&mut self.store, sample);
        self.respond(event, Some(sample.point()))
    }

    pub fn pointer_leave(&mut self) -> PointerResponse {
        let event = self.tools.pointer_leave();
        self.respond(event, None)
    }

    /// The element the current gesture would commit, for preview painting.
    pub fn preview(&self) -> Option<Element> {
        self.tools.preview(self.store.tool_settings())
    }

    /// Wheel or pinch zoom anchored at a screen point.
    pub fn zoom_at(&mut self, screen: Point, factor: f64) -> Repaint {
        self.store.zoom_at(screen, factor);
        Repaint::Full
    }

    pub fn execute(&mut self, command: EditorCommand) -> CommandOutcome {
        let changed = |yes: bool| CommandOutcome::Handled(if yes { Repaint::Full } else { Repaint::None });
        match command {
            EditorCommand::Save => CommandOutcome::SaveRequested,
            EditorCommand::Undo => changed(self.store.undo()),
            EditorCommand::Redo => changed(self.store.redo()),
            EditorCommand::ZoomIn => {
                let zoom = self.store.camera().zoom * self.zoom_in_factor;
                self.store.set_zoom(zoom);
                changed(true)
            }
            EditorCommand::ZoomOut => {
                let zoom = self.store.camera().zoom * self.zoom_out_factor;
                self.store.set_zoom(zoom);
                changed(true)
            }
            EditorCommand::Copy => {
                self.store.copy_selected();
                changed(false)
            }
            EditorCommand::Paste => changed(!self.store.paste().is_empty()),
            EditorCommand::DeleteSelection => {
                let selected = self.store.selection().to_vec();
                if selected.is_empty() {
                    return changed(false);
                }
                self.store.checkpoint();
                changed(self.store.remove_elements(&selected) > 0)
            }
            EditorCommand::Cancel => changed(self.tools.pointer_leave() == ToolEvent::Cancelled),
        }
    }

    /// Resolve and run a key press. `None` when the key is unbound.
    pub fn handle_key(&mut self, input: &KeyInput) -> Option<CommandOutcome> {
        let command = ShortcutRegistry::resolve(input)?;
        Some(self.execute(command))
    }

    /// Insert a text element at a screen position.
    pub fn place_text(&mut self, screen: Point, text: impl Into<String>) -> ElementId {
        let settings = self.store.tool_settings();
        let mut element = Element::text(self.to_document(screen), text);
        element.color = settings.color;
        element.opacity = settings.opacity;
        element.font_size = Some(settings.font_size);
        element.font_family = Some(settings.font_family.clone());
        self.store.add_element(element)
    }

    /// Insert an image from a `data:` URL or remote URL at a screen position.
    pub fn place_image(&mut self, screen: Point, source: &str, size: Option<Size>) -> ElementId {
        let mut element = Element::boxed(ElementKind::Image, self.to_document(screen), size);
        if source.starts_with("data:") {
            element.image_data = Some(source.to_string());
        } else {
            element.image_url = Some(source.to_string());
        }
        element.opacity = self.store.tool_settings().opacity;
        self.store.add_element(element)
    }

    /// Insert a closed polygon through the given screen points. Fewer than
    /// three points insert nothing.
    pub fn place_polygon(&mut self, screen_points: &[Point]) -> Option<ElementId> {
        if screen_points.len() < 3 {
            return None;
        }
        let points = screen_points
            .iter()
            .map(|p| StrokePoint::from(self.to_document(*p)))
            .collect();
        let settings = self.store.tool_settings();
        let mut element = Element::with_points(ElementKind::Polygon, points);
        element.color = settings.color;
        element.fill_color = Some(settings.fill_color);
        element.stroke_width = settings.stroke_width;
        element.opacity = settings.opacity;
        Some(self.store.add_element(element))
    }
}
