//! Canvas-wide settings and the style applied by drawing tools.

use crate::element::{BrushType, HexColor, PenType};
use serde::{Deserialize, Serialize};

/// Background painted under every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundKind {
    #[default]
    White,
    Transparent,
    Grid,
    Dots,
    Lined,
    Graph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Portrait,
    #[default]
    Landscape,
    Square,
}

/// Smallest grid spacing, in document units, that settings accept.
pub const MIN_GRID_SIZE: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasSettings {
    pub width: f64,
    pub height: f64,
    pub background: BackgroundKind,
    pub background_color: HexColor,
    pub grid_size: f64,
    pub grid_color: HexColor,
    pub orientation: Orientation,
    pub snap_to_grid: bool,
    pub show_ruler: bool,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            background: BackgroundKind::White,
            background_color: HexColor::WHITE,
            grid_size: 20.0,
            grid_color: HexColor::rgb(0xe5, 0xe7, 0xeb),
            orientation: Orientation::Landscape,
            snap_to_grid: false,
            show_ruler: true,
        }
    }
}

impl CanvasSettings {
    /// Pull loaded values back into range. A non-finite grid size resets to
    /// the default, anything below [`MIN_GRID_SIZE`] is raised to it.
    pub fn normalize(&mut self) {
        if !self.grid_size.is_finite() {
            self.grid_size = Self::default().grid_size;
        }
        self.grid_size = self.grid_size.max(MIN_GRID_SIZE);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub background: Option<BackgroundKind>,
    pub background_color: Option<HexColor>,
    pub grid_size: Option<f64>,
    pub grid_color: Option<HexColor>,
    pub orientation: Option<Orientation>,
    pub snap_to_grid: Option<bool>,
    pub show_ruler: Option<bool>,
}

impl SettingsPatch {
    /// Merge into `settings`. Non-positive sizes are ignored and a grid size
    /// below [`MIN_GRID_SIZE`] is raised to it.
    pub fn apply(self, settings: &mut CanvasSettings) {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if let Some(w) = self.width.filter(|v| positive(*v)) {
            settings.width = w;
        }
        if let Some(h) = self.height.filter(|v| positive(*v)) {
            settings.height = h;
        }
        if let Some(g) = self.grid_size.filter(|v| positive(*v)) {
            settings.grid_size = g.max(MIN_GRID_SIZE);
        }
        if let Some(b) = self.background {
            settings.background = b;
        }
        if let Some(c) = self.background_color {
            settings.background_color = c;
        }
        if let Some(c) = self.grid_color {
            settings.grid_color = c;
        }
        if let Some(o) = self.orientation {
            settings.orientation = o;
        }
        if let Some(s) = self.snap_to_grid {
            settings.snap_to_grid = s;
        }
        if let Some(r) = self.show_ruler {
            settings.show_ruler = r;
        }
    }
}

/// Style copied onto elements created by the drawing tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolSettings {
    pub color: HexColor,
    pub fill_color: HexColor,
    pub stroke_width: f64,
    pub opacity: f64,
    pub pen_type: PenType,
    pub brush_type: BrushType,
    pub font_size: f64,
    pub font_family: String,
    pub pressure_sensitivity: bool,
    /// Path smoothing strength; zero draws straight segments.
    pub smoothing: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            color: HexColor::BLACK,
            fill_color: HexColor::WHITE,
            stroke_width: 2.0,
            opacity: 1.0,
            pen_type: PenType::Ballpoint,
            brush_type: BrushType::Round,
            font_size: 16.0,
            font_family: "Inter, system-ui, sans-serif".to_string(),
            pressure_sensitivity: true,
            smoothing: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolSettingsPatch {
    pub color: Option<HexColor>,
    pub fill_color: Option<HexColor>,
    pub stroke_width: Option<f64>,
    pub opacity: Option<f64>,
    pub pen_type: Option<PenType>,
    pub brush_type: Option<BrushType>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub pressure_sensitivity: Option<bool>,
    pub smoothing: Option<f64>,
}

impl ToolSettingsPatch {
    pub fn apply(self, tools: &mut ToolSettings) {
        if let Some(c) = self.color {
            tools.color = c;
        }
        if let Some(c) = self.fill_color {
            tools.fill_color = c;
        }
        if let Some(w) = self.stroke_width.filter(|w| w.is_finite() && *w > 0.0) {
            tools.stroke_width = w;
        }
        if let Some(o) = self.opacity.filter(|o| o.is_finite()) {
            tools.opacity = o.clamp(0.0, 1.0);
        }
        if let Some(p) = self.pen_type {
            tools.pen_type = p;
        }
        if let Some(b) = self.brush_type {
            tools.brush_type = b;
        }
        if let Some(s) = self.font_size.filter(|s| s.is_finite() && *s > 0.0) {
            tools.font_size = s;
        }
        if let Some(f) = self.font_family {
            tools.font_family = f;
        }
        if let Some(p) = self.pressure_sensitivity {
            tools.pressure_sensitivity = p;
        }
        if let Some(s) = self.smoothing.filter(|s| s.is_finite()) {
            tools.smoothing = s.clamp(0.0, 1.0);
        }
    }
}
