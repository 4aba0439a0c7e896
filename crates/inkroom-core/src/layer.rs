//! Layers group elements and control paint order, visibility and blending.

use crate::element::Element;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub type LayerId = String;

/// Id of the layer every fresh document starts with.
pub const DEFAULT_LAYER_ID: &str = "layer-1";

/// How a layer composites onto the layers beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

impl BlendMode {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "multiply" => Self::Multiply,
            "screen" => Self::Screen,
            "overlay" => Self::Overlay,
            "darken" => Self::Darken,
            "lighten" => Self::Lighten,
            _ => Self::Normal,
        }
    }
}

impl From<BlendMode> for peniko::Mix {
    fn from(mode: BlendMode) -> Self {
        match mode {
            BlendMode::Normal => peniko::Mix::Normal,
            BlendMode::Multiply => peniko::Mix::Multiply,
            BlendMode::Screen => peniko::Mix::Screen,
            BlendMode::Overlay => peniko::Mix::Overlay,
            BlendMode::Darken => peniko::Mix::Darken,
            BlendMode::Lighten => peniko::Mix::Lighten,
        }
    }
}

// Stored documents may carry any CSS blend string; unknown ones load as normal.
impl<'de> Deserialize<'de> for BlendMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f64 {
    1.0
}

/// An ordered group of elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub order: i64,
}

impl Layer {
    /// A visible, unlocked, fully opaque layer with a fresh id.
    pub fn new(name: impl Into<String>, order: i64) -> Self {
        Self::with_id(format!("layer-{}", Uuid::new_v4()), name, order)
    }

    pub fn with_id(id: impl Into<LayerId>, name: impl Into<String>, order: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            visible: true,
            locked: false,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            elements: Vec::new(),
            order,
        }
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }
}

impl Default for Layer {
    fn default() -> Self {
        Self::with_id(DEFAULT_LAYER_ID, "Layer 1", 0)
    }
}

/// A partial update to a layer's properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub opacity: Option<f64>,
    pub blend_mode: Option<BlendMode>,
}

impl LayerPatch {
    pub fn apply(self, layer: &mut Layer) {
        if let Some(name) = self.name {
            layer.name = name;
        }
        if let Some(visible) = self.visible {
            layer.visible = visible;
        }
        if let Some(locked) = self.locked {
            layer.locked = locked;
        }
        if let Some(opacity) = self.opacity.filter(|o| o.is_finite()) {
            layer.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(mode) = self.blend_mode {
            layer.blend_mode = mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layer() {
        let layer = Layer::default();
        assert_eq!(layer.id, "layer-1");
        assert_eq!(layer.name, "Layer 1");
        assert!(layer.visible);
        assert!(!layer.locked);
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.blend_mode, BlendMode::Normal);
    }

    #[test]
    fn test_new_layers_get_distinct_ids() {
        assert_ne!(Layer::new("a", 0).id, Layer::new("a", 0).id);
    }

    #[test]
    fn test_blend_mode_lenient() {
        let layer: Layer = serde_json::from_str(
            r#"{"id":"l","name":"n","blendMode":"color-burn","elements":[]}"#,
        )
        .unwrap();
        assert_eq!(layer.blend_mode, BlendMode::Normal);
        assert!(layer.visible);
        assert_eq!(BlendMode::parse("Multiply"), BlendMode::Multiply);
        assert_eq!(serde_json::to_string(&BlendMode::Screen).unwrap(), "\"screen\"");
    }

    #[test]
    fn test_patch_clamps_opacity() {
        let mut layer = Layer::default();
        LayerPatch {
            opacity: Some(-0.5),
            name: Some("Ink".into()),
            ..Default::default()
        }
        .apply(&mut layer);
        assert_eq!(layer.opacity, 0.0);
        assert_eq!(layer.name, "Ink");
    }
}
