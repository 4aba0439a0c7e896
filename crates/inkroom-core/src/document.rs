//! The in-memory document store: layers, view state, selection and history.

use crate::camera::{Camera, clamp_zoom};
use crate::element::{Element, ElementId, ElementPatch};
use crate::history::{History, MAX_UNDO_HISTORY};
use crate::layer::{DEFAULT_LAYER_ID, Layer, LayerId, LayerPatch};
use crate::settings::{CanvasSettings, SettingsPatch, ToolSettings, ToolSettingsPatch};
use crate::tools::ToolKind;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Offset applied to pasted elements.
pub const PASTE_OFFSET: f64 = 20.0;

/// Complete editable state of one canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasState {
    pub layers: Vec<Layer>,
    pub active_layer_id: LayerId,
    #[serde(default)]
    pub settings: CanvasSettings,
    #[serde(flatten)]
    pub camera: Camera,
    #[serde(default)]
    pub selected_elements: Vec<ElementId>,
    #[serde(default)]
    pub clipboard: Vec<Element>,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            layers: vec![Layer::default()],
            active_layer_id: DEFAULT_LAYER_ID.to_string(),
            settings: CanvasSettings::default(),
            camera: Camera::default(),
            selected_elements: Vec::new(),
            clipboard: Vec::new(),
        }
    }
}

impl CanvasState {
    /// Restore the structural invariants: at least one layer, an active id
    /// that names an existing layer, a zoom inside the allowed range and a
    /// usable grid size.
    pub fn normalize(&mut self) {
        if self.layers.is_empty() {
            self.layers.push(Layer::default());
        }
        if !self.layers.iter().any(|l| l.id == self.active_layer_id) {
            self.active_layer_id = self.layers[0].id.clone();
        }
        self.camera.zoom = clamp_zoom(self.camera.zoom).unwrap_or(1.0);
        self.settings.normalize();
        for layer in &mut self.layers {
            for element in &mut layer.elements {
                element.layer_id.clone_from(&layer.id);
            }
        }
    }

    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.layer(&self.active_layer_id)
    }

    /// All elements across every layer, in layer storage order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.layers.iter().flat_map(|l| l.elements.iter())
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements().find(|e| e.id == id)
    }

    /// Visible layers in paint order (ascending `order`, stable).
    pub fn visible_layers(&self) -> Vec<&Layer> {
        let mut layers: Vec<&Layer> = self.layers.iter().filter(|l| l.visible).collect();
        layers.sort_by_key(|l| l.order);
        layers
    }
}

/// Partial state accepted by [`DocumentStore::load_canvas`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasPatch {
    pub layers: Option<Vec<Layer>>,
    pub active_layer_id: Option<LayerId>,
    pub settings: Option<CanvasSettings>,
    pub zoom: Option<f64>,
    pub pan: Option<Vec2>,
    pub selected_elements: Option<Vec<ElementId>>,
    pub clipboard: Option<Vec<Element>>,
}

impl CanvasPatch {
    /// A patch replacing only the layers, as produced by persisted snapshots.
    pub fn layers(layers: Vec<Layer>) -> Self {
        Self {
            layers: Some(layers),
            ..Default::default()
        }
    }
}

/// What history restores. View state and the clipboard are not part of it,
/// so undoing never moves the viewport or loses copied elements.
#[derive(Debug, Clone, PartialEq)]
struct Checkpoint {
    layers: Vec<Layer>,
    active_layer_id: LayerId,
    settings: CanvasSettings,
    selected_elements: Vec<ElementId>,
}

/// Single source of truth for one open canvas.
///
/// Every operation is total: inputs that reference nothing are no-ops, and
/// the invariants of [`CanvasState::normalize`] hold after each call.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    state: CanvasState,
    history: History<Checkpoint>,
    active_tool: ToolKind,
    tool_settings: ToolSettings,
    paste_offset: f64,
    revision: u64,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::with_limits(MAX_UNDO_HISTORY, PASTE_OFFSET)
    }

    /// A store with a custom history bound and paste offset.
    pub fn with_limits(history_limit: usize, paste_offset: f64) -> Self {
        Self {
            state: CanvasState::default(),
            history: History::new(history_limit),
            active_tool: ToolKind::default(),
            tool_settings: ToolSettings::default(),
            paste_offset,
            revision: 0,
        }
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn layers(&self) -> &[Layer] {
        &self.state.layers
    }

    pub fn active_layer_id(&self) -> &str {
        &self.state.active_layer_id
    }

    pub fn settings(&self) -> &CanvasSettings {
        &self.state.settings
    }

    pub fn camera(&self) -> Camera {
        self.state.camera
    }

    pub fn selection(&self) -> &[ElementId] {
        &self.state.selected_elements
    }

    pub fn clipboard(&self) -> &[Element] {
        &self.state.clipboard
    }

    pub fn active_tool(&self) -> ToolKind {
        self.active_tool
    }

    pub fn tool_settings(&self) -> &ToolSettings {
        &self.tool_settings
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.state.element(id)
    }

    /// Bumped by every mutation; lets observers detect unsaved changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_len()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn capture(&self) -> Checkpoint {
        Checkpoint {
            layers: self.state.layers.clone(),
            active_layer_id: self.state.active_layer_id.clone(),
            settings: self.state.settings.clone(),
            selected_elements: self.state.selected_elements.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.state.layers = checkpoint.layers;
        self.state.active_layer_id = checkpoint.active_layer_id;
        self.state.settings = checkpoint.settings;
        self.state.selected_elements = checkpoint.selected_elements;
        self.touch();
    }

    /// Record the current document as an undo point and clear redo.
    pub fn checkpoint(&mut self) {
        let snapshot = self.capture();
        self.history.record(snapshot);
    }

    fn layer_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.state.layers.iter_mut().find(|l| l.id == id)
    }

    // --- layers ---

    /// Append a new layer on top. Returns its id. The active layer is unchanged.
    pub fn add_layer(&mut self, name: Option<String>) -> LayerId {
        let count = self.state.layers.len();
        let name = name.unwrap_or_else(|| format!("Layer {}", count + 1));
        let order = self
            .state
            .layers
            .iter()
            .map(|l| l.order + 1)
            .max()
            .unwrap_or(0)
            .max(count as i64);
        let layer = Layer::new(name, order);
        let id = layer.id.clone();
        log::debug!("Adding layer {id}");
        self.state.layers.push(layer);
        self.touch();
        id
    }

    /// Remove a layer and its elements. The last remaining layer is never
    /// removed. If the active layer goes away, the first remaining layer
    /// becomes active.
    pub fn remove_layer(&mut self, id: &str) -> bool {
        if self.state.layers.len() <= 1 {
            return false;
        }
        let Some(index) = self.state.layers.iter().position(|l| l.id == id) else {
            return false;
        };
        let removed = self.state.layers.remove(index);
        let gone: HashSet<&str> = removed.elements.iter().map(|e| e.id.as_str()).collect();
        self.state
            .selected_elements
            .retain(|sel| !gone.contains(sel.as_str()));
        if self.state.active_layer_id == id {
            self.state.active_layer_id = self.state.layers[0].id.clone();
        }
        self.touch();
        true
    }

    pub fn set_active_layer(&mut self, id: &str) -> bool {
        if self.state.layer(id).is_none() {
            return false;
        }
        self.state.active_layer_id = id.to_string();
        self.touch();
        true
    }

    pub fn update_layer(&mut self, id: &str, patch: LayerPatch) -> bool {
        let Some(layer) = self.layer_mut(id) else {
            return false;
        };
        patch.apply(layer);
        self.touch();
        true
    }

    /// Assign paint order by position in `ids`. Unknown and repeated ids are
    /// skipped; layers missing from `ids` follow the listed ones, keeping
    /// their previous relative order.
    pub fn reorder_layers(&mut self, ids: &[LayerId]) {
        let mut seen = HashSet::new();
        let mut ranked: Vec<Layer> = Vec::with_capacity(self.state.layers.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if let Some(layer) = self.state.layer(id) {
                ranked.push(layer.clone());
            }
        }
        let mut rest: Vec<Layer> = self
            .state
            .layers
            .iter()
            .filter(|l| !seen.contains(l.id.as_str()))
            .cloned()
            .collect();
        rest.sort_by_key(|l| l.order);
        ranked.extend(rest);
        for (index, layer) in ranked.iter_mut().enumerate() {
            layer.order = index as i64;
        }
        self.state.layers = ranked;
        self.touch();
    }

    // --- elements ---

    /// Append an element to the active layer as one undoable step.
    pub fn add_element(&mut self, mut element: Element) -> ElementId {
        self.checkpoint();
        let active = self.state.active_layer_id.clone();
        element.layer_id.clone_from(&active);
        let id = element.id.clone();
        if let Some(layer) = self.layer_mut(&active) {
            layer.elements.push(element);
        }
        self.touch();
        id
    }

    pub fn update_element(&mut self, id: &str, patch: ElementPatch) -> bool {
        let found = self
            .state
            .layers
            .iter_mut()
            .flat_map(|l| l.elements.iter_mut())
            .find(|e| e.id == id);
        match found {
            Some(element) => {
                patch.apply(element);
                self.touch();
                true
            }
            None => false,
        }
    }

    pub fn remove_element(&mut self, id: &str) -> bool {
        self.remove_elements(&[id.to_string()]) > 0
    }

    /// Remove every listed element and drop them from the selection.
    /// Returns how many elements were removed.
    pub fn remove_elements(&mut self, ids: &[ElementId]) -> usize {
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut removed = 0;
        for layer in &mut self.state.layers {
            let before = layer.elements.len();
            layer.elements.retain(|e| !targets.contains(e.id.as_str()));
            removed += before - layer.elements.len();
        }
        let before = self.state.selected_elements.len();
        self.state
            .selected_elements
            .retain(|sel| !targets.contains(sel.as_str()));
        if removed > 0 || before != self.state.selected_elements.len() {
            self.touch();
        }
        removed
    }

    /// Element ids under `point`, front to back, on visible unlocked layers.
    pub fn elements_at(&self, point: Point, tolerance: f64) -> Vec<ElementId> {
        self.state
            .visible_layers()
            .into_iter()
            .rev()
            .filter(|l| !l.locked)
            .flat_map(|l| l.elements.iter().rev())
            .filter(|e| !e.locked && e.hit_test(point, tolerance))
            .map(|e| e.id.clone())
            .collect()
    }

    // --- selection and clipboard ---

    pub fn select_elements(&mut self, ids: Vec<ElementId>) {
        self.state.selected_elements = ids;
        self.touch();
    }

    pub fn clear_selection(&mut self) {
        if !self.state.selected_elements.is_empty() {
            self.state.selected_elements.clear();
            self.touch();
        }
    }

    /// Copy the selected elements, in paint order, into the clipboard.
    pub fn copy_selected(&mut self) -> usize {
        let selected: HashSet<&str> = self
            .state
            .selected_elements
            .iter()
            .map(String::as_str)
            .collect();
        let copied: Vec<Element> = self
            .state
            .visible_layers()
            .into_iter()
            .chain(self.state.layers.iter().filter(|l| !l.visible))
            .flat_map(|l| l.elements.iter())
            .filter(|e| selected.contains(e.id.as_str()))
            .cloned()
            .collect();
        let count = copied.len();
        self.state.clipboard = copied;
        count
    }

    /// Paste clipboard copies into the active layer, offset down and right.
    /// Each copy gets a fresh id. Returns the new ids.
    pub fn paste(&mut self) -> Vec<ElementId> {
        if self.state.clipboard.is_empty() {
            return Vec::new();
        }
        let active = self.state.active_layer_id.clone();
        let offset = Vec2::new(self.paste_offset, self.paste_offset);
        let copies: Vec<Element> = self
            .state
            .clipboard
            .iter()
            .map(|source| {
                let mut copy = source.clone();
                copy.id = format!("{}-copy-{}", source.id, Uuid::new_v4().simple());
                copy.layer_id.clone_from(&active);
                if copy.x.is_none() {
                    copy.x = Some(0.0);
                }
                if copy.y.is_none() {
                    copy.y = Some(0.0);
                }
                copy.translate(offset);
                copy
            })
            .collect();
        let ids = copies.iter().map(|e| e.id.clone()).collect();
        if let Some(layer) = self.layer_mut(&active) {
            layer.elements.extend(copies);
        }
        self.touch();
        ids
    }

    // --- view ---

    pub fn set_zoom(&mut self, zoom: f64) {
        let before = self.state.camera.zoom;
        self.state.camera.set_zoom(zoom);
        if self.state.camera.zoom != before {
            self.touch();
        }
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        self.state.camera.set_pan(pan);
        self.touch();
    }

    /// Zoom around a screen point (wheel and pinch gestures).
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        self.state.camera.zoom_at(screen_point, factor);
        self.touch();
    }

    // --- history ---

    pub fn undo(&mut self) -> bool {
        let current = self.capture();
        match self.history.undo(current) {
            Some(previous) => {
                self.restore(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let current = self.capture();
        match self.history.redo(current) {
            Some(next) => {
                self.restore(next);
                true
            }
            None => false,
        }
    }

    // --- settings and lifecycle ---

    pub fn update_settings(&mut self, patch: SettingsPatch) {
        patch.apply(&mut self.state.settings);
        self.touch();
    }

    pub fn set_active_tool(&mut self, tool: ToolKind) {
        self.active_tool = tool;
    }

    pub fn update_tool_settings(&mut self, patch: ToolSettingsPatch) {
        patch.apply(&mut self.tool_settings);
    }

    /// Back to a fresh document. History is cleared; tool choice is kept.
    pub fn reset_canvas(&mut self) {
        self.state = CanvasState::default();
        self.history.clear();
        self.touch();
    }

    /// Merge externally supplied state (a loaded or restored snapshot).
    ///
    /// History is cleared because earlier snapshots describe a different
    /// document.
    pub fn load_canvas(&mut self, patch: CanvasPatch) {
        if let Some(layers) = patch.layers {
            self.state.layers = layers;
        }
        if let Some(active) = patch.active_layer_id {
            self.state.active_layer_id = active;
        }
        if let Some(settings) = patch.settings {
            self.state.settings = settings;
        }
        if let Some(zoom) = patch.zoom {
            self.state.camera.set_zoom(zoom);
        }
        if let Some(pan) = patch.pan {
            self.state.camera.pan = pan;
        }
        if let Some(selection) = patch.selected_elements {
            self.state.selected_elements = selection;
        }
        if let Some(clipboard) = patch.clipboard {
            self.state.clipboard = clipboard;
        }
        self.state.normalize();
        let live: HashSet<String> = self.state.elements().map(|e| e.id.clone()).collect();
        self.state.selected_elements.retain(|id| live.contains(id));
        self.history.clear();
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKind, StrokePoint};

    fn rect(x: f64) -> Element {
        Element::rectangle(x, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_fresh_store() {
        let store = DocumentStore::new();
        assert_eq!(store.layers().len(), 1);
        assert_eq!(store.active_layer_id(), "layer-1");
        assert_eq!(store.camera().zoom, 1.0);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_add_element_goes_to_active_layer_with_history() {
        let mut store = DocumentStore::new();
        let second = store.add_layer(None);
        store.set_active_layer(&second);
        let id = store.add_element(rect(0.0));

        let layer = store.state().layer(&second).unwrap();
        assert_eq!(layer.elements.len(), 1);
        assert_eq!(layer.elements[0].layer_id, second);
        assert_eq!(store.element(&id).unwrap().layer_id, second);
        assert_eq!(store.undo_depth(), 1);
    }

    #[test]
    fn test_undo_redo_inverse() {
        let mut store = DocumentStore::new();
        store.add_element(rect(0.0));
        let before = store.state().clone();

        store.add_element(rect(50.0));
        let after = store.state().clone();

        assert!(store.undo());
        assert_eq!(store.state(), &before);
        assert!(store.redo());
        assert_eq!(store.state(), &after);
    }

    #[test]
    fn test_undo_redo_walks_history_across_layer_switch() {
        let mut store = DocumentStore::new();
        let mut before_commit = Vec::new();

        for x in [0.0, 10.0] {
            before_commit.push(store.state().clone());
            store.add_element(rect(x));
        }
        let second = store.add_layer(Some("Ink".into()));
        assert!(store.set_active_layer(&second));
        for x in [20.0, 30.0, 40.0] {
            before_commit.push(store.state().clone());
            store.add_element(rect(x));
        }
        let last = store.state().clone();
        assert_eq!(store.undo_depth(), 5);

        for expected in before_commit.iter().rev() {
            assert!(store.undo());
            assert_eq!(store.state(), expected);
            assert_eq!(store.active_layer_id(), expected.active_layer_id);
        }
        assert!(!store.undo());
        assert_eq!(store.layers().len(), 1);

        for expected in before_commit.iter().skip(1).chain(std::iter::once(&last)) {
            assert!(store.redo());
            assert_eq!(store.state(), expected);
        }
        assert!(!store.redo());
        assert_eq!(store.active_layer_id(), second);
        assert_eq!(store.state().layer(&second).unwrap().elements.len(), 3);
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut store = DocumentStore::new();
        store.add_element(rect(0.0));
        store.undo();
        assert!(store.can_redo());
        store.add_element(rect(1.0));
        assert!(!store.can_redo());
    }

    #[test]
    fn test_undo_on_empty_is_noop() {
        let mut store = DocumentStore::new();
        let before = store.state().clone();
        assert!(!store.undo());
        assert!(!store.redo());
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut store = DocumentStore::with_limits(3, PASTE_OFFSET);
        for i in 0..6 {
            store.add_element(rect(i as f64));
        }
        assert_eq!(store.undo_depth(), 3);
        while store.undo() {}
        assert_eq!(store.state().elements().count(), 3);
    }

    #[test]
    fn test_add_layer_defaults() {
        let mut store = DocumentStore::new();
        let id = store.add_layer(None);
        let layer = store.state().layer(&id).unwrap();
        assert_eq!(layer.name, "Layer 2");
        assert_eq!(layer.order, 1);
        assert!(layer.visible && !layer.locked);
        assert_eq!(store.active_layer_id(), "layer-1");

        let named = store.add_layer(Some("Sketch".into()));
        assert_eq!(store.state().layer(&named).unwrap().name, "Sketch");
    }

    #[test]
    fn test_never_removes_last_layer() {
        let mut store = DocumentStore::new();
        assert!(!store.remove_layer("layer-1"));
        assert_eq!(store.layers().len(), 1);
        assert!(!store.remove_layer("missing"));
    }

    #[test]
    fn test_remove_active_layer_falls_back_to_first() {
        let mut store = DocumentStore::new();
        let l2 = store.add_layer(None);
        store.set_active_layer(&l2);
        assert!(store.remove_layer(&l2));
        assert_eq!(store.layers().len(), 1);
        assert_eq!(store.active_layer_id(), "layer-1");
    }

    #[test]
    fn test_remove_active_layer_drops_its_elements() {
        let mut store = DocumentStore::new();
        let kept = store.add_element(rect(0.0));
        let l2 = store.add_layer(None);
        store.set_active_layer(&l2);
        let a = store.add_element(rect(10.0));
        let b = store.add_element(rect(20.0));

        assert!(store.remove_layer(&l2));
        assert!(store.element(&a).is_none());
        assert!(store.element(&b).is_none());
        assert_eq!(store.state().elements().count(), 1);
        assert!(store.element(&kept).is_some());
        assert_eq!(store.active_layer_id(), store.layers()[0].id);
        assert_eq!(store.active_layer_id(), "layer-1");
    }

    #[test]
    fn test_remove_layer_prunes_selection() {
        let mut store = DocumentStore::new();
        let l2 = store.add_layer(None);
        store.set_active_layer(&l2);
        let id = store.add_element(rect(0.0));
        store.select_elements(vec![id]);
        store.remove_layer(&l2);
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_set_active_layer_unknown_is_noop() {
        let mut store = DocumentStore::new();
        assert!(!store.set_active_layer("ghost"));
        assert_eq!(store.active_layer_id(), "layer-1");
    }

    #[test]
    fn test_reorder_layers() {
        let mut store = DocumentStore::new();
        let l2 = store.add_layer(None);
        let l3 = store.add_layer(None);
        store.reorder_layers(&[l3.clone(), "ghost".into(), "layer-1".into()]);

        let order = |id: &str| store.state().layer(id).unwrap().order;
        assert_eq!(order(&l3), 0);
        assert_eq!(order("layer-1"), 1);
        assert_eq!(order(&l2), 2);
        assert_eq!(store.layers().len(), 3);

        store.reorder_layers(&[]);
        assert_eq!(store.layers().len(), 3);
    }

    #[test]
    fn test_update_layer() {
        let mut store = DocumentStore::new();
        assert!(store.update_layer(
            "layer-1",
            LayerPatch {
                visible: Some(false),
                ..Default::default()
            }
        ));
        assert!(!store.layers()[0].visible);
        assert!(!store.update_layer("ghost", LayerPatch::default()));
    }

    #[test]
    fn test_update_and_remove_elements() {
        let mut store = DocumentStore::new();
        let a = store.add_element(rect(0.0));
        let b = store.add_element(rect(20.0));
        store.select_elements(vec![a.clone(), b.clone()]);

        assert!(store.update_element(
            &a,
            ElementPatch {
                width: Some(99.0),
                ..Default::default()
            }
        ));
        assert_eq!(store.element(&a).unwrap().width, Some(99.0));
        assert!(!store.update_element("ghost", ElementPatch::default()));

        assert!(store.remove_element(&a));
        assert_eq!(store.selection(), &[b.clone()]);
        assert_eq!(store.remove_elements(&[b, "ghost".into()]), 1);
        assert!(store.selection().is_empty());
        assert_eq!(store.state().elements().count(), 0);
    }

    #[test]
    fn test_paste_offsets_with_fresh_ids() {
        let mut store = DocumentStore::new();
        let src = store.add_element(Element::with_points(
            ElementKind::Line,
            vec![StrokePoint::new(0.0, 0.0), StrokePoint::new(5.0, 5.0)],
        ));
        let boxed = store.add_element(rect(100.0));
        store.select_elements(vec![src.clone(), boxed.clone()]);
        assert_eq!(store.copy_selected(), 2);

        let l2 = store.add_layer(None);
        store.set_active_layer(&l2);
        let depth = store.undo_depth();
        let first = store.paste();
        let second = store.paste();

        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|id| id != &src && id != &boxed));
        assert!(first.iter().all(|id| !second.contains(id)));
        assert_eq!(store.undo_depth(), depth);
        assert_eq!(store.clipboard().len(), 2);

        let line = store.element(&first[0]).unwrap();
        assert_eq!(line.layer_id, l2);
        assert_eq!(line.points[0].point(), Point::new(20.0, 20.0));
        let copy = store.element(&first[1]).unwrap();
        assert_eq!(copy.x, Some(120.0));
        assert_eq!(copy.y, Some(20.0));
    }

    #[test]
    fn test_paste_empty_clipboard_is_noop() {
        let mut store = DocumentStore::new();
        let rev = store.revision();
        assert!(store.paste().is_empty());
        assert_eq!(store.revision(), rev);
    }

    #[test]
    fn test_zoom_clamped_and_monotone() {
        let mut store = DocumentStore::new();
        store.set_zoom(0.0);
        assert_eq!(store.camera().zoom, 0.1);
        store.set_zoom(100.0);
        assert_eq!(store.camera().zoom, 10.0);

        let mut prev = 0.0;
        for z in [0.05, 0.5, 1.0, 3.0, 12.0] {
            store.set_zoom(z);
            assert!(store.camera().zoom >= prev);
            prev = store.camera().zoom;
        }
    }

    #[test]
    fn test_load_canvas_restores_invariants() {
        let mut store = DocumentStore::new();
        store.add_element(rect(0.0));
        store.load_canvas(CanvasPatch {
            layers: Some(Vec::new()),
            active_layer_id: Some("nope".into()),
            zoom: Some(50.0),
            ..Default::default()
        });
        assert_eq!(store.layers().len(), 1);
        assert_eq!(store.active_layer_id(), store.layers()[0].id);
        assert_eq!(store.camera().zoom, 10.0);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_load_canvas_raises_tiny_grid_size() {
        let mut store = DocumentStore::new();
        store.load_canvas(CanvasPatch {
            settings: Some(CanvasSettings {
                grid_size: 0.01,
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(store.state().settings.grid_size, crate::settings::MIN_GRID_SIZE);

        store.update_settings(SettingsPatch {
            grid_size: Some(0.5),
            ..Default::default()
        });
        assert_eq!(store.state().settings.grid_size, crate::settings::MIN_GRID_SIZE);
    }

    #[test]
    fn test_load_canvas_keeps_unspecified_fields() {
        let mut store = DocumentStore::new();
        store.set_pan(Vec2::new(5.0, 6.0));
        let mut layer = Layer::with_id("remote", "Remote", 0);
        layer.elements.push(rect(0.0));
        store.load_canvas(CanvasPatch::layers(vec![layer]));
        assert_eq!(store.camera().pan, Vec2::new(5.0, 6.0));
        assert_eq!(store.active_layer_id(), "remote");
        assert_eq!(store.state().elements().next().unwrap().layer_id, "remote");
    }

    #[test]
    fn test_reset_canvas() {
        let mut store = DocumentStore::new();
        store.add_layer(None);
        store.add_element(rect(0.0));
        store.set_zoom(3.0);
        store.reset_canvas();
        assert_eq!(store.state(), &CanvasState::default());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_elements_at_skips_hidden_and_locked() {
        let mut store = DocumentStore::new();
        let bottom = store.add_element(rect(0.0));
        let l2 = store.add_layer(None);
        store.set_active_layer(&l2);
        let top = store.add_element(rect(0.0));

        assert_eq!(store.elements_at(Point::new(5.0, 5.0), 1.0), vec![top, bottom.clone()]);

        store.update_layer(
            &l2,
            LayerPatch {
                locked: Some(true),
                ..Default::default()
            },
        );
        assert_eq!(store.elements_at(Point::new(5.0, 5.0), 1.0), vec![bottom]);
    }

    #[test]
    fn test_state_json_shape() {
        let json = serde_json::to_value(CanvasState::default()).unwrap();
        assert_eq!(json["activeLayerId"], "layer-1");
        assert_eq!(json["zoom"], 1.0);
        assert_eq!(json["pan"]["x"], 0.0);
        assert!(json["layers"].is_array());
    }
}
