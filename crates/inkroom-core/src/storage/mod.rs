//! Storage abstraction for canvas records and their version history.

mod bridge;
mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use bridge::{
    Notification, NotificationLevel, PersistenceBridge, RemoteOutcome, SaveReport, SaveRequest,
};
pub use memory::MemoryRecordStore;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileRecordStore;

use crate::clock::now_millis;
use crate::element::{DEFAULT_STROKE_WIDTH, Element, ElementKind, new_element_id};
use crate::layer::{BlendMode, DEFAULT_LAYER_ID, Layer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Canvas not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// The persisted document body: `{layers}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub layers: Vec<Layer>,
}

impl Default for DocumentSnapshot {
    fn default() -> Self {
        Self {
            layers: vec![Layer::default()],
        }
    }
}

impl DocumentSnapshot {
    pub fn new(layers: Vec<Layer>) -> Self {
        if layers.is_empty() {
            return Self::default();
        }
        Self { layers }
    }

    /// Read whatever a record holds.
    ///
    /// Accepts the current `{layers}` shape and the older flat `{elements}`
    /// shape, which is moved onto a single default layer. Layers and
    /// elements are read one at a time: an unreadable element is dropped and
    /// a layer with missing fields gets defaults. Anything else yields one
    /// empty default layer.
    pub fn from_value(value: &Value) -> Self {
        if let Some(raw_layers) = value.get("layers").and_then(Value::as_array) {
            let layers: Vec<Layer> = raw_layers
                .iter()
                .enumerate()
                .filter_map(|(index, raw)| tolerant_layer(index, raw))
                .collect();
            if !layers.is_empty() {
                return Self { layers };
            }
            if !raw_layers.is_empty() {
                log::warn!("No readable layers in snapshot");
            }
        }

        if let Some(elements) = value.get("elements").and_then(Value::as_array) {
            let elements: Vec<Element> = elements.iter().filter_map(legacy_element).collect();
            log::debug!("Upgraded legacy snapshot with {} elements", elements.len());
            let mut layer = Layer::default();
            layer.elements = elements;
            return Self {
                layers: vec![layer],
            };
        }

        Self::default()
    }

    pub fn to_value(&self) -> Value {
        json!({ "layers": self.layers })
    }
}

/// One persisted layer, keeping every element and field that parses.
fn tolerant_layer(index: usize, raw: &Value) -> Option<Layer> {
    let Some(obj) = raw.as_object() else {
        log::warn!("Skipping layer {index}: not an object");
        return None;
    };
    let field = |key: &str| obj.get(key).filter(|v| !v.is_null());

    let id = field("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(|| format!("layer-{}", Uuid::new_v4()), str::to_string);
    let name = field("name")
        .and_then(Value::as_str)
        .map_or_else(|| format!("Layer {}", index + 1), str::to_string);
    let order = field("order")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(index as i64);
    let mut layer = Layer::with_id(id, name, order);

    if let Some(visible) = field("visible").and_then(Value::as_bool) {
        layer.visible = visible;
    }
    if let Some(locked) = field("locked").and_then(Value::as_bool) {
        layer.locked = locked;
    }
    if let Some(opacity) = field("opacity").and_then(Value::as_f64) {
        layer.opacity = opacity.clamp(0.0, 1.0);
    }
    if let Some(mode) = field("blendMode").and_then(Value::as_str) {
        layer.blend_mode = BlendMode::parse(mode);
    }

    if let Some(elements) = field("elements").and_then(Value::as_array) {
        for raw in elements {
            match serde_json::from_value::<Element>(raw.clone()) {
                Ok(element) => layer.elements.push(element),
                Err(e) => log::warn!("Dropping unreadable element in layer {}: {e}", layer.id),
            }
        }
    }
    Some(layer)
}

/// Fill the defaults older documents relied on. Falsy numbers fall back too.
fn legacy_element(raw: &Value) -> Option<Element> {
    let mut obj: Map<String, Value> = raw.as_object()?.clone();

    let truthy = |v: Option<&Value>| match v {
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    };

    if !truthy(obj.get("id")) {
        obj.insert("id".into(), Value::String(new_element_id()));
    }
    if !truthy(obj.get("type")) {
        obj.insert("type".into(), Value::String(ElementKind::Pen.as_str().into()));
    }
    for key in ["x", "y"] {
        if !truthy(obj.get(key)) {
            obj.insert(key.into(), json!(0.0));
        }
    }
    if !truthy(obj.get("color")) {
        obj.insert("color".into(), json!("#000000"));
    }
    if !truthy(obj.get("strokeWidth")) {
        obj.insert("strokeWidth".into(), json!(DEFAULT_STROKE_WIDTH));
    }
    if !truthy(obj.get("opacity")) {
        obj.insert("opacity".into(), json!(1.0));
    }
    obj.insert("layerId".into(), json!(DEFAULT_LAYER_ID));

    match serde_json::from_value(Value::Object(obj)) {
        Ok(element) => Some(element),
        Err(e) => {
            log::warn!("Dropping unreadable legacy element: {e}");
            None
        }
    }
}

/// A stored canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasRecord {
    pub id: String,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Raw document body; read it through [`DocumentSnapshot::from_value`].
    #[serde(default)]
    pub snapshot: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub version: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl CanvasRecord {
    /// A fresh record at version 1 holding one empty layer.
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            project_id: None,
            title: title.into(),
            description: None,
            snapshot: DocumentSnapshot::default().to_value(),
            thumbnail_url: None,
            is_public: false,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn document(&self) -> DocumentSnapshot {
        DocumentSnapshot::from_value(&self.snapshot)
    }

    pub fn summary(&self) -> CanvasSummary {
        CanvasSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            project_id: self.project_id.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

/// Partial update of a record. `updated_at` is always refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub snapshot: Option<Value>,
    pub thumbnail_url: Option<String>,
    pub is_public: Option<bool>,
    pub version: Option<u64>,
}

impl RecordPatch {
    pub fn apply(self, record: &mut CanvasRecord) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(description) = self.description {
            record.description = Some(description);
        }
        if let Some(snapshot) = self.snapshot {
            record.snapshot = snapshot;
        }
        if let Some(url) = self.thumbnail_url {
            record.thumbnail_url = Some(url);
        }
        if let Some(public) = self.is_public {
            record.is_public = public;
        }
        if let Some(version) = self.version {
            record.version = version;
        }
        record.updated_at = now_millis().max(record.updated_at);
    }
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSummary {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub version: u64,
    pub updated_at: u64,
}

/// An immutable saved snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasVersion {
    pub id: String,
    pub canvas_id: String,
    pub version_number: u64,
    pub snapshot: Value,
    pub created_by: String,
    pub created_at: u64,
}

impl CanvasVersion {
    pub fn new(canvas_id: &str, version_number: u64, snapshot: Value, created_by: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            canvas_id: canvas_id.to_string(),
            version_number,
            snapshot,
            created_by: created_by.to_string(),
            created_at: now_millis(),
        }
    }

    pub fn document(&self) -> DocumentSnapshot {
        DocumentSnapshot::from_value(&self.snapshot)
    }
}

/// Trait for canvas record backends.
///
/// Implementations can keep records in memory, in JSON files, or in a
/// hosted database.
pub trait RecordStore: Send + Sync {
    /// Insert a record, returning its id.
    fn create(&self, record: CanvasRecord) -> BoxFuture<'_, StorageResult<String>>;

    fn get(&self, id: &str) -> BoxFuture<'_, StorageResult<Option<CanvasRecord>>>;

    /// Patch an existing record and return it. Missing ids are `NotFound`.
    fn update(&self, id: &str, patch: RecordPatch) -> BoxFuture<'_, StorageResult<CanvasRecord>>;

    /// Remove a record and its versions. Missing ids are not an error.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Summaries of every record owned by `owner_id`, most recently updated first.
    fn list(&self, owner_id: &str) -> BoxFuture<'_, StorageResult<Vec<CanvasSummary>>>;

    fn append_version(&self, version: CanvasVersion) -> BoxFuture<'_, StorageResult<()>>;

    /// Versions of a canvas, newest first.
    fn list_versions(&self, canvas_id: &str) -> BoxFuture<'_, StorageResult<Vec<CanvasVersion>>>;
}

fn newest_first(summaries: &mut [CanvasSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}

fn versions_newest_first(versions: &mut [CanvasVersion]) {
    versions.sort_by(|a, b| {
        b.version_number
            .cmp(&a.version_number)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
