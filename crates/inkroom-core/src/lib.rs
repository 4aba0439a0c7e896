//! Inkroom Core Library
//!
//! Platform-agnostic data model and editing logic for the Inkroom shared
//! canvas: elements and layers, the document store with undo history, the
//! drawing tools, presence, and persistence.

pub mod camera;
pub mod canvas;
pub mod clock;
pub mod config;
pub mod document;
pub mod element;
pub mod history;
pub mod layer;
pub mod presence;
pub mod settings;
pub mod shortcuts;
pub mod snap;
pub mod storage;
pub mod tools;

pub use camera::{Camera, MAX_ZOOM, MIN_ZOOM};
pub use canvas::{Canvas, CommandOutcome, PointerInput, PointerResponse, Repaint};
pub use config::{ConfigError, EditorConfig};
pub use document::{CanvasPatch, CanvasState, DocumentStore};
pub use element::{Element, ElementId, ElementKind, ElementPatch, HexColor, StrokePoint};
pub use history::History;
pub use layer::{BlendMode, Layer, LayerId, LayerPatch};
pub use presence::{PresenceChannel, PresenceEvent, PresenceTransport};
pub use settings::{CanvasSettings, SettingsPatch, ToolSettings, ToolSettingsPatch};
pub use shortcuts::{EditorCommand, KeyInput, ShortcutRegistry};
pub use snap::snap_to_grid;
pub use storage::{PersistenceBridge, RecordStore, StorageError, StorageResult};
pub use tools::{ToolEvent, ToolKind, ToolManager, ToolState};
