//! Editor configuration.

use crate::element::HexColor;
use crate::history::MAX_UNDO_HISTORY;
use crate::document::PASTE_OFFSET;
use crate::tools::HIT_TOLERANCE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Seconds between automatic saves.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Colors handed out to collaborators.
pub const PRESENCE_PALETTE: [HexColor; 6] = [
    HexColor::rgb(0xEF, 0x44, 0x44),
    HexColor::rgb(0xF5, 0x9E, 0x0B),
    HexColor::rgb(0x10, 0xB9, 0x81),
    HexColor::rgb(0x3B, 0x82, 0xF6),
    HexColor::rgb(0x8B, 0x5C, 0xF6),
    HexColor::rgb(0xEC, 0x48, 0x99),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for an editing session. Every field has a default, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub history_limit: usize,
    pub paste_offset: f64,
    pub autosave_interval_secs: u64,
    pub zoom_in_factor: f64,
    pub zoom_out_factor: f64,
    pub hit_tolerance: f64,
    pub presence_palette: Vec<HexColor>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: MAX_UNDO_HISTORY,
            paste_offset: PASTE_OFFSET,
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            zoom_in_factor: 1.2,
            zoom_out_factor: 0.8,
            hit_tolerance: HIT_TOLERANCE,
            presence_palette: PRESENCE_PALETTE.to_vec(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded editor config from {}", path.display());
        Ok(config)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    /// Replace values that would break invariants with their defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.history_limit == 0 {
            self.history_limit = defaults.history_limit;
        }
        if self.autosave_interval_secs == 0 {
            self.autosave_interval_secs = defaults.autosave_interval_secs;
        }
        if !(self.zoom_in_factor.is_finite() && self.zoom_in_factor > 1.0) {
            self.zoom_in_factor = defaults.zoom_in_factor;
        }
        if !(self.zoom_out_factor.is_finite() && self.zoom_out_factor > 0.0 && self.zoom_out_factor < 1.0) {
            self.zoom_out_factor = defaults.zoom_out_factor;
        }
        if self.presence_palette.is_empty() {
            self.presence_palette = defaults.presence_palette;
        }
        self
    }
}
