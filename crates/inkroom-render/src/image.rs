//! Image decoding for image elements.
//!
//! Only `data:` URLs are decoded; remote URLs are left to the host.

use crate::renderer::RendererError;
use base64::Engine;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Decoded RGBA8 pixels, not premultiplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decode raw PNG, JPEG or WebP bytes.
pub fn decode_bytes(data: &[u8]) -> Result<DecodedImage, RendererError> {
    let img = ::image::load_from_memory(data)
        .map_err(|e| RendererError::Image(format!("Failed to decode image: {e}")))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

/// Decode a base64 `data:` URL such as `data:image/png;base64,iVBOR...`.
pub fn decode_data_url(url: &str) -> Result<DecodedImage, RendererError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| RendererError::Image("Not a data URL".to_string()))?;
    let (metadata, payload) = rest
        .split_once(',')
        .ok_or_else(|| RendererError::Image("Invalid data URL: missing comma".to_string()))?;
    if !metadata.contains(";base64") {
        return Err(RendererError::Image(
            "Only base64 data URLs are supported".to_string(),
        ));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| RendererError::Image(format!("Failed to decode base64: {e}")))?;
    decode_bytes(&bytes)
}

/// Decoded images keyed by source. Failures are cached too, so a broken
/// source is only decoded once.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<u64, Option<Arc<DecodedImage>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, source: &str) -> Option<Arc<DecodedImage>> {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        let key = hasher.finish();

        self.entries
            .entry(key)
            .or_insert_with(|| {
                if !source.starts_with("data:") {
                    log::debug!("Image source is not a data URL; drawing placeholder");
                    return None;
                }
                match decode_data_url(source) {
                    Ok(image) => Some(Arc::new(image)),
                    Err(e) => {
                        log::warn!("{e}");
                        None
                    }
                }
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
pub(crate) const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";
