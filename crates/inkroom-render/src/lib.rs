//! Inkroom Render Library
//!
//! Paints canvas state onto a [`Surface`]. [`PixmapSurface`] rasterizes on
//! the CPU with tiny-skia; [`RecordingSurface`] keeps the draw calls.

pub mod cursor;
mod image;
mod pixmap;
mod recording;
mod renderer;
mod surface;

pub use cursor::{draw_cursor, draw_cursors};
pub use crate::image::{DecodedImage, ImageCache, decode_bytes, decode_data_url};
pub use pixmap::PixmapSurface;
pub use recording::{DrawCommand, RecordingSurface};
pub use renderer::{RenderContext, Renderer, RendererError, SceneRenderer};
pub use surface::Surface;
