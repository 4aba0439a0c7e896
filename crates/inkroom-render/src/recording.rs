//! A surface that records draw calls instead of rasterizing them.

use crate::image::DecodedImage;
use crate::surface::Surface;
use kurbo::{Affine, BezPath, Point, Rect, Size, Stroke};
use peniko::{Color, Mix};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Fill {
        path: BezPath,
        transform: Affine,
        color: Color,
    },
    Stroke {
        path: BezPath,
        transform: Affine,
        width: f64,
        color: Color,
    },
    Text {
        text: String,
        origin: Point,
        font_size: f64,
        font_family: String,
        transform: Affine,
        color: Color,
    },
    Image {
        width: u32,
        height: u32,
        rect: Rect,
        transform: Affine,
    },
    PushLayer {
        opacity: f32,
        blend: Mix,
    },
    PopLayer,
}

/// Keeps every command in order. Used to inspect and diff frames.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    size: Size,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Text runs in paint order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self, color: Color) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(color));
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Color) {
        self.commands.push(DrawCommand::Fill {
            path: path.clone(),
            transform,
            color,
        });
    }

    fn stroke_path(&mut self, path: &BezPath, transform: Affine, stroke: &Stroke, color: Color) {
        self.commands.push(DrawCommand::Stroke {
            path: path.clone(),
            transform,
            width: stroke.width,
            color,
        });
    }

    fn fill_text(
        &mut self,
        text: &str,
        origin: Point,
        font_size: f64,
        font_family: &str,
        transform: Affine,
        color: Color,
    ) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            origin,
            font_size,
            font_family: font_family.to_string(),
            transform,
            color,
        });
    }

    fn draw_image(&mut self, image: &DecodedImage, rect: Rect, transform: Affine) {
        self.commands.push(DrawCommand::Image {
            width: image.width,
            height: image.height,
            rect,
            transform,
        });
    }

    fn push_layer(&mut self, opacity: f32, blend: Mix) {
        self.commands.push(DrawCommand::PushLayer { opacity, blend });
    }

    fn pop_layer(&mut self) {
        self.commands.push(DrawCommand::PopLayer);
    }
}
