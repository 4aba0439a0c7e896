//! Remote cursor overlay, painted in screen space after the scene.

use crate::surface::Surface;
use inkroom_core::camera::Camera;
use inkroom_core::presence::CursorRecord;
use kurbo::{Affine, BezPath, Point, Rect, RoundedRect, Shape, Stroke, Vec2};
use peniko::Color;

const LABEL_FONT_SIZE: f64 = 12.0;
const LABEL_OFFSET: Vec2 = Vec2::new(16.0, 20.0);

/// Draw a remote user's cursor at a screen position.
///
/// The cursor is a small pointer arrow in the user's color with a name badge.
pub fn draw_cursor(surface: &mut dyn Surface, screen_pos: Point, label: &str, color: Color) {
    let mut path = BezPath::new();
    path.move_to(screen_pos);
    path.line_to(Point::new(screen_pos.x, screen_pos.y + 18.0));
    path.line_to(Point::new(screen_pos.x + 14.0, screen_pos.y + 14.0));
    path.close_path();

    surface.fill_path(&path, Affine::IDENTITY, color);
    // White outline keeps the pointer visible on any background.
    surface.stroke_path(&path, Affine::IDENTITY, &Stroke::new(1.5), Color::WHITE);

    if label.is_empty() {
        return;
    }
    // Rough width estimate; badges only need to cover the text.
    let width = label.chars().count() as f64 * LABEL_FONT_SIZE * 0.6 + 8.0;
    let origin = screen_pos + LABEL_OFFSET;
    let badge = RoundedRect::from_rect(
        Rect::new(origin.x, origin.y, origin.x + width, origin.y + LABEL_FONT_SIZE + 6.0),
        4.0,
    );
    surface.fill_path(&badge.to_path(0.1), Affine::IDENTITY, color);
    surface.fill_text(
        label,
        Point::new(origin.x + 4.0, origin.y + LABEL_FONT_SIZE + 1.0),
        LABEL_FONT_SIZE,
        "sans-serif",
        Affine::IDENTITY,
        Color::WHITE,
    );
}

/// Paint every remote cursor, mapping document positions through `camera`.
pub fn draw_cursors<'a>(
    surface: &mut dyn Surface,
    camera: &Camera,
    scale_factor: f64,
    cursors: impl IntoIterator<Item = &'a CursorRecord>,
) {
    let screen = Affine::scale(scale_factor) * camera.transform();
    for cursor in cursors {
        let at = screen * Point::new(cursor.x, cursor.y);
        draw_cursor(surface, at, &cursor.user_name, cursor.color.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawCommand, RecordingSurface};
    use inkroom_core::element::HexColor;
    use kurbo::Size;

    fn record(user_name: &str, x: f64, y: f64) -> CursorRecord {
        CursorRecord {
            user_id: format!("id-{user_name}"),
            user_name: user_name.to_string(),
            x,
            y,
            color: HexColor::rgb(0x3b, 0x82, 0xf6),
        }
    }

    #[test]
    fn test_cursor_is_placed_in_screen_space() {
        let mut camera = Camera::new();
        camera.zoom = 2.0;
        camera.pan = Vec2::new(10.0, 0.0);
        let mut surface = RecordingSurface::new(Size::new(200.0, 200.0));

        draw_cursors(&mut surface, &camera, 1.0, [&record("ana", 50.0, 50.0)]);

        let tip = surface.commands().iter().find_map(|c| match c {
            DrawCommand::Fill { path, transform, .. } => {
                assert_eq!(*transform, Affine::IDENTITY);
                path.elements().first().and_then(|el| el.end_point())
            }
            _ => None,
        });
        assert_eq!(tip, Some(Point::new(110.0, 100.0)));
        assert_eq!(surface.texts(), vec!["ana"]);
    }

    #[test]
    fn test_unnamed_cursor_has_no_badge() {
        let mut surface = RecordingSurface::new(Size::new(100.0, 100.0));
        draw_cursor(&mut surface, Point::new(5.0, 5.0), "", Color::BLACK);
        assert_eq!(surface.commands().len(), 2);
        assert!(surface.texts().is_empty());
    }
}
