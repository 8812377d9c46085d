//! UI rendering helpers for the canvas overlays.

use crate::compositor::CoverBox;
use crate::geometry::HandlePosition;
use eframe::egui;

/// Side length of a drawn resize handle.
pub const HANDLE_SIZE: f32 = 10.0;

/// Dims `outer` everywhere except `cutout`.
///
/// # Arguments
/// * `painter` - The egui painter to draw with
/// * `outer` - Area to dim (the scaled image)
/// * `cutout` - Area kept clear (the crop box)
/// * `alpha` - Darkness level (0-255, higher = darker)
pub fn draw_dimmed_outside(painter: &egui::Painter, outer: egui::Rect, cutout: egui::Rect, alpha: u8) {
    let color = egui::Color32::from_black_alpha(alpha);
    let cutout = cutout.intersect(outer);

    // Above
    painter.rect_filled(
        egui::Rect::from_min_max(outer.min, egui::pos2(outer.max.x, cutout.min.y)),
        0.0,
        color,
    );
    // Below
    painter.rect_filled(
        egui::Rect::from_min_max(egui::pos2(outer.min.x, cutout.max.y), outer.max),
        0.0,
        color,
    );
    // Left
    painter.rect_filled(
        egui::Rect::from_min_max(
            egui::pos2(outer.min.x, cutout.min.y),
            egui::pos2(cutout.min.x, cutout.max.y),
        ),
        0.0,
        color,
    );
    // Right
    painter.rect_filled(
        egui::Rect::from_min_max(
            egui::pos2(cutout.max.x, cutout.min.y),
            egui::pos2(outer.max.x, cutout.max.y),
        ),
        0.0,
        color,
    );
}

pub fn draw_crop_border(painter: &egui::Painter, crop_rect: egui::Rect, stroke_width: f32, color: egui::Color32) {
    painter.rect_stroke(
        crop_rect,
        0.0,
        egui::Stroke::new(stroke_width, color),
        egui::StrokeKind::Middle,
    );
}

/// Draws the eight resize handles as small filled squares.
pub fn draw_handles(painter: &egui::Painter, handles: &[HandlePosition]) {
    for hp in handles {
        let rect = egui::Rect::from_center_size(hp.pos, egui::Vec2::splat(HANDLE_SIZE));
        painter.rect_filled(rect, 2.0, egui::Color32::WHITE);
        painter.rect_stroke(
            rect,
            2.0,
            egui::Stroke::new(1.0, egui::Color32::from_gray(40)),
            egui::StrokeKind::Inside,
        );
    }
}

/// Paints covers opaquely, the way they will be baked.
pub fn draw_covers(painter: &egui::Painter, covers: &[CoverBox], default_color: [u8; 4]) {
    for cover in covers {
        let [r, g, b, _] = cover.color.unwrap_or(default_color);
        painter.rect_filled(cover.overlay.rect(), 0.0, egui::Color32::from_rgb(r, g, b));
    }
}

/// UV sub-rectangle of the texture showing `crop` of an image of `natural` size.
pub fn crop_uv(crop_x: f32, crop_y: f32, crop_w: f32, crop_h: f32, natural: egui::Vec2) -> egui::Rect {
    if natural.x <= 0.0 || natural.y <= 0.0 {
        return egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
    }
    egui::Rect::from_min_max(
        egui::pos2(crop_x / natural.x, crop_y / natural.y),
        egui::pos2((crop_x + crop_w) / natural.x, (crop_y + crop_h) / natural.y),
    )
}
