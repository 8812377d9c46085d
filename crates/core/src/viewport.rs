//! Zoom and pan state of the canvas.

use eframe::egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Bounds and sensitivity of wheel zooming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Scale change per unit of wheel delta.
    pub intensity: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 5.0,
            intensity: 0.0015,
        }
    }
}

/// Owns the zoom factor and pan offset.
///
/// Not reset when the image changes; the user keeps their view.
#[derive(Debug, Clone)]
pub struct Viewport {
    scale: f32,
    offset: Vec2,
    /// `pointer - offset` captured at pointer-down while panning.
    anchor: Option<Vec2>,
    zoom: ZoomConfig,
}

impl Viewport {
    pub fn new(zoom: ZoomConfig) -> Self {
        Self {
            scale: 1.0_f32.max(zoom.min_scale).min(zoom.max_scale),
            offset: Vec2::ZERO,
            anchor: None,
            zoom,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn zoom_config(&self) -> ZoomConfig {
        self.zoom
    }

    /// Applies a signed wheel delta (positive scrolls down, zooming out).
    pub fn zoom(&mut self, delta: f32) -> f32 {
        if delta.is_finite() {
            let next = self.scale - delta * self.zoom.intensity;
            self.scale = next.max(self.zoom.min_scale).min(self.zoom.max_scale);
        }
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) -> f32 {
        if scale.is_finite() {
            self.scale = scale.max(self.zoom.min_scale).min(self.zoom.max_scale);
        }
        self.scale
    }

    pub fn begin_pan(&mut self, pointer: Pos2) {
        self.anchor = Some(pointer.to_vec2() - self.offset);
    }

    /// Moves the image so it tracks the pointer 1:1. `None` when not panning.
    pub fn pan_to(&mut self, pointer: Pos2) -> Option<Vec2> {
        let anchor = self.anchor?;
        self.offset = pointer.to_vec2() - anchor;
        Some(self.offset)
    }

    /// Pointer-up or pointer-leave.
    pub fn end_pan(&mut self) {
        self.anchor = None;
    }

    pub fn is_panning(&self) -> bool {
        self.anchor.is_some()
    }

    /// Back to 1:1 and centered.
    pub fn reset(&mut self) {
        self.scale = 1.0_f32.max(self.zoom.min_scale).min(self.zoom.max_scale);
        self.offset = Vec2::ZERO;
        self.anchor = None;
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    #[test]
    fn zoom_scales_by_intensity_and_clamps() {
        let mut viewport = Viewport::default();
        let scale = viewport.zoom(-100.0);
        assert!((scale - 1.15).abs() < 1e-6);

        assert_eq!(viewport.zoom(-100_000.0), 5.0);
        assert_eq!(viewport.zoom(100_000.0), 0.2);
        assert_eq!(viewport.zoom(f32::NAN), 0.2);
    }

    #[test]
    fn pan_tracks_pointer_one_to_one() {
        let mut viewport = Viewport::default();
        assert_eq!(viewport.pan_to(pos2(10.0, 10.0)), None);

        viewport.begin_pan(pos2(100.0, 100.0));
        assert_eq!(viewport.pan_to(pos2(130.0, 90.0)), Some(Vec2::new(30.0, -10.0)));
        viewport.end_pan();

        // A second drag continues from the current offset.
        viewport.begin_pan(pos2(0.0, 0.0));
        assert_eq!(viewport.pan_to(pos2(5.0, 5.0)), Some(Vec2::new(35.0, -5.0)));
        viewport.end_pan();
        assert!(!viewport.is_panning());
    }

    #[test]
    fn new_viewport_respects_bounds() {
        let viewport = Viewport::new(ZoomConfig {
            min_scale: 2.0,
            max_scale: 4.0,
            intensity: 0.01,
        });
        assert_eq!(viewport.scale(), 2.0);
    }
}
