//! Interactive crop session.
//!
//! The session follows a small state machine:
//! `Idle` -> `Active` (working rectangle with live handles) -> `Dragging`
//! (a drag is in flight) -> `Active` on pointer-up -> `Idle` on finish or
//! cancel. Committing copies the working rectangle to the applied one, which
//! stays until the image changes or another crop is committed.

use crate::geometry::{
    self, CropRect, DEFAULT_PADDING, Handle, HandlePosition, ImageSize, Metrics, OverlayBox,
};
use eframe::egui::Pos2;
use tracing::debug;

/// Grab radius around a handle, in screen points.
pub const HANDLE_GRAB_RADIUS: f32 = 8.0;

/// Observable state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropState {
    Idle,
    Active,
    Dragging,
}

/// The drag currently in flight, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragSession {
    None,
    Move {
        start_rect: CropRect,
        start_point: Pos2,
    },
    Handle {
        handle: Handle,
        start_rect: CropRect,
        start_point: Pos2,
        /// Width/height ratio captured at pointer-down.
        aspect: f32,
    },
}

/// What lies under the pointer while a session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropHit {
    Handle(Handle),
    Inside,
}

#[derive(Debug, Clone)]
pub struct CropSession {
    image_size: Option<ImageSize>,
    /// Exists iff the session is active.
    working: Option<CropRect>,
    applied: Option<CropRect>,
    drag: DragSession,
    metrics: Option<Metrics>,
    scale: f32,
}

impl Default for CropSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CropSession {
    pub fn new() -> Self {
        Self {
            image_size: None,
            working: None,
            applied: None,
            drag: DragSession::None,
            metrics: None,
            scale: 1.0,
        }
    }

    /// Drops every rectangle and drag; used whenever the image is replaced.
    pub fn reset_for_image(&mut self, image_size: Option<ImageSize>) {
        self.image_size = image_size;
        self.working = None;
        self.applied = None;
        self.drag = DragSession::None;
        self.metrics = None;
    }

    /// Stores the latest layout. Returns `true` only if something changed.
    pub fn sync_metrics(&mut self, metrics: Option<Metrics>, scale: f32) -> bool {
        if self.metrics == metrics && self.scale == scale {
            return false;
        }
        self.metrics = metrics;
        self.scale = scale;
        true
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub fn state(&self) -> CropState {
        match (self.working, self.drag) {
            (None, _) => CropState::Idle,
            (Some(_), DragSession::None) => CropState::Active,
            (Some(_), _) => CropState::Dragging,
        }
    }

    pub fn is_active(&self) -> bool {
        self.working.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        !matches!(self.drag, DragSession::None)
    }

    pub fn working(&self) -> Option<CropRect> {
        self.working
    }

    pub fn applied(&self) -> Option<CropRect> {
        self.applied
    }

    pub fn drag(&self) -> DragSession {
        self.drag
    }

    /// Opens the session. Re-editing starts from the applied crop as-is,
    /// otherwise from a padded default. No-op without an image.
    pub fn start(&mut self) -> bool {
        if self.working.is_some() {
            return true;
        }
        let Some(size) = self.image_size else {
            debug!("crop start ignored: no image");
            return false;
        };
        let seed = self
            .applied
            .or_else(|| geometry::default_rect_for(size.as_vec2(), DEFAULT_PADDING));
        match seed {
            Some(rect) => {
                self.working = Some(rect);
                debug!(?rect, "crop session started");
                true
            }
            None => {
                debug!(?size, "crop start ignored: image too small");
                false
            }
        }
    }

    /// Commits the working rectangle and closes the session.
    ///
    /// Returns the newly applied rectangle; `None` when there was nothing to
    /// commit, in which case the applied rectangle is left alone.
    pub fn finish(&mut self) -> Option<CropRect> {
        self.drag = DragSession::None;
        let committed = self.working.take()?;
        self.applied = Some(committed);
        debug!(rect = ?committed, "crop applied");
        Some(committed)
    }

    /// Closes the session without touching the applied rectangle.
    pub fn cancel(&mut self) {
        self.drag = DragSession::None;
        self.working = None;
    }

    /// Finishes an active session, otherwise starts one.
    /// Returns whether the session is active afterwards.
    pub fn toggle(&mut self) -> bool {
        if self.is_active() {
            self.finish();
            false
        } else {
            self.start()
        }
    }

    /// Forgets the applied crop, e.g. to export the full image again.
    pub fn clear_applied(&mut self) {
        self.applied = None;
    }

    fn image_point(&self, pointer: Pos2) -> Option<Pos2> {
        let metrics = self.metrics.as_ref()?;
        geometry::point_to_image_space(pointer, metrics, self.scale)
    }

    pub fn begin_move_drag(&mut self, pointer: Pos2) -> bool {
        let (Some(start_rect), Some(start_point)) = (self.working, self.image_point(pointer)) else {
            return false;
        };
        self.drag = DragSession::Move {
            start_rect,
            start_point,
        };
        true
    }

    pub fn begin_handle_drag(&mut self, handle: Handle, pointer: Pos2) -> bool {
        let (Some(start_rect), Some(start_point)) = (self.working, self.image_point(pointer)) else {
            return false;
        };
        self.drag = DragSession::Handle {
            handle,
            start_rect,
            start_point,
            aspect: start_rect.aspect_ratio(),
        };
        true
    }

    /// Recomputes the working rectangle for the current drag.
    ///
    /// Returns `true` if the rectangle changed. Skipped silently when the
    /// layout is not measurable or a resize would be degenerate.
    pub fn pointer_move(&mut self, pointer: Pos2, keep_aspect: bool) -> bool {
        if self.working.is_none() {
            return false;
        }
        let Some(metrics) = self.metrics else {
            return false;
        };
        let Some(point) = geometry::point_to_image_space(pointer, &metrics, self.scale) else {
            return false;
        };
        let natural = metrics.natural_size();

        let next = match self.drag {
            DragSession::None => return false,
            DragSession::Move {
                start_rect,
                start_point,
            } => Some(geometry::calculate_move_rect(start_rect, start_point, point, natural)),
            DragSession::Handle {
                handle,
                start_rect,
                aspect,
                ..
            } => geometry::calculate_handle_rect(handle, start_rect, point, aspect, keep_aspect, natural),
        };

        match next {
            Some(rect) if Some(rect) != self.working => {
                self.working = Some(rect);
                true
            }
            _ => false,
        }
    }

    /// Ends the drag. Returns whether one was in flight.
    pub fn pointer_up(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.drag = DragSession::None;
        was_dragging
    }

    /// Screen box of the working rectangle.
    pub fn overlay_box(&self) -> Option<OverlayBox> {
        let metrics = self.metrics.as_ref()?;
        let rect = self.working?;
        Some(geometry::build_overlay_box(&rect, metrics, self.scale))
    }

    pub fn handle_positions(&self) -> Option<[HandlePosition; 8]> {
        self.overlay_box().map(|overlay| geometry::build_handle_positions(&overlay))
    }

    /// Screen box of the applied crop; the display-only clip mask shown
    /// while no session is active.
    pub fn applied_clip_box(&self) -> Option<OverlayBox> {
        if self.is_active() {
            return None;
        }
        let metrics = self.metrics.as_ref()?;
        let rect = self.applied?;
        Some(geometry::build_overlay_box(&rect, metrics, self.scale))
    }

    pub fn hit_test(&self, pointer: Pos2) -> Option<CropHit> {
        let positions = self.handle_positions()?;
        if let Some(handle) = geometry::handle_at(&positions, pointer, HANDLE_GRAB_RADIUS) {
            return Some(CropHit::Handle(handle));
        }
        let overlay = self.overlay_box()?;
        overlay.rect().contains(pointer).then_some(CropHit::Inside)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{Rect, Vec2, pos2};

    /// 400x300 image centered in an 800x600 container at scale 1.
    fn session_with_layout() -> CropSession {
        let size = ImageSize::new(400, 300);
        let mut session = CropSession::new();
        session.reset_for_image(Some(size));
        let container = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let metrics = geometry::compute_metrics(container, Some(size), 1.0, Vec2::ZERO);
        assert!(session.sync_metrics(metrics, 1.0));
        session
    }

    #[test]
    fn start_requires_image() {
        let mut session = CropSession::new();
        assert!(!session.start());
        assert_eq!(session.state(), CropState::Idle);
    }

    #[test]
    fn start_seeds_padded_default() {
        let mut session = session_with_layout();
        assert!(session.start());
        assert_eq!(session.state(), CropState::Active);
        assert_eq!(session.working(), Some(CropRect::new(40.0, 30.0, 320.0, 240.0)));
    }

    #[test]
    fn restart_seeds_from_applied_crop() {
        let mut session = session_with_layout();
        session.start();
        session.begin_handle_drag(Handle::Se, pos2(560.0, 420.0));
        session.pointer_move(pos2(500.0, 400.0), false);
        session.pointer_up();
        let applied = session.finish().unwrap();

        assert!(session.start());
        assert_eq!(session.working(), Some(applied));
    }

    #[test]
    fn move_drag_tracks_pointer() {
        let mut session = session_with_layout();
        session.start();
        // Image top-left sits at (200, 150) on screen.
        assert!(session.begin_move_drag(pos2(300.0, 250.0)));
        assert_eq!(session.state(), CropState::Dragging);
        assert!(session.pointer_move(pos2(310.0, 240.0), false));
        assert_eq!(session.working(), Some(CropRect::new(50.0, 20.0, 320.0, 240.0)));
        assert!(session.pointer_up());
        assert_eq!(session.state(), CropState::Active);
        assert!(!session.pointer_move(pos2(0.0, 0.0), false));
    }

    #[test]
    fn handle_drag_resizes() {
        let mut session = session_with_layout();
        session.start();
        assert!(session.begin_handle_drag(Handle::E, pos2(560.0, 300.0)));
        session.pointer_move(pos2(1000.0, 300.0), false);
        assert_eq!(session.working(), Some(CropRect::new(40.0, 30.0, 360.0, 240.0)));
    }

    #[test]
    fn drags_skipped_without_metrics() {
        let mut session = CropSession::new();
        session.reset_for_image(Some(ImageSize::new(400, 300)));
        assert!(session.start());
        assert!(!session.begin_move_drag(pos2(10.0, 10.0)));
        assert_eq!(session.state(), CropState::Active);
        assert!(!session.pointer_move(pos2(20.0, 20.0), false));
    }

    #[test]
    fn finish_is_idempotent() {
        let mut session = session_with_layout();
        session.start();
        let first = session.finish();
        assert_eq!(first, Some(CropRect::new(40.0, 30.0, 320.0, 240.0)));
        assert_eq!(session.finish(), None);
        assert_eq!(session.applied(), first);
        assert_eq!(session.state(), CropState::Idle);
    }

    #[test]
    fn finish_while_dragging_commits_and_closes() {
        let mut session = session_with_layout();
        session.start();
        session.begin_move_drag(pos2(300.0, 250.0));
        assert!(session.finish().is_some());
        assert_eq!(session.state(), CropState::Idle);
        assert!(!session.is_dragging());
    }

    #[test]
    fn toggle_alternates() {
        let mut session = session_with_layout();
        assert!(session.toggle());
        assert!(!session.toggle());
        assert!(session.applied().is_some());
    }

    #[test]
    fn new_image_resets_rectangles() {
        let mut session = session_with_layout();
        session.start();
        session.finish();
        session.reset_for_image(Some(ImageSize::new(50, 50)));
        assert_eq!(session.applied(), None);
        assert_eq!(session.working(), None);
        assert!(session.metrics().is_none());
    }

    #[test]
    fn unchanged_metrics_are_not_resynced() {
        let mut session = session_with_layout();
        let metrics = session.metrics().copied();
        assert!(!session.sync_metrics(metrics, 1.0));
        assert!(session.sync_metrics(metrics, 2.0));
    }

    #[test]
    fn hit_test_prefers_handles() {
        let mut session = session_with_layout();
        session.start();
        assert_eq!(session.hit_test(pos2(241.0, 181.0)), Some(CropHit::Handle(Handle::Nw)));
        assert_eq!(session.hit_test(pos2(400.0, 300.0)), Some(CropHit::Inside));
        assert_eq!(session.hit_test(pos2(10.0, 10.0)), None);
    }

    #[test]
    fn clip_box_only_outside_session() {
        let mut session = session_with_layout();
        session.start();
        session.finish();
        let clip = session.applied_clip_box().unwrap();
        assert_eq!(clip.left, 240.0);
        session.start();
        assert!(session.applied_clip_box().is_none());
    }
}
