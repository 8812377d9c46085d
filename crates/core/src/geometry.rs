//! Crop geometry engine.
//!
//! Pure functions that translate between screen space (egui points inside
//! the canvas container) and image-pixel space (the natural, unscaled pixel
//! grid of the loaded image), and that compute crop rectangles under move
//! and resize drags.
//!
//! # Coordinate Mapping
//!
//! The scaled image box is centered in the container and shifted by the pan
//! offset:
//!
//! ```text
//! relative_left = container_width / 2 + offset.x - natural_width * scale / 2
//! screen_x      = container_left + relative_left + image_x * scale
//! ```
//!
//! Nothing in here holds state. When the container or the image cannot be
//! measured yet, functions return `None` and the caller keeps what it had.

use eframe::egui::{Pos2, Rect, Vec2, pos2};
use serde::{Deserialize, Serialize};

/// Smallest width or height a crop rectangle may have, in image pixels.
pub const MIN_SIZE: f32 = 12.0;

/// Inset used for the initial crop rectangle of a fresh session.
pub const DEFAULT_PADDING: f32 = 0.1;

/// Tolerance used when checking containment after float arithmetic.
const EPSILON: f32 = 1e-3;

/// Clamps without panicking when `min > max`; `min` wins in that case.
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.min(max).max(min)
}

/// Intrinsic pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// An image smaller than [`MIN_SIZE`] on either axis cannot hold a crop.
    pub fn can_crop(self) -> bool {
        self.width as f32 >= MIN_SIZE && self.height as f32 >= MIN_SIZE
    }
}

/// Axis-aligned rectangle in image-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Width divided by height, `1.0` for a degenerate rectangle.
    pub fn aspect_ratio(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    pub fn contains(&self, point: Pos2) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Overlapping area of two rectangles, `None` when they only touch or miss.
    pub fn intersect(&self, other: &CropRect) -> Option<CropRect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let width = (right - x).max(0.0);
        let height = (bottom - y).max(0.0);
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(CropRect::new(x, y, width, height))
    }

    /// Whether the rectangle is a legal crop for an image of `natural` size.
    pub fn fits(&self, natural: Vec2) -> bool {
        self.x >= -EPSILON
            && self.y >= -EPSILON
            && self.right() <= natural.x + EPSILON
            && self.bottom() <= natural.y + EPSILON
            && self.width >= MIN_SIZE - EPSILON
            && self.height >= MIN_SIZE - EPSILON
    }
}

/// Snapshot translating between image-pixel space and screen space.
///
/// Compared by field equality so that an unchanged layout does not trigger
/// downstream recomputation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub natural_width: f32,
    pub natural_height: f32,
    pub container_width: f32,
    pub container_height: f32,
    /// Scaled image size on screen.
    pub box_width: f32,
    pub box_height: f32,
    /// Absolute screen position of the image's top-left corner.
    pub box_left: f32,
    pub box_top: f32,
    /// Image top-left relative to the container's top-left.
    pub relative_left: f32,
    pub relative_top: f32,
}

impl Metrics {
    pub fn natural_size(&self) -> Vec2 {
        Vec2::new(self.natural_width, self.natural_height)
    }

    /// Screen rectangle covered by the scaled image.
    pub fn image_rect(&self) -> Rect {
        Rect::from_min_size(pos2(self.box_left, self.box_top), Vec2::new(self.box_width, self.box_height))
    }
}

/// Centers the scaled image inside `container` and records the result.
///
/// Returns `None` if either the container or the image has no measurable size.
pub fn compute_metrics(
    container: Rect,
    natural: Option<ImageSize>,
    scale: f32,
    offset: Vec2,
) -> Option<Metrics> {
    let natural = natural?;
    if natural.width == 0 || natural.height == 0 {
        return None;
    }
    if !(container.width() > 0.0 && container.height() > 0.0) || !(scale > 0.0) {
        return None;
    }

    let natural_width = natural.width as f32;
    let natural_height = natural.height as f32;
    let box_width = natural_width * scale;
    let box_height = natural_height * scale;
    let relative_left = container.width() / 2.0 + offset.x - box_width / 2.0;
    let relative_top = container.height() / 2.0 + offset.y - box_height / 2.0;

    Some(Metrics {
        natural_width,
        natural_height,
        container_width: container.width(),
        container_height: container.height(),
        box_width,
        box_height,
        box_left: container.min.x + relative_left,
        box_top: container.min.y + relative_top,
        relative_left,
        relative_top,
    })
}

/// Rectangle inset by `padding` (a fraction of each side) from the image edges.
pub fn create_default_rect(metrics: &Metrics, padding: f32) -> Option<CropRect> {
    default_rect_for(metrics.natural_size(), padding)
}

/// Same as [`create_default_rect`] but from a bare image size, so a crop
/// session can start before the container has been laid out.
pub fn default_rect_for(natural: Vec2, padding: f32) -> Option<CropRect> {
    if natural.x < MIN_SIZE || natural.y < MIN_SIZE {
        return None;
    }
    let padding = clamp(padding, 0.0, 0.5);
    let width = (natural.x * (1.0 - padding * 2.0)).max(MIN_SIZE);
    let height = (natural.y * (1.0 - padding * 2.0)).max(MIN_SIZE);
    Some(CropRect {
        x: clamp(natural.x * padding, 0.0, natural.x - width),
        y: clamp(natural.y * padding, 0.0, natural.y - height),
        width,
        height,
    })
}

/// Inverse projection of a screen point into image space, clamped to the image.
pub fn point_to_image_space(screen: Pos2, metrics: &Metrics, scale: f32) -> Option<Pos2> {
    if !(scale > 0.0) {
        return None;
    }
    let x = (screen.x - metrics.box_left) / scale;
    let y = (screen.y - metrics.box_top) / scale;
    Some(pos2(
        clamp(x, 0.0, metrics.natural_width),
        clamp(y, 0.0, metrics.natural_height),
    ))
}

/// Forward projection of an image-space point onto the screen.
pub fn image_point_to_screen(point: Pos2, metrics: &Metrics, scale: f32) -> Pos2 {
    pos2(metrics.box_left + point.x * scale, metrics.box_top + point.y * scale)
}

/// Translates `start_rect` by the pointer delta, keeping it inside the image.
pub fn calculate_move_rect(start_rect: CropRect, start_point: Pos2, point: Pos2, natural: Vec2) -> CropRect {
    let delta = point - start_point;
    CropRect {
        x: clamp(start_rect.x + delta.x, 0.0, natural.x - start_rect.width),
        y: clamp(start_rect.y + delta.y, 0.0, natural.y - start_rect.height),
        ..start_rect
    }
}

/// One of the eight resize anchors of the crop box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handle {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl Handle {
    /// Drawing order: corners and edge midpoints clockwise from the top-left.
    pub const ALL: [Handle; 8] = [
        Handle::Nw,
        Handle::N,
        Handle::Ne,
        Handle::E,
        Handle::Se,
        Handle::S,
        Handle::Sw,
        Handle::W,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Handle::N => "n",
            Handle::Ne => "ne",
            Handle::E => "e",
            Handle::Se => "se",
            Handle::S => "s",
            Handle::Sw => "sw",
            Handle::W => "w",
            Handle::Nw => "nw",
        }
    }

    pub fn from_id(id: &str) -> Option<Handle> {
        Handle::ALL.into_iter().find(|handle| handle.id() == id)
    }

    pub fn is_corner(self) -> bool {
        matches!(self, Handle::Ne | Handle::Se | Handle::Sw | Handle::Nw)
    }
}

/// Shrinks one axis of a corner resize so that `width / height == aspect`.
fn apply_aspect(width: f32, height: f32, aspect: f32) -> (f32, f32) {
    let target = if aspect > 0.0 && aspect.is_finite() { aspect } else { 1.0 };
    let current = if height > 0.0 { width / height } else { target };
    if current > target {
        (height * target, height)
    } else {
        (width, width / target)
    }
}

/// Resizes `start_rect` by dragging `handle` to `point` (image space).
///
/// Edge handles move a single edge. Corner handles move two edges and, with
/// `keep_aspect`, shrink the dominant axis so the box keeps `aspect`. The
/// opposite edges stay fixed and can never be crossed. A result smaller than
/// [`MIN_SIZE`] or outside the image is rejected with `None`.
pub fn calculate_handle_rect(
    handle: Handle,
    start_rect: CropRect,
    point: Pos2,
    aspect: f32,
    keep_aspect: bool,
    natural: Vec2,
) -> Option<CropRect> {
    if natural.x < MIN_SIZE || natural.y < MIN_SIZE {
        return None;
    }
    let max_x = natural.x;
    let max_y = natural.y;

    let CropRect {
        mut x,
        mut y,
        mut width,
        mut height,
    } = start_rect;
    let right = start_rect.right();
    let bottom = start_rect.bottom();

    let sized = |w: f32, h: f32| {
        if keep_aspect { apply_aspect(w, h, aspect) } else { (w, h) }
    };

    match handle {
        Handle::N => {
            y = clamp(point.y, 0.0, bottom - MIN_SIZE);
            height = bottom - y;
        }
        Handle::S => {
            let new_bottom = clamp(point.y, y + MIN_SIZE, max_y);
            height = new_bottom - y;
        }
        Handle::W => {
            x = clamp(point.x, 0.0, right - MIN_SIZE);
            width = right - x;
        }
        Handle::E => {
            let new_right = clamp(point.x, x + MIN_SIZE, max_x);
            width = new_right - x;
        }
        Handle::Nw => {
            let new_x = clamp(point.x, 0.0, right - MIN_SIZE);
            let new_y = clamp(point.y, 0.0, bottom - MIN_SIZE);
            (width, height) = sized(right - new_x, bottom - new_y);
            x = right - width;
            y = bottom - height;
        }
        Handle::Ne => {
            let new_right = clamp(point.x, x + MIN_SIZE, max_x);
            let new_y = clamp(point.y, 0.0, bottom - MIN_SIZE);
            (width, height) = sized(new_right - x, bottom - new_y);
            y = bottom - height;
        }
        Handle::Sw => {
            let new_x = clamp(point.x, 0.0, right - MIN_SIZE);
            let new_bottom = clamp(point.y, y + MIN_SIZE, max_y);
            (width, height) = sized(right - new_x, new_bottom - y);
            x = right - width;
        }
        Handle::Se => {
            let new_right = clamp(point.x, x + MIN_SIZE, max_x);
            let new_bottom = clamp(point.y, y + MIN_SIZE, max_y);
            (width, height) = sized(new_right - x, new_bottom - y);
        }
    }

    // Aspect locking may push the minor axis under the floor.
    if width < MIN_SIZE - EPSILON || height < MIN_SIZE - EPSILON {
        return None;
    }

    let clamped_x = clamp(x, 0.0, max_x - MIN_SIZE);
    let clamped_y = clamp(y, 0.0, max_y - MIN_SIZE);
    let rect = CropRect {
        x: clamped_x,
        y: clamped_y,
        width: clamp(width, MIN_SIZE, max_x - clamped_x),
        height: clamp(height, MIN_SIZE, max_y - clamped_y),
    };

    rect.fits(natural).then_some(rect)
}

/// Screen-space box for an image-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayBox {
    /// Absolute screen coordinates.
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// Position relative to the container's top-left.
    pub relative_left: f32,
    pub relative_top: f32,
}

impl OverlayBox {
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(pos2(self.left, self.top), Vec2::new(self.width, self.height))
    }
}

/// Projects an image-space rectangle onto the screen.
pub fn build_overlay_box(rect: &CropRect, metrics: &Metrics, scale: f32) -> OverlayBox {
    OverlayBox {
        left: metrics.box_left + rect.x * scale,
        top: metrics.box_top + rect.y * scale,
        width: rect.width * scale,
        height: rect.height * scale,
        relative_left: metrics.relative_left + rect.x * scale,
        relative_top: metrics.relative_top + rect.y * scale,
    }
}

/// Screen position of one resize handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandlePosition {
    pub handle: Handle,
    pub pos: Pos2,
}

/// Corner and edge-midpoint positions of an overlay box, in [`Handle::ALL`] order.
pub fn build_handle_positions(overlay: &OverlayBox) -> [HandlePosition; 8] {
    let left = overlay.left;
    let top = overlay.top;
    let right = left + overlay.width;
    let bottom = top + overlay.height;
    let cx = left + overlay.width / 2.0;
    let cy = top + overlay.height / 2.0;

    Handle::ALL.map(|handle| {
        let pos = match handle {
            Handle::Nw => pos2(left, top),
            Handle::N => pos2(cx, top),
            Handle::Ne => pos2(right, top),
            Handle::E => pos2(right, cy),
            Handle::Se => pos2(right, bottom),
            Handle::S => pos2(cx, bottom),
            Handle::Sw => pos2(left, bottom),
            Handle::W => pos2(left, cy),
        };
        HandlePosition { handle, pos }
    })
}

/// The handle whose grab area contains `pointer`, nearest first.
pub fn handle_at(positions: &[HandlePosition], pointer: Pos2, radius: f32) -> Option<Handle> {
    positions
        .iter()
        .map(|hp| (hp.handle, hp.pos.distance(pointer)))
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(handle, _)| handle)
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Image size plus a valid crop rectangle inside it.
    fn image_and_rect() -> impl Strategy<Value = (Vec2, CropRect)> {
        (12u32..=2000, 12u32..=2000).prop_flat_map(|(w, h)| {
            let (w, h) = (w as f32, h as f32);
            (MIN_SIZE..=w, MIN_SIZE..=h).prop_flat_map(move |(rw, rh)| {
                (0.0..=(w - rw), 0.0..=(h - rh))
                    .prop_map(move |(x, y)| (Vec2::new(w, h), CropRect::new(x, y, rw, rh)))
            })
        })
    }

    fn handle_strategy() -> impl Strategy<Value = Handle> {
        prop::sample::select(Handle::ALL.to_vec())
    }

    fn assert_fits(rect: &CropRect, natural: Vec2) -> Result<(), TestCaseError> {
        prop_assert!(rect.x >= 0.0, "x {} below zero", rect.x);
        prop_assert!(rect.y >= 0.0, "y {} below zero", rect.y);
        prop_assert!(rect.right() <= natural.x + EPSILON, "right {} past {}", rect.right(), natural.x);
        prop_assert!(rect.bottom() <= natural.y + EPSILON, "bottom {} past {}", rect.bottom(), natural.y);
        prop_assert!(rect.width >= MIN_SIZE - EPSILON, "width {} under floor", rect.width);
        prop_assert!(rect.height >= MIN_SIZE - EPSILON, "height {} under floor", rect.height);
        Ok(())
    }

    proptest! {
        /// Property: handle drags never leave the image or shrink under the floor.
        #[test]
        fn prop_handle_rect_stays_valid(
            (natural, start) in image_and_rect(),
            handle in handle_strategy(),
            (fx, fy) in (0.0f32..=1.0, 0.0f32..=1.0),
            keep_aspect in any::<bool>(),
        ) {
            let point = pos2(fx * natural.x, fy * natural.y);
            if let Some(rect) = calculate_handle_rect(handle, start, point, start.aspect_ratio(), keep_aspect, natural) {
                assert_fits(&rect, natural)?;
            } else {
                prop_assert!(keep_aspect && handle.is_corner(), "only aspect-locked corners may be rejected");
            }
        }

        /// Property: moving never leaves the image and never resizes.
        #[test]
        fn prop_move_rect_stays_valid(
            (natural, start) in image_and_rect(),
            (sx, sy, px, py) in (0.0f32..=1.0, 0.0f32..=1.0, -1.0f32..=2.0, -1.0f32..=2.0),
        ) {
            let start_point = pos2(sx * natural.x, sy * natural.y);
            let point = pos2(px * natural.x, py * natural.y);
            let rect = calculate_move_rect(start, start_point, point, natural);
            assert_fits(&rect, natural)?;
            prop_assert_eq!(rect.width, start.width);
            prop_assert_eq!(rect.height, start.height);
        }

        /// Property: aspect-locked corner drags keep the ratio captured at drag start.
        #[test]
        fn prop_corner_aspect_preserved(
            (natural, start) in image_and_rect(),
            handle in prop::sample::select(vec![Handle::Ne, Handle::Se, Handle::Sw, Handle::Nw]),
            (fx, fy) in (0.0f32..=1.0, 0.0f32..=1.0),
        ) {
            let aspect = start.aspect_ratio();
            let point = pos2(fx * natural.x, fy * natural.y);
            if let Some(rect) = calculate_handle_rect(handle, start, point, aspect, true, natural) {
                let ratio = rect.width / rect.height;
                prop_assert!((ratio - aspect).abs() <= aspect * 1e-3, "ratio {} vs {}", ratio, aspect);
            }
        }

        /// Property: projecting to the screen and back returns the same image point.
        #[test]
        fn prop_projection_round_trips(
            (w, h) in (1u32..=4000, 1u32..=4000),
            scale in 0.2f32..=5.0,
            (ox, oy) in (-500.0f32..=500.0, -500.0f32..=500.0),
            (fx, fy) in (0.0f32..=1.0, 0.0f32..=1.0),
        ) {
            let container = Rect::from_min_size(pos2(30.0, 40.0), Vec2::new(1024.0, 768.0));
            let metrics = compute_metrics(container, Some(ImageSize::new(w, h)), scale, Vec2::new(ox, oy)).unwrap();
            let point = pos2(fx * w as f32, fy * h as f32);
            let screen = image_point_to_screen(point, &metrics, scale);
            let back = point_to_image_space(screen, &metrics, scale).unwrap();
            let tolerance = 1e-2 * (1.0 + w.max(h) as f32 / 1000.0);
            prop_assert!((back.x - point.x).abs() <= tolerance, "x {} vs {}", back.x, point.x);
            prop_assert!((back.y - point.y).abs() <= tolerance, "y {} vs {}", back.y, point.y);
        }
    }
}
