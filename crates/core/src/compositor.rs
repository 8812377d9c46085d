//! Cover rectangles and the two ways they reach the user.
//!
//! The render path projects covers onto the screen for drawing; the bake
//! path paints them into a new raster for export, copy and upload.

use crate::geometry::{CropRect, ImageSize, Metrics, OverlayBox, build_overlay_box};
use crate::image_processing::ImageProcessor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Side length of a cover added by hand.
const DEFAULT_COVER_SIDE: f32 = 50.0;
/// Top-left of a cover added by hand.
const DEFAULT_COVER_ORIGIN: (f32, f32) = (20.0, 10.0);

/// A redaction box in image-pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverRect {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// RGBA fill; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 4]>,
}

impl CoverRect {
    pub fn new(id: impl Into<String>, rect: CropRect) -> Self {
        Self {
            id: id.into(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            color: None,
        }
    }

    pub fn rect(&self) -> CropRect {
        CropRect::new(self.x, self.y, self.width, self.height)
    }
}

/// The cover set of the current image.
///
/// Covers survive toggling; only an image change or an explicit clear
/// removes them.
#[derive(Debug, Clone, Default)]
pub struct CoverSet {
    covers: Vec<CoverRect>,
    enabled: bool,
    next_id: u64,
}

impl CoverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a square cover near the top-left corner and enables the set.
    ///
    /// Returns `None` for an empty image.
    pub fn add_default(&mut self, image: ImageSize) -> Option<&CoverRect> {
        let natural = image.as_vec2();
        if natural.x <= 0.0 || natural.y <= 0.0 {
            return None;
        }
        let side = DEFAULT_COVER_SIDE.min(natural.x).min(natural.y);
        let x = DEFAULT_COVER_ORIGIN.0.min(natural.x - side).max(0.0);
        let y = DEFAULT_COVER_ORIGIN.1.min(natural.y - side).max(0.0);

        self.next_id += 1;
        let id = format!("cover-{}", self.next_id);
        self.covers.push(CoverRect::new(id, CropRect::new(x, y, side, side)));
        self.enabled = true;
        self.covers.last()
    }

    /// Swaps in a new set, e.g. regions returned by detection.
    pub fn replace(&mut self, covers: Vec<CoverRect>) {
        debug!(count = covers.len(), "replacing cover set");
        self.covers = covers;
        self.enabled = !self.covers.is_empty();
    }

    pub fn clear(&mut self) {
        self.covers.clear();
        self.enabled = false;
    }

    /// Flips visibility without touching the rectangles.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn covers(&self) -> &[CoverRect] {
        &self.covers
    }

    /// Covers that should be drawn or baked right now.
    pub fn active(&self) -> &[CoverRect] {
        if self.enabled { &self.covers } else { &[] }
    }

    pub fn is_empty(&self) -> bool {
        self.covers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.covers.len()
    }
}

/// Screen-space box of one visible cover.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverBox {
    pub id: String,
    pub overlay: OverlayBox,
    pub color: Option<[u8; 4]>,
}

/// Projects covers onto the screen, clipped to `clip` when given.
///
/// A cover entirely outside the clip region produces no box.
pub fn cover_boxes(covers: &[CoverRect], clip: Option<&CropRect>, metrics: &Metrics, scale: f32) -> Vec<CoverBox> {
    covers
        .iter()
        .filter_map(|cover| {
            let rect = match clip {
                Some(clip) => cover.rect().intersect(clip)?,
                None => cover.rect(),
            };
            Some(CoverBox {
                id: cover.id.clone(),
                overlay: build_overlay_box(&rect, metrics, scale),
                color: cover.color,
            })
        })
        .collect()
}

/// Inputs to a bake, captured when the job starts.
#[derive(Debug, Clone)]
pub struct BakeRequest {
    pub data: Arc<[u8]>,
    pub crop: Option<CropRect>,
    pub covers: Vec<CoverRect>,
    pub default_color: [u8; 4],
}

impl BakeRequest {
    /// Whether baking would change the image at all.
    pub fn is_noop(&self) -> bool {
        self.crop.is_none() && self.covers.is_empty()
    }
}

/// Runs the bake on the blocking pool.
///
/// Returns `None` when decoding or encoding fails; callers fall back to
/// the un-baked image.
pub async fn bake(request: BakeRequest) -> Option<Vec<u8>> {
    let result = tokio::task::spawn_blocking(move || {
        ImageProcessor::bake(
            &request.data,
            request.crop.as_ref(),
            &request.covers,
            request.default_color,
        )
    })
    .await;

    match result {
        Ok(Ok(png)) => Some(png),
        Ok(Err(e)) => {
            warn!(error = %e, "bake unavailable");
            None
        }
        Err(e) => {
            warn!(error = %e, "bake task failed");
            None
        }
    }
}
