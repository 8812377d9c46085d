//! The editor: one image, its viewport, crop session and covers.
//!
//! All state changes happen synchronously on the caller's thread. Work that
//! needs I/O is captured as a [`PayloadJob`] snapshot that can run anywhere;
//! its result is tagged with the store generation it was taken from so the
//! editor can drop results for an image that has since been replaced.

use crate::clipboard::{ClipboardBackend, ClipboardImage};
use crate::compositor::{self, BakeRequest, CoverBox, CoverRect, CoverSet};
use crate::config::Config;
use crate::crop::{CropHit, CropSession, CropState};
use crate::error::{AppError, Result};
use crate::export::suggested_filename;
use crate::geometry::{self, CropRect, ImageSize, Metrics};
use crate::image_processing::{ImageProcessor, encode_png};
use crate::image_store::{BlobSource, DisplayHandles, ImageBlob, ImageStore};
use crate::viewport::Viewport;
use eframe::egui::{Pos2, Rect};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// Name given to images that arrive as raw clipboard pixels.
pub const PASTED_IMAGE_NAME: &str = "pasted-image.png";

/// Commands the surrounding chrome may issue.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    OpenFile(PathBuf),
    ToggleCrop,
    StartCrop,
    FinishCrop,
    CancelCrop,
    ToggleCovers,
    AddCover,
    ClearImage,
}

/// Notifications for the surrounding chrome.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    ImageChanged {
        name: Option<String>,
        size: Option<ImageSize>,
    },
    CropModeChanged {
        active: bool,
    },
    CropApplied(CropRect),
    CoversChanged {
        count: usize,
        enabled: bool,
    },
}

/// What a pointer-down started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    CropHandle,
    CropMove,
    Pan,
    Nothing,
}

/// What to hand out when baking fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// The full image, with covers baked when they still can be.
    Original,
    /// Nothing, if a crop was requested; the un-baked image otherwise.
    FailIfCropped,
}

/// Snapshot of everything needed to produce the outgoing image.
#[derive(Debug, Clone)]
pub struct PayloadJob {
    pub generation: u64,
    pub source: BlobSource,
    pub crop: Option<CropRect>,
    pub covers: Vec<CoverRect>,
    pub cover_color: [u8; 4],
}

impl PayloadJob {
    /// Resolves the image and bakes crop and covers into it.
    pub async fn render(self, fallback: Fallback) -> Option<ImageBlob> {
        let original = match self.source.resolve().await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "could not read image back");
                return None;
            }
        };

        let request = BakeRequest {
            data: original.data.clone(),
            crop: self.crop,
            covers: self.covers,
            default_color: self.cover_color,
        };
        if request.is_noop() {
            return Some(original);
        }

        let had_crop = request.crop.is_some();
        let uncropped = BakeRequest {
            crop: None,
            ..request.clone()
        };
        if let Some(png) = compositor::bake(request).await {
            return Some(ImageBlob::new(png, suggested_filename(Some(&original.name))));
        }
        if had_crop && fallback == Fallback::FailIfCropped {
            return None;
        }
        if had_crop && !uncropped.is_noop() {
            if let Some(png) = compositor::bake(uncropped).await {
                debug!("crop could not be produced, using the covered full image");
                return Some(ImageBlob::new(png, original.name.clone()));
            }
        }
        debug!("falling back to the un-baked image");
        Some(original)
    }
}

pub struct Editor<H: DisplayHandles> {
    store: ImageStore<H>,
    viewport: Viewport,
    crop: CropSession,
    covers: CoverSet,
    cover_color: [u8; 4],
    events: Option<Sender<EditorEvent>>,
}

impl<H: DisplayHandles> Editor<H> {
    pub fn new(handles: H, config: &Config) -> Self {
        Self {
            store: ImageStore::new(handles),
            viewport: Viewport::new(config.zoom),
            crop: CropSession::new(),
            covers: CoverSet::new(),
            cover_color: config.cover_color,
            events: None,
        }
    }

    /// Routes [`EditorEvent`]s to `sender`.
    pub fn with_events(mut self, sender: Sender<EditorEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: EditorEvent) {
        if let Some(sender) = &self.events {
            // A closed receiver only means nobody is listening any more.
            let _ = sender.send(event);
        }
    }

    pub fn store(&self) -> &ImageStore<H> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ImageStore<H> {
        &mut self.store
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn crop(&self) -> &CropSession {
        &self.crop
    }

    pub fn covers(&self) -> &CoverSet {
        &self.covers
    }

    pub fn cover_color(&self) -> [u8; 4] {
        self.cover_color
    }

    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    /// Whether a job taken at `generation` still describes the loaded image.
    pub fn is_current(&self, generation: u64) -> bool {
        self.store.generation() == generation
    }

    // Image lifecycle

    pub fn open_file(&mut self, path: &std::path::Path) -> bool {
        let loaded = self.store.load_from_file(path);
        if loaded {
            self.image_changed();
        }
        loaded
    }

    pub fn load_binary(&mut self, data: impl Into<std::sync::Arc<[u8]>>, name: impl Into<String>) -> bool {
        let loaded = self.store.load_from_binary(data, name);
        if loaded {
            self.image_changed();
        }
        loaded
    }

    pub fn clear_image(&mut self) {
        if self.store.has_image() {
            self.store.clear();
            self.image_changed();
        }
    }

    fn image_changed(&mut self) {
        let was_active = self.crop.is_active();
        self.crop.reset_for_image(self.store.size());
        self.covers.clear();

        self.emit(EditorEvent::ImageChanged {
            name: self.store.filename().map(str::to_string),
            size: self.store.size(),
        });
        if was_active {
            self.emit(EditorEvent::CropModeChanged { active: false });
        }
        self.emit_covers();
    }

    /// Loads whatever image the clipboard holds.
    ///
    /// Returns `false` when the clipboard is unavailable or holds no image.
    pub fn paste(&mut self, clipboard: &mut impl ClipboardBackend) -> bool {
        let content = match clipboard.read_image() {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!("clipboard holds no image");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "paste failed");
                return false;
            }
        };

        match content {
            ClipboardImage::Pixels(pixels) => match encode_png(&pixels) {
                Ok(png) => self.load_binary(png, PASTED_IMAGE_NAME),
                Err(e) => {
                    warn!(error = %e, "could not encode pasted pixels");
                    false
                }
            },
            ClipboardImage::File(path) => self.open_file(&path),
        }
    }

    // Crop session

    pub fn start_crop(&mut self) -> bool {
        let was_active = self.crop.is_active();
        let active = self.crop.start();
        if active && !was_active {
            self.emit(EditorEvent::CropModeChanged { active: true });
        }
        active
    }

    /// Commits the crop; a no-op finish still closes the session.
    pub fn finish_crop(&mut self) -> Option<CropRect> {
        let was_active = self.crop.is_active();
        let committed = self.crop.finish();
        if let Some(rect) = committed {
            info!(?rect, "crop committed");
            self.emit(EditorEvent::CropApplied(rect));
        }
        if was_active {
            self.emit(EditorEvent::CropModeChanged { active: false });
        }
        committed
    }

    pub fn cancel_crop(&mut self) {
        if self.crop.is_active() {
            self.crop.cancel();
            self.emit(EditorEvent::CropModeChanged { active: false });
        }
    }

    /// Drops the applied crop so the full image is used again.
    pub fn remove_crop(&mut self) {
        if self.crop.applied().is_some() {
            self.crop.clear_applied();
            debug!("applied crop removed");
        }
    }

    pub fn toggle_crop(&mut self) -> bool {
        if self.crop.is_active() {
            self.finish_crop();
            false
        } else {
            self.start_crop()
        }
    }

    // Covers

    pub fn add_cover(&mut self) -> bool {
        let Some(size) = self.store.size() else {
            return false;
        };
        let added = self.covers.add_default(size).is_some();
        if added {
            self.emit_covers();
        }
        added
    }

    pub fn toggle_covers(&mut self) -> bool {
        let enabled = self.covers.toggle();
        self.emit_covers();
        enabled
    }

    pub fn replace_covers(&mut self, covers: Vec<CoverRect>) {
        self.covers.replace(covers);
        self.emit_covers();
    }

    pub fn clear_covers(&mut self) {
        self.covers.clear();
        self.emit_covers();
    }

    /// Applies a detection result taken at `generation`.
    ///
    /// Success replaces the cover set; failure clears it. Results for a
    /// replaced image are dropped. Returns whether anything was applied.
    pub fn apply_detection(&mut self, generation: u64, result: Result<Vec<CoverRect>>) -> bool {
        if !self.is_current(generation) {
            debug!(generation, "dropping stale detection result");
            return false;
        }
        match result {
            Ok(covers) => self.replace_covers(covers),
            Err(e) => {
                warn!(error = %e, "region detection failed, clearing covers");
                self.clear_covers();
            }
        }
        true
    }

    fn emit_covers(&self) {
        self.emit(EditorEvent::CoversChanged {
            count: self.covers.len(),
            enabled: self.covers.is_enabled(),
        });
    }

    pub fn dispatch(&mut self, action: EditorAction) -> bool {
        debug!(?action, "dispatch");
        match action {
            EditorAction::OpenFile(path) => self.open_file(&path),
            EditorAction::ToggleCrop => self.toggle_crop(),
            EditorAction::StartCrop => self.start_crop(),
            EditorAction::FinishCrop => self.finish_crop().is_some(),
            EditorAction::CancelCrop => {
                self.cancel_crop();
                true
            }
            EditorAction::ToggleCovers => self.toggle_covers(),
            EditorAction::AddCover => self.add_cover(),
            EditorAction::ClearImage => {
                self.clear_image();
                true
            }
        }
    }

    // Layout and pointer input

    /// Measures the image inside `container` and hands the result to the
    /// crop session. `None` until both are measurable.
    pub fn layout(&mut self, container: Rect) -> Option<Metrics> {
        let scale = self.viewport.scale();
        let metrics = geometry::compute_metrics(container, self.store.size(), scale, self.viewport.offset());
        self.crop.sync_metrics(metrics, scale);
        metrics
    }

    pub fn zoom(&mut self, wheel_delta: f32) -> f32 {
        self.viewport.zoom(wheel_delta)
    }

    pub fn reset_view(&mut self) {
        self.viewport.reset();
    }

    /// Starts a crop drag when a session is active, otherwise a pan.
    pub fn pointer_down(&mut self, pointer: Pos2) -> PointerTarget {
        if self.crop.is_active() {
            return match self.crop.hit_test(pointer) {
                Some(CropHit::Handle(handle)) if self.crop.begin_handle_drag(handle, pointer) => {
                    PointerTarget::CropHandle
                }
                Some(CropHit::Inside) if self.crop.begin_move_drag(pointer) => PointerTarget::CropMove,
                _ => PointerTarget::Nothing,
            };
        }
        if !self.store.has_image() {
            return PointerTarget::Nothing;
        }
        self.viewport.begin_pan(pointer);
        PointerTarget::Pan
    }

    /// Returns whether anything on screen moved.
    pub fn pointer_move(&mut self, pointer: Pos2, keep_aspect: bool) -> bool {
        if self.crop.is_dragging() {
            return self.crop.pointer_move(pointer, keep_aspect);
        }
        self.viewport.pan_to(pointer).is_some()
    }

    /// Pointer-up and pointer-leave.
    pub fn pointer_up(&mut self) {
        self.crop.pointer_up();
        self.viewport.end_pan();
    }

    pub fn crop_state(&self) -> CropState {
        self.crop.state()
    }

    /// Covers to draw. Clipped to the applied crop while it is shown as a mask.
    pub fn cover_boxes(&self) -> Vec<CoverBox> {
        let Some(metrics) = self.crop.metrics() else {
            return Vec::new();
        };
        let clip = if self.crop.is_active() { None } else { self.crop.applied() };
        compositor::cover_boxes(self.covers.active(), clip.as_ref(), metrics, self.viewport.scale())
    }

    // Outgoing images

    /// Snapshot for copy, export and upload.
    pub fn payload_job(&self) -> Option<PayloadJob> {
        Some(PayloadJob {
            generation: self.store.generation(),
            source: self.store.blob_source()?,
            crop: self.crop.applied(),
            covers: self.covers.active().to_vec(),
            cover_color: self.cover_color,
        })
    }

    /// Suggested save-as name for the current image.
    pub fn export_name(&self) -> String {
        suggested_filename(self.store.filename())
    }
}

/// Writes `blob` to the clipboard as pixels. `false` when the clipboard
/// refused or the blob does not decode.
pub fn copy_blob(blob: &ImageBlob, clipboard: &mut impl ClipboardBackend) -> bool {
    let result = ImageProcessor::to_rgba(&blob.data).and_then(|pixels| clipboard.write_image(&pixels));
    match result {
        Ok(()) => {
            info!(name = %blob.name, "image copied");
            true
        }
        Err(e) => {
            warn!(error = %e, "copy failed");
            false
        }
    }
}

/// Copies the best payload of `job` to the clipboard: the applied crop when
/// it can be produced, otherwise the full current image.
pub async fn copy_job(job: PayloadJob, clipboard: &mut impl ClipboardBackend) -> Result<()> {
    let blob = job
        .render(Fallback::Original)
        .await
        .ok_or_else(|| AppError::image("Image could not be read back"))?;
    if copy_blob(&blob, clipboard) {
        Ok(())
    } else {
        Err(AppError::clipboard("Clipboard refused the image"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::image_store::HandleCounter;
    use eframe::egui::{Vec2, pos2};
    use image::{Rgba, RgbaImage};
    use std::sync::mpsc;

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))).unwrap()
    }

    fn editor() -> (Editor<HandleCounter>, mpsc::Receiver<EditorEvent>) {
        let (tx, rx) = mpsc::channel();
        let config = Config::builder().build().unwrap();
        (Editor::new(HandleCounter::default(), &config).with_events(tx), rx)
    }

    fn container() -> Rect {
        Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0))
    }

    #[test]
    fn new_image_resets_crop_and_covers() {
        let (mut editor, rx) = editor();
        assert!(editor.load_binary(png(400, 300), "a.png"));
        editor.layout(container());

        assert!(editor.start_crop());
        editor.finish_crop().unwrap();
        editor.add_cover();
        assert!(editor.crop().applied().is_some());
        assert_eq!(editor.covers().len(), 1);

        assert!(editor.load_binary(png(200, 100), "b.png"));
        assert_eq!(editor.crop().applied(), None);
        assert!(editor.covers().is_empty());
        assert_eq!(editor.crop_state(), CropState::Idle);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&EditorEvent::ImageChanged {
            name: Some("b.png".to_string()),
            size: Some(ImageSize::new(200, 100)),
        }));
    }

    #[test]
    fn dispatch_drives_crop_mode() {
        let (mut editor, rx) = editor();
        assert!(!editor.dispatch(EditorAction::ToggleCrop));
        editor.load_binary(png(400, 300), "a.png");
        rx.try_iter().count();

        assert!(editor.dispatch(EditorAction::ToggleCrop));
        assert!(!editor.dispatch(EditorAction::ToggleCrop));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                EditorEvent::CropModeChanged { active: true },
                EditorEvent::CropApplied(CropRect::new(40.0, 30.0, 320.0, 240.0)),
                EditorEvent::CropModeChanged { active: false },
            ]
        );
    }

    #[test]
    fn pointer_pans_when_idle_and_crops_when_active() {
        let (mut editor, _rx) = editor();
        editor.load_binary(png(400, 300), "a.png");
        editor.layout(container());

        assert_eq!(editor.pointer_down(pos2(10.0, 10.0)), PointerTarget::Pan);
        assert!(editor.pointer_move(pos2(20.0, 30.0), false));
        editor.pointer_up();
        assert_eq!(editor.viewport().offset(), Vec2::new(10.0, 20.0));
        editor.reset_view();

        editor.layout(container());
        editor.start_crop();
        // Image spans (200,150)-(600,450); the default crop starts at image (40,30).
        assert_eq!(editor.pointer_down(pos2(400.0, 300.0)), PointerTarget::CropMove);
        assert!(editor.pointer_move(pos2(410.0, 300.0), false));
        editor.pointer_up();
        assert_eq!(editor.crop().working().unwrap().x, 50.0);

        // North-west handle now sits at (250,180).
        assert_eq!(editor.pointer_down(pos2(252.0, 182.0)), PointerTarget::CropHandle);
        editor.pointer_up();
        assert_eq!(editor.pointer_down(pos2(5.0, 5.0)), PointerTarget::Nothing);
    }

    #[test]
    fn stale_detection_is_dropped_and_failure_clears() {
        let (mut editor, _rx) = editor();
        editor.load_binary(png(100, 100), "a.png");
        let generation = editor.generation();
        editor.add_cover();

        assert!(editor.apply_detection(generation, Err(AppError::network("down"))));
        assert!(editor.covers().is_empty());

        let boxes = vec![CoverRect::new("ocr-0", CropRect::new(1.0, 1.0, 5.0, 5.0))];
        assert!(editor.apply_detection(generation, Ok(boxes.clone())));
        assert_eq!(editor.covers().active(), boxes.as_slice());

        editor.load_binary(png(50, 50), "b.png");
        assert!(!editor.apply_detection(generation, Ok(boxes)));
        assert!(editor.covers().is_empty());
    }

    #[test]
    fn paste_loads_pixels_and_survives_denial() {
        let (mut editor, _rx) = editor();
        let mut clipboard = MemoryClipboard {
            content: Some(ClipboardImage::Pixels(RgbaImage::new(30, 20))),
            ..Default::default()
        };
        assert!(editor.paste(&mut clipboard));
        assert_eq!(editor.store().filename(), Some(PASTED_IMAGE_NAME));
        assert_eq!(editor.store().size(), Some(ImageSize::new(30, 20)));

        clipboard.deny = true;
        assert!(!editor.paste(&mut clipboard));
        assert_eq!(editor.store().size(), Some(ImageSize::new(30, 20)));
    }

    #[test]
    fn cover_boxes_follow_the_applied_clip() {
        let (mut editor, _rx) = editor();
        editor.load_binary(png(400, 300), "a.png");
        editor.layout(container());
        editor.add_cover();
        assert_eq!(editor.cover_boxes().len(), 1);

        // The default crop starts at (40,30), past the cover at (20,10)-(70,60).
        editor.start_crop();
        assert_eq!(editor.cover_boxes().len(), 1);
        editor.finish_crop();
        let boxes = editor.cover_boxes();
        assert_eq!(boxes[0].overlay.width, 30.0);

        editor.toggle_covers();
        assert!(editor.cover_boxes().is_empty());
    }

    #[tokio::test]
    async fn copy_bakes_applied_crop() {
        let (mut editor, _rx) = editor();
        editor.load_binary(png(400, 300), "shot.png");
        editor.start_crop();
        editor.finish_crop();

        let job = editor.payload_job().unwrap();
        let mut clipboard = MemoryClipboard::default();
        copy_job(job, &mut clipboard).await.unwrap();
        assert_eq!(clipboard.written.unwrap().dimensions(), (320, 240));
    }

    #[tokio::test]
    async fn render_without_edits_returns_original() {
        let (mut editor, _rx) = editor();
        let bytes = png(10, 10);
        editor.load_binary(bytes.clone(), "raw.png");
        let blob = editor.payload_job().unwrap().render(Fallback::Original).await.unwrap();
        assert_eq!(&*blob.data, bytes.as_slice());
        assert_eq!(blob.name, "raw.png");
        assert_eq!(editor.export_name(), "cropped-raw.png");
    }

    #[tokio::test]
    async fn failed_crop_bake_respects_fallback() {
        let job = PayloadJob {
            generation: 1,
            source: BlobSource {
                source: crate::image_store::ImageSource::Memory(std::sync::Arc::from(&b"not an image"[..])),
                name: "x.png".to_string(),
            },
            crop: Some(CropRect::new(0.0, 0.0, 20.0, 20.0)),
            covers: Vec::new(),
            cover_color: [0, 0, 0, 255],
        };
        assert!(job.clone().render(Fallback::FailIfCropped).await.is_none());
        let fallback = job.render(Fallback::Original).await.unwrap();
        assert_eq!(fallback.name, "x.png");
    }

    #[tokio::test]
    async fn copy_falls_back_to_full_image_when_crop_fails() {
        let (mut editor, _rx) = editor();
        editor.load_binary(png(10, 10), "small.png");
        let mut job = editor.payload_job().unwrap();
        job.crop = Some(CropRect::new(50.0, 50.0, 20.0, 20.0));
        job.covers = vec![CoverRect::new("c", CropRect::new(0.0, 0.0, 4.0, 4.0))];

        let mut clipboard = MemoryClipboard::default();
        copy_job(job, &mut clipboard).await.unwrap();
        let written = clipboard.written.unwrap();
        assert_eq!(written.dimensions(), (10, 10));
        assert_eq!(*written.get_pixel(1, 1), Rgba([10, 10, 10, 255]));
        assert_eq!(*written.get_pixel(6, 6), Rgba([255, 255, 255, 255]));
    }
}
