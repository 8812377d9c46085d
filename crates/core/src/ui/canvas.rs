//! Main editor window.
//!
//! This module contains the `EditorApp` struct which implements the
//! `eframe::App` trait: the zoomable canvas with its crop and cover
//! overlays, and the side panel with the image actions.

use super::rendering::{crop_uv, draw_covers, draw_crop_border, draw_dimmed_outside, draw_handles};
use super::selection::{PointerEvent, Shortcut, hover_cursor, process_pointer, shortcuts, wheel_delta};
use super::state::{OcrState, TaskEvent, describe_upload};
use super::textures::TextureHandles;
use crate::clipboard::{ClipboardBackend, SystemClipboard};
use crate::config::Config;
use crate::editor::{Editor, EditorAction, EditorEvent, Fallback, copy_job};
use crate::error::{AppError, Result};
use crate::export::write_export;
use crate::remote::RemoteClient;
use eframe::egui;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use tracing::{error, info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// The editor window.
pub struct EditorApp {
    editor: Editor<TextureHandles>,
    remote: Option<Arc<RemoteClient>>,
    cover_color: [u8; 4],

    // Channels
    editor_rx: Receiver<EditorEvent>,
    tx: Sender<TaskEvent>,
    rx: Receiver<TaskEvent>,

    // Side panel state
    ocr: OcrState,
    ocr_text: String,
    status: Option<String>,
    busy: usize,
}

impl EditorApp {
    /// Creates the window state and optionally opens `initial`.
    ///
    /// # Arguments
    /// * `ctx` - The egui context textures are uploaded to
    /// * `config` - Application configuration
    /// * `initial` - Image to open on start
    pub fn new(ctx: egui::Context, config: Config, initial: Option<PathBuf>) -> Self {
        let (editor_tx, editor_rx) = channel();
        let (tx, rx) = channel();

        let remote = match RemoteClient::new(&config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "backend client unavailable");
                None
            }
        };

        let editor = Editor::new(TextureHandles::new(ctx), &config).with_events(editor_tx);
        let mut app = Self {
            editor,
            remote,
            cover_color: config.cover_color,
            editor_rx,
            tx,
            rx,
            ocr: OcrState::Idle,
            ocr_text: String::new(),
            status: None,
            busy: 0,
        };

        if let Some(path) = initial {
            if !app.editor.dispatch(EditorAction::OpenFile(path.clone())) {
                app.status = Some(format!("Could not open {}", path.display()));
            }
        }
        app
    }

    /// Runs `job` on a background thread with its own runtime.
    ///
    /// Editor state is not shared with the job; it only sees the snapshot
    /// moved into the future and reports back with one [`TaskEvent`].
    fn spawn_job<F>(&mut self, ctx: &egui::Context, job: F)
    where
        F: Future<Output = TaskEvent> + Send + 'static,
    {
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.busy += 1;

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build();
            match runtime {
                Ok(rt) => {
                    let event = rt.block_on(job);
                    let _ = tx.send(event);
                }
                Err(e) => {
                    error!(error = %e, "failed to create async runtime");
                    let _ = tx.send(TaskEvent::Failed(format!("Failed to create async runtime: {}", e)));
                }
            }
            ctx.request_repaint();
        });
    }

    fn open_dialog(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_file();
        if let Some(path) = picked {
            if !self.editor.dispatch(EditorAction::OpenFile(path.clone())) {
                self.status = Some(format!("{} is not an image", path.display()));
            }
        }
    }

    fn paste(&mut self) {
        if !self.editor.paste(&mut SystemClipboard) {
            self.status = Some("Clipboard holds no image".to_string());
        }
    }

    fn copy(&mut self, ctx: &egui::Context) {
        let Some(job) = self.editor.payload_job() else {
            return;
        };
        self.spawn_job(ctx, async move {
            let result = copy_job(job, &mut SystemClipboard).await;
            TaskEvent::Copied(result.map_err(|e| e.to_string()))
        });
    }

    fn export(&mut self, ctx: &egui::Context) {
        let Some(job) = self.editor.payload_job() else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(self.editor.export_name())
            .add_filter("PNG", &["png"])
            .save_file()
        else {
            return;
        };

        self.spawn_job(ctx, async move {
            let result = match job.render(Fallback::Original).await {
                Some(blob) => write_export(&path, &blob.data).await.map(|_| path),
                None => Err(AppError::NoImage),
            };
            TaskEvent::Exported(result.map_err(|e| e.to_string()))
        });
    }

    fn extract_text(&mut self, ctx: &egui::Context) {
        let (Some(job), Some(remote)) = (self.editor.payload_job(), self.remote.clone()) else {
            return;
        };
        self.ocr = OcrState::Loading;
        let generation = job.generation;
        self.spawn_job(ctx, async move {
            let blob = job.render(Fallback::Original).await;
            let result = remote.extract_text(blob).await.map_err(|e| e.to_string());
            TaskEvent::Text { generation, result }
        });
    }

    fn detect_regions(&mut self, ctx: &egui::Context) {
        let (Some(job), Some(remote)) = (self.editor.payload_job(), self.remote.clone()) else {
            return;
        };
        let generation = job.generation;
        // Detection runs on the full image so box coordinates match it.
        let job = crate::editor::PayloadJob {
            crop: None,
            covers: Vec::new(),
            ..job
        };
        self.spawn_job(ctx, async move {
            let blob = job.render(Fallback::Original).await;
            let result = remote.detect_text_regions(blob).await;
            TaskEvent::Regions { generation, result }
        });
    }

    fn upload(&mut self, ctx: &egui::Context) {
        let (Some(job), Some(remote)) = (self.editor.payload_job(), self.remote.clone()) else {
            return;
        };
        self.spawn_job(ctx, async move {
            let blob = job.render(Fallback::Original).await;
            TaskEvent::Uploaded(remote.upload(blob).await)
        });
    }

    /// Processes results from background jobs.
    fn process_task_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.busy = self.busy.saturating_sub(1);
            match event {
                TaskEvent::Copied(Ok(())) => self.status = Some("Copied to clipboard".to_string()),
                TaskEvent::Copied(Err(e)) => self.status = Some(format!("Copy failed: {}", e)),
                TaskEvent::Exported(Ok(path)) => self.status = Some(format!("Saved {}", path.display())),
                TaskEvent::Exported(Err(e)) => self.status = Some(format!("Save failed: {}", e)),
                TaskEvent::Text { generation, result } => {
                    if !self.editor.is_current(generation) {
                        continue;
                    }
                    match result {
                        Ok(text) => {
                            self.ocr_text = text.clone();
                            self.ocr = OcrState::Text(text);
                        }
                        Err(e) => self.ocr = OcrState::Error(e),
                    }
                }
                TaskEvent::Regions { generation, result } => {
                    if let Err(e) = &result {
                        self.status = Some(format!("Region detection failed: {}", e));
                    }
                    self.editor.apply_detection(generation, result);
                }
                TaskEvent::Uploaded(outcome) => self.status = Some(describe_upload(&outcome)),
                TaskEvent::Failed(e) => self.status = Some(e),
            }
        }
    }

    /// Mirrors editor notifications into the side panel.
    fn process_editor_events(&mut self) {
        while let Ok(event) = self.editor_rx.try_recv() {
            match event {
                EditorEvent::ImageChanged { name, .. } => {
                    self.ocr = OcrState::Idle;
                    self.ocr_text.clear();
                    self.status = name.map(|name| format!("Opened {}", name));
                }
                EditorEvent::CropApplied(rect) => {
                    info!(?rect, "crop applied");
                }
                EditorEvent::CropModeChanged { .. } | EditorEvent::CoversChanged { .. } => {}
            }
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        for file in dropped {
            let loaded = match (&file.path, &file.bytes) {
                (Some(path), _) => self.editor.open_file(path),
                (None, Some(bytes)) => self.editor.load_binary(bytes.clone(), file.name.clone()),
                _ => false,
            };
            if loaded {
                break;
            }
        }
    }

    /// Renders the side panel with actions and the OCR card.
    fn render_side_panel(&mut self, ui: &mut egui::Ui) {
        let has_image = self.editor.store().has_image();
        let cropping = self.editor.crop().is_active();
        let online = self.remote.is_some();
        let ctx = ui.ctx().clone();

        ui.heading("Snapcrop");
        ui.add_space(8.0);

        if ui.button("Open file").clicked() {
            self.open_dialog();
        }
        if ui.button("Paste").clicked() {
            self.paste();
        }

        ui.add_enabled_ui(has_image, |ui| {
            let crop_label = if cropping { "Apply crop" } else { "Crop" };
            if ui.button(crop_label).clicked() {
                self.editor.dispatch(EditorAction::ToggleCrop);
            }
            if self.editor.crop().applied().is_some() && !cropping && ui.button("Remove crop").clicked() {
                self.editor.remove_crop();
            }

            ui.separator();
            if ui.button("Add cover").clicked() {
                self.editor.dispatch(EditorAction::AddCover);
            }
            let covers_label = if self.editor.covers().is_enabled() { "Hide covers" } else { "Show covers" };
            if ui.button(covers_label).clicked() {
                self.editor.dispatch(EditorAction::ToggleCovers);
            }
            if ui.add_enabled(online, egui::Button::new("Detect text")).clicked() {
                self.detect_regions(&ctx);
            }

            ui.separator();
            if ui.button("Copy").clicked() {
                self.copy(&ctx);
            }
            if ui.button("Save as...").clicked() {
                self.export(&ctx);
            }
            if ui.add_enabled(online, egui::Button::new("Upload")).clicked() {
                self.upload(&ctx);
            }
            if ui.button("Reset view").clicked() {
                self.editor.reset_view();
            }
            if ui.button("Close image").clicked() {
                self.editor.dispatch(EditorAction::ClearImage);
            }
        });

        ui.separator();
        self.render_ocr_card(ui, has_image && online);

        if self.busy > 0 {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Working...");
            });
        }
        if let Some(status) = &self.status {
            ui.label(egui::RichText::new(status).small().color(egui::Color32::LIGHT_GRAY));
        }
    }

    fn render_ocr_card(&mut self, ui: &mut egui::Ui, enabled: bool) {
        let ctx = ui.ctx().clone();
        ui.horizontal(|ui| {
            ui.label("Text");
            if ui
                .add_enabled(enabled && self.ocr != OcrState::Loading, egui::Button::new("Extract"))
                .clicked()
            {
                self.extract_text(&ctx);
            }
        });

        if let Some(message) = self.ocr.status_message() {
            ui.label(egui::RichText::new(message).small());
        }

        egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
            ui.add(
                egui::TextEdit::multiline(&mut self.ocr_text)
                    .desired_rows(6)
                    .desired_width(f32::INFINITY),
            );
        });

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!self.ocr_text.is_empty(), egui::Button::new("Copy text"))
                .clicked()
            {
                if let Err(e) = SystemClipboard.write_text(&self.ocr_text) {
                    self.status = Some(e.to_string());
                }
            }
        });

        if let OcrState::Error(err) = &self.ocr {
            ui.label(egui::RichText::new(format!("Error: {}", err)).color(egui::Color32::RED));
        }
    }

    /// Renders the image with its overlays and routes canvas input.
    fn render_canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let rect = ui.max_rect();
        let response = ui.interact(rect, ui.id().with("canvas"), egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        if !self.editor.store().has_image() {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Open, paste or drop an image",
                egui::FontId::proportional(18.0),
                egui::Color32::GRAY,
            );
            return;
        }

        if let Some(delta) = wheel_delta(&response) {
            self.editor.zoom(delta);
        }
        if process_pointer(&response, &mut self.editor) != PointerEvent::None {
            ctx.request_repaint();
        }
        if response.secondary_clicked() {
            self.copy(ctx);
        }

        let Some(metrics) = self.editor.layout(rect) else {
            return;
        };
        let image_rect = metrics.image_rect();
        let crop = self.editor.crop();

        if let Some(texture) = self
            .editor
            .store()
            .handle()
            .and_then(|handle| self.editor.store().handles().texture(handle))
        {
            let full_uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            match (crop.applied_clip_box(), crop.applied()) {
                // Preview of the applied crop: only the kept region is drawn.
                (Some(clip), Some(applied)) => {
                    let uv = crop_uv(applied.x, applied.y, applied.width, applied.height, metrics.natural_size());
                    painter.image(texture.id(), clip.rect(), uv, egui::Color32::WHITE);
                }
                _ => {
                    painter.image(texture.id(), image_rect, full_uv, egui::Color32::WHITE);
                }
            }
        }

        draw_covers(&painter, &self.editor.cover_boxes(), self.cover_color);

        if let (Some(overlay), Some(handles)) = (crop.overlay_box(), crop.handle_positions()) {
            draw_dimmed_outside(&painter, image_rect, overlay.rect(), 150);
            draw_crop_border(&painter, overlay.rect(), 2.0, egui::Color32::WHITE);
            draw_handles(&painter, &handles);
        }

        if let Some(pointer) = response.hover_pos() {
            if let Some(icon) = hover_cursor(crop, pointer, self.editor.viewport().is_panning()) {
                ctx.set_cursor_icon(icon);
            }
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Enforce dark mode
        ctx.set_visuals(egui::Visuals::dark());

        self.process_task_events();
        self.process_editor_events();
        self.handle_dropped_files(ctx);

        for shortcut in shortcuts(ctx, self.editor.crop().is_active()) {
            match shortcut {
                Shortcut::CommitCrop => {
                    self.editor.dispatch(EditorAction::FinishCrop);
                }
                Shortcut::CancelCrop => {
                    self.editor.dispatch(EditorAction::CancelCrop);
                }
                Shortcut::Copy if self.editor.store().has_image() => self.copy(ctx),
                Shortcut::Copy => {}
                Shortcut::Paste => self.paste(),
            }
        }

        egui::SidePanel::right("actions")
            .resizable(false)
            .default_width(260.0)
            .show(ctx, |ui| self.render_side_panel(ui));

        let panel_frame = egui::Frame::default()
            .inner_margin(egui::Margin::same(0))
            .fill(egui::Color32::from_gray(24));

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| self.render_canvas(ui, ctx));
    }
}

/// Opens the editor window and blocks until it is closed.
///
/// # Arguments
/// * `initial` - Image to open on start
/// * `config` - Application configuration
///
/// # Errors
///
/// Returns an error if the window cannot be created.
pub fn run(initial: Option<PathBuf>, config: Config) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Snapcrop",
        options,
        Box::new(move |cc| {
            Ok(Box::new(EditorApp::new(cc.egui_ctx.clone(), config, initial)) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}
