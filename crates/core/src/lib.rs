//! Snapcrop Core Library
//!
//! This library provides the core of the Snapcrop image editor: a zoomable
//! canvas with interactive cropping, redaction covers, and a client for a
//! text-recognition backend.
//!
//! # Overview
//!
//! - **Viewport**: zoom and pan state via [`viewport`]
//! - **Geometry**: screen/image coordinate mapping and crop math via [`geometry`]
//! - **Crop session**: the interactive crop state machine via [`crop`]
//! - **Image store**: the loaded image and its display handle via [`image_store`]
//! - **Compositor**: cover rendering and baking via [`compositor`]
//! - **Backend**: multipart requests for OCR and upload via [`remote`]
//! - **User Interface**: the desktop editor via [`ui`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`Snapcrop`] facade:
//!
//! ```ignore
//! use snapcrop_core::Snapcrop;
//!
//! let app = Snapcrop::new()?;
//! app.run_interactive(None)?;
//! ```
//!
//! # Module Structure
//!
//! - [`clipboard`]: Platform clipboard access
//! - [`compositor`]: Cover sets, render boxes and the bake path
//! - [`config`]: Configuration loading and management
//! - [`crop`]: Crop session state machine
//! - [`editor`]: Editor state, actions and events
//! - [`error`]: Error types and result aliases
//! - [`export`]: Save-as naming and writing
//! - [`geometry`]: Pure crop geometry
//! - [`image_processing`]: Raster crop, cover fill and PNG encoding
//! - [`image_store`]: Image ownership and display handles
//! - [`remote`]: Text-recognition backend client
//! - [`ui`]: User interface components
//! - [`viewport`]: Zoom and pan

pub mod clipboard;
pub mod compositor;
pub mod config;
pub mod crop;
pub mod editor;
pub mod error;
pub mod export;
pub mod geometry;
pub mod image_processing;
pub mod image_store;
pub mod remote;
pub mod ui;
pub mod viewport;

// Re-export primary types for convenience
pub use compositor::{CoverRect, CoverSet};
pub use config::Config;
pub use editor::{Editor, EditorAction, EditorEvent};
pub use error::{AppError, Result};
pub use geometry::{CropRect, ImageSize};
pub use image_store::ImageBlob;
pub use remote::{RemoteClient, SendOutcome};

use editor::{Fallback, PayloadJob};
use image_store::HandleCounter;
use std::path::{Path, PathBuf};
use tracing::info;

/// Main entry point for the Snapcrop application.
///
/// This struct provides a facade over the various subsystems: it opens the
/// desktop editor and runs the same crop/cover/backend pipeline headless
/// for the command line.
///
/// # Example
///
/// ```ignore
/// use snapcrop_core::Snapcrop;
///
/// let app = Snapcrop::new()?;
/// let text = app.extract_text("receipt.png".as_ref(), None).await?;
/// ```
pub struct Snapcrop {
    config: Config,
    remote: RemoteClient,
}

impl Snapcrop {
    /// Creates an instance from the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::load()?)
    }

    /// Creates an instance with custom configuration.
    ///
    /// # Arguments
    /// * `config` - Pre-built configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let remote = RemoteClient::new(&config)?;
        Ok(Self { config, remote })
    }

    /// Launches the desktop editor, optionally with an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be created.
    pub fn run_interactive(&self, initial: Option<PathBuf>) -> Result<()> {
        ui::run_editor(initial, self.config.clone())
    }

    /// Opens `path` and captures what the pipeline needs from it.
    ///
    /// # Arguments
    /// * `path` - Image file
    /// * `crop` - Crop in image pixels; must lie inside the image
    /// * `covers` - Covers in image pixels
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidInput`] if the file is not an image or the
    /// crop does not fit it.
    pub fn prepare(&self, path: &Path, crop: Option<CropRect>, covers: Vec<CoverRect>) -> Result<PayloadJob> {
        let mut editor = Editor::new(HandleCounter::default(), &self.config);
        if !editor.open_file(path) {
            return Err(AppError::InvalidInput(format!("{} is not a readable image", path.display())));
        }
        let size = editor.store().size().ok_or(AppError::NoImage)?;

        if let Some(rect) = &crop {
            if !rect.fits(size.as_vec2()) {
                return Err(AppError::InvalidInput(format!(
                    "crop {}x{}+{}+{} does not fit the {}x{} image",
                    rect.width, rect.height, rect.x, rect.y, size.width, size.height
                )));
            }
        }

        let job = editor.payload_job().ok_or(AppError::NoImage)?;
        Ok(PayloadJob { crop, covers, ..job })
    }

    /// Crops and redacts `path`, returning the resulting PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be read or baked.
    pub async fn redact(&self, path: &Path, crop: Option<CropRect>, covers: Vec<CoverRect>) -> Result<ImageBlob> {
        let job = self.prepare(path, crop, covers)?;
        let blob = job
            .render(Fallback::FailIfCropped)
            .await
            .ok_or_else(|| AppError::codec("Image could not be baked"))?;
        info!(name = %blob.name, bytes = blob.data.len(), "image redacted");
        Ok(blob)
    }

    /// Asks the backend for text regions of the whole image.
    pub async fn detect_regions(&self, path: &Path) -> Result<Vec<CoverRect>> {
        let blob = self.prepare(path, None, Vec::new())?.render(Fallback::Original).await;
        self.remote.detect_text_regions(blob).await
    }

    /// Recognises the text in `path`, cropped first if requested.
    pub async fn extract_text(&self, path: &Path, crop: Option<CropRect>) -> Result<String> {
        let blob = self.redact(path, crop, Vec::new()).await?;
        self.remote.extract_text(Some(blob)).await
    }

    /// Posts `path`, cropped first if requested, to the upload endpoint.
    pub async fn upload(&self, path: &Path, crop: Option<CropRect>) -> Result<SendOutcome> {
        let blob = self.redact(path, crop, Vec::new()).await?;
        Ok(self.remote.upload(Some(blob)).await)
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present.
pub fn init() {
    let _ = dotenvy::dotenv();
}
