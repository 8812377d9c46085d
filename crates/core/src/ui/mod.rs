//! Desktop editor surface.
//!
//! # Architecture
//!
//! The UI is split into focused submodules:
//! - [`state`]: side panel state and background task events
//! - [`textures`]: GPU textures behind the image store's display handles
//! - [`rendering`]: drawing utilities for overlays, handles and covers
//! - [`selection`]: pointer, wheel and keyboard handling
//! - [`canvas`]: main application logic
//!
//! # Usage
//!
//! ```ignore
//! use snapcrop_core::{ui, Config};
//!
//! let config = Config::load()?;
//! ui::run_editor(Some("receipt.png".into()), config)?;
//! ```

mod canvas;
mod rendering;
mod selection;
mod state;
mod textures;

// Public API exports
pub use canvas::EditorApp;
pub use state::OcrState;
pub use textures::TextureHandles;

use crate::config::Config;
use crate::error::Result;
use std::path::PathBuf;

/// Opens the editor window, optionally with an image, and returns when the
/// user closes it.
///
/// # Arguments
/// * `initial` - Image to open on start
/// * `config` - Application configuration
///
/// # Errors
///
/// Returns an error if the window cannot be created.
pub fn run_editor(initial: Option<PathBuf>, config: Config) -> Result<()> {
    canvas::run(initial, config)
}
