//! Platform clipboard access.
//!
//! Editor code talks to [`ClipboardBackend`] so that paste and copy can be
//! exercised without a desktop session.

use crate::error::{AppError, Result};
use image::RgbaImage;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image content found on the clipboard.
#[derive(Debug, Clone)]
pub enum ClipboardImage {
    /// Raw pixels (screenshots, images copied from other editors).
    Pixels(RgbaImage),
    /// Text naming an image file on disk (files copied in a file manager).
    File(PathBuf),
}

pub trait ClipboardBackend {
    /// Scans the clipboard for an image, pixels first, then a file path.
    /// `Ok(None)` means the clipboard holds nothing usable.
    fn read_image(&mut self) -> Result<Option<ClipboardImage>>;

    fn write_image(&mut self, image: &RgbaImage) -> Result<()>;

    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// The OS clipboard through `arboard`.
///
/// A fresh handle is opened per call; some platforms drop ownership of
/// the selection when the handle is dropped, which is fine for pastes
/// and copies driven by a long-running window.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn open() -> Result<arboard::Clipboard> {
        arboard::Clipboard::new().map_err(|e| AppError::clipboard(e.to_string()))
    }
}

impl ClipboardBackend for SystemClipboard {
    fn read_image(&mut self) -> Result<Option<ClipboardImage>> {
        let mut clipboard = Self::open()?;

        if let Ok(data) = clipboard.get_image() {
            if let Some(pixels) = RgbaImage::from_raw(data.width as u32, data.height as u32, data.bytes.into_owned()) {
                return Ok(Some(ClipboardImage::Pixels(pixels)));
            }
            debug!("clipboard image had an unexpected buffer length");
        }

        if let Ok(text) = clipboard.get_text() {
            return Ok(image_path_from_text(&text).map(ClipboardImage::File));
        }

        Ok(None)
    }

    fn write_image(&mut self, image: &RgbaImage) -> Result<()> {
        let data = arboard::ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: Cow::Borrowed(image.as_raw()),
        };
        Self::open()?
            .set_image(data)
            .map_err(|e| AppError::clipboard(e.to_string()))
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        Self::open()?
            .set_text(text.to_string())
            .map_err(|e| AppError::clipboard(e.to_string()))
    }
}

/// Interprets clipboard text as a path to an existing image file.
///
/// Accepts `file://` URIs as produced by most file managers.
pub fn image_path_from_text(text: &str) -> Option<PathBuf> {
    let line = text.lines().map(str::trim).find(|line| !line.is_empty())?;
    let path = match url::Url::parse(line) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok()?,
        _ => PathBuf::from(line),
    };
    (path.is_file() && looks_like_image(&path)).then_some(path)
}

fn looks_like_image(path: &Path) -> bool {
    image::ImageFormat::from_path(path).is_ok()
}

/// In-memory clipboard for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryClipboard {
    pub content: Option<ClipboardImage>,
    pub written: Option<RgbaImage>,
    pub text: Option<String>,
    pub deny: bool,
}

#[cfg(test)]
impl ClipboardBackend for MemoryClipboard {
    fn read_image(&mut self) -> Result<Option<ClipboardImage>> {
        if self.deny {
            return Err(AppError::clipboard("denied"));
        }
        Ok(self.content.clone())
    }

    fn write_image(&mut self, image: &RgbaImage) -> Result<()> {
        if self.deny {
            return Err(AppError::clipboard("denied"));
        }
        self.written = Some(image.clone());
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        if self.deny {
            return Err(AppError::clipboard("denied"));
        }
        self.text = Some(text.to_string());
        Ok(())
    }
}
