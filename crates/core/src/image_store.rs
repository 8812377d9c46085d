//! Ownership of the loaded image and its display handle.
//!
//! The store holds at most one image. Each image is paired with a revocable
//! [`DisplayHandle`] (a GPU texture in the desktop surface) created through
//! the injected [`DisplayHandles`] implementation. Replacing or clearing the
//! image always revokes the previous handle, so a long session never
//! accumulates handles.

use crate::error::{AppError, Result};
use crate::geometry::ImageSize;
use image::{ImageFormat, ImageReader};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Opaque reference to a rendered copy of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayHandle(pub u64);

/// Where a display handle reads its pixels from.
#[derive(Debug, Clone, Copy)]
pub enum HandleSource<'a> {
    Bytes(&'a [u8]),
    Path(&'a Path),
}

/// Creates and revokes display handles.
pub trait DisplayHandles {
    fn create(&mut self, source: HandleSource<'_>) -> Option<DisplayHandle>;
    fn revoke(&mut self, handle: DisplayHandle);
}

/// Headless handle bookkeeping: hands out ids and tracks which are live.
#[derive(Debug, Default)]
pub struct HandleCounter {
    next: u64,
    live: HashSet<u64>,
}

impl HandleCounter {
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl DisplayHandles for HandleCounter {
    fn create(&mut self, _source: HandleSource<'_>) -> Option<DisplayHandle> {
        self.next += 1;
        self.live.insert(self.next);
        Some(DisplayHandle(self.next))
    }

    fn revoke(&mut self, handle: DisplayHandle) {
        self.live.remove(&handle.0);
    }
}

/// Encoded image bytes plus the name used for uploads and exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub data: Arc<[u8]>,
    pub name: String,
}

impl ImageBlob {
    pub fn new(data: impl Into<Arc<[u8]>>, name: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            name: name.into(),
        }
    }
}

/// Backing storage of the current image.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Bytes held in memory (paste, crop result).
    Memory(Arc<[u8]>),
    /// Opened by path; bytes are read back lazily.
    File(PathBuf),
}

/// Everything needed to produce the current blob without borrowing the store.
#[derive(Debug, Clone)]
pub struct BlobSource {
    pub source: ImageSource,
    pub name: String,
}

impl BlobSource {
    /// Returns the encoded bytes, reading the file back if necessary.
    pub async fn resolve(self) -> Result<ImageBlob> {
        match self.source {
            ImageSource::Memory(data) => Ok(ImageBlob { data, name: self.name }),
            ImageSource::File(path) => {
                let data = tokio::fs::read(&path).await?;
                Ok(ImageBlob::new(data, self.name))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub source: ImageSource,
    pub handle: DisplayHandle,
    pub filename: String,
    pub size: ImageSize,
}

pub struct ImageStore<H: DisplayHandles> {
    handles: H,
    current: Option<ImageRecord>,
    generation: u64,
}

impl<H: DisplayHandles> ImageStore<H> {
    pub fn new(handles: H) -> Self {
        Self {
            handles,
            current: None,
            generation: 0,
        }
    }

    /// Opens an image file. Files whose type is not an image are ignored.
    pub fn load_from_file(&mut self, path: &Path) -> bool {
        let is_image = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type().starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            debug!(path = %path.display(), "ignoring non-image file");
            return false;
        }

        let size = match image::image_dimensions(path) {
            Ok((width, height)) => ImageSize::new(width, height),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable image file");
                return false;
            }
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let Some(handle) = self.handles.create(HandleSource::Path(path)) else {
            return false;
        };
        self.replace(ImageRecord {
            source: ImageSource::File(path.to_path_buf()),
            handle,
            filename,
            size,
        });
        true
    }

    /// Replaces the current image with encoded bytes. Bytes that are not a
    /// decodable image are ignored.
    pub fn load_from_binary(&mut self, data: impl Into<Arc<[u8]>>, name: impl Into<String>) -> bool {
        let data: Arc<[u8]> = data.into();
        let size = match sniff_dimensions(&data) {
            Ok(size) => size,
            Err(e) => {
                debug!(error = %e, "ignoring non-image payload");
                return false;
            }
        };

        let Some(handle) = self.handles.create(HandleSource::Bytes(&data)) else {
            return false;
        };
        self.replace(ImageRecord {
            source: ImageSource::Memory(data),
            handle,
            filename: name.into(),
            size,
        });
        true
    }

    fn replace(&mut self, record: ImageRecord) {
        if let Some(previous) = self.current.take() {
            self.handles.revoke(previous.handle);
        }
        info!(name = %record.filename, width = record.size.width, height = record.size.height, "image loaded");
        self.current = Some(record);
        self.generation += 1;
    }

    /// Releases the display handle and forgets the image.
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            self.handles.revoke(previous.handle);
            self.generation += 1;
        }
    }

    pub fn current(&self) -> Option<&ImageRecord> {
        self.current.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.current.is_some()
    }

    pub fn size(&self) -> Option<ImageSize> {
        self.current.as_ref().map(|record| record.size)
    }

    pub fn filename(&self) -> Option<&str> {
        self.current.as_ref().map(|record| record.filename.as_str())
    }

    pub fn handle(&self) -> Option<DisplayHandle> {
        self.current.as_ref().map(|record| record.handle)
    }

    /// Bumped on every load and clear; background jobs compare against it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handles(&self) -> &H {
        &self.handles
    }

    pub fn handles_mut(&mut self) -> &mut H {
        &mut self.handles
    }

    /// The blob, if its bytes are already in memory.
    pub fn try_image_blob(&self) -> Option<ImageBlob> {
        let record = self.current.as_ref()?;
        match &record.source {
            ImageSource::Memory(data) => Some(ImageBlob {
                data: data.clone(),
                name: record.filename.clone(),
            }),
            ImageSource::File(_) => None,
        }
    }

    pub fn blob_source(&self) -> Option<BlobSource> {
        self.current.as_ref().map(|record| BlobSource {
            source: record.source.clone(),
            name: record.filename.clone(),
        })
    }

    /// The current blob, reading it back from disk when not cached.
    pub async fn get_image_blob(&self) -> Result<ImageBlob> {
        if let Some(blob) = self.try_image_blob() {
            return Ok(blob);
        }
        self.blob_source().ok_or(AppError::NoImage)?.resolve().await
    }
}

impl<H: DisplayHandles> Drop for ImageStore<H> {
    fn drop(&mut self) {
        if let Some(previous) = self.current.take() {
            self.handles.revoke(previous.handle);
        }
    }
}

/// Reads only the header to find the intrinsic size.
fn sniff_dimensions(data: &[u8]) -> Result<ImageSize> {
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()?;
    if width == 0 || height == 0 {
        return Err(AppError::InvalidInput("image has no pixels".to_string()));
    }
    Ok(ImageSize::new(width, height))
}
