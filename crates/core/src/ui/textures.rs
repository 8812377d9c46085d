//! GPU textures as display handles.

use crate::image_store::{DisplayHandle, DisplayHandles, HandleSource};
use eframe::egui;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Uploads each loaded image once and frees the texture on revoke.
///
/// Dropping an [`egui::TextureHandle`] releases the texture, so revoking is
/// just removing it from the map.
pub struct TextureHandles {
    ctx: egui::Context,
    next: u64,
    textures: HashMap<u64, egui::TextureHandle>,
}

impl TextureHandles {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            next: 0,
            textures: HashMap::new(),
        }
    }

    pub fn texture(&self, handle: DisplayHandle) -> Option<&egui::TextureHandle> {
        self.textures.get(&handle.0)
    }

    pub fn live_count(&self) -> usize {
        self.textures.len()
    }
}

impl DisplayHandles for TextureHandles {
    fn create(&mut self, source: HandleSource<'_>) -> Option<DisplayHandle> {
        let decoded = match source {
            HandleSource::Bytes(bytes) => image::load_from_memory(bytes),
            HandleSource::Path(path) => image::open(path),
        };
        let decoded = match decoded {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "could not decode image for display");
                return None;
            }
        };

        // Pre-convert to ColorImage for texture upload
        let buffer = decoded.to_rgba8();
        let size = [buffer.width() as usize, buffer.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, buffer.as_flat_samples().as_slice());

        self.next += 1;
        let id = self.next;
        let texture = self
            .ctx
            .load_texture(format!("image-{}", id), color_image, egui::TextureOptions::LINEAR);
        self.textures.insert(id, texture);
        debug!(id, "texture created");
        Some(DisplayHandle(id))
    }

    fn revoke(&mut self, handle: DisplayHandle) {
        if self.textures.remove(&handle.0).is_some() {
            debug!(id = handle.0, "texture released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::encode_png;
    use crate::image_store::ImageStore;
    use image::{Rgba, RgbaImage};

    #[test]
    fn store_keeps_one_texture_alive() {
        let mut store = ImageStore::new(TextureHandles::new(egui::Context::default()));
        let png = encode_png(&RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]))).unwrap();

        assert!(store.load_from_binary(png.clone(), "a.png"));
        assert!(store.load_from_binary(png, "b.png"));
        assert_eq!(store.handles().live_count(), 1);

        let handle = store.handle().unwrap();
        assert_eq!(store.handles().texture(handle).unwrap().size(), [4, 4]);

        store.clear();
        assert_eq!(store.handles().live_count(), 0);
    }
}
