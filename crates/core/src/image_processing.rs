//! Raster utilities behind redacted export.
//!
//! This module decodes the loaded image, cuts it to the applied crop, paints
//! cover rectangles as opaque fills and re-encodes the result as PNG.
//!
//! # Coordinate Mapping
//!
//! Crop and cover rectangles live in image-pixel space as floats. The crop
//! origin is rounded to the nearest pixel and its size rounded with a floor
//! of one pixel, then clipped to the image. Covers are intersected with that
//! region and shifted by its origin before their edges are rounded.

use crate::compositor::CoverRect;
use crate::error::{AppError, Result};
use crate::geometry::CropRect;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Integer pixel region inside a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    pub fn as_crop_rect(&self) -> CropRect {
        CropRect::new(self.x as f32, self.y as f32, self.width as f32, self.height as f32)
    }
}

/// Image processing utilities for the export workflow.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Decodes any supported format from memory.
    pub fn decode(data: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(data).map_err(|e| AppError::codec(format!("Failed to decode image: {}", e)))
    }

    /// Pixel region for `crop` inside an image of the given size; the whole
    /// image when there is no crop.
    pub fn crop_region(width: u32, height: u32, crop: Option<&CropRect>) -> Result<PixelRegion> {
        let Some(crop) = crop else {
            return Ok(PixelRegion {
                x: 0,
                y: 0,
                width,
                height,
            });
        };

        let x = (crop.x.round().max(0.0) as u32).min(width);
        let y = (crop.y.round().max(0.0) as u32).min(height);
        let region_width = (crop.width.round().max(1.0) as u32).min(width - x);
        let region_height = (crop.height.round().max(1.0) as u32).min(height - y);

        // Validate selection has non-zero area
        if region_width == 0 || region_height == 0 {
            return Err(AppError::image(format!("Crop {:?} lies outside the {}x{} image", crop, width, height)));
        }

        Ok(PixelRegion {
            x,
            y,
            width: region_width,
            height: region_height,
        })
    }

    /// Crops `data` and paints `covers` over it, returning a PNG.
    ///
    /// Covers are written as exact pixel values with full alpha, never
    /// blended. Covers without a colour use `default_color`.
    pub fn bake(data: &[u8], crop: Option<&CropRect>, covers: &[CoverRect], default_color: [u8; 4]) -> Result<Vec<u8>> {
        let decoded = Self::decode(data)?;
        let region = Self::crop_region(decoded.width(), decoded.height(), crop)?;

        // Crop the image (immutable operation, returns new image)
        let mut canvas = decoded
            .crop_imm(region.x, region.y, region.width, region.height)
            .to_rgba8();

        let bounds = region.as_crop_rect();
        for cover in covers {
            let Some(clipped) = cover.rect().intersect(&bounds) else {
                continue;
            };
            let [r, g, b, _] = cover.color.unwrap_or(default_color);
            Self::fill_rect(
                &mut canvas,
                clipped.x - bounds.x,
                clipped.y - bounds.y,
                clipped.width,
                clipped.height,
                Rgba([r, g, b, 255]),
            );
        }

        encode_png(&canvas)
    }

    /// Overwrites the pixels of a float rectangle, edges rounded to the grid.
    pub fn fill_rect(canvas: &mut RgbaImage, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>) {
        let (cw, ch) = canvas.dimensions();
        let x0 = (x.round().max(0.0) as u32).min(cw);
        let y0 = (y.round().max(0.0) as u32).min(ch);
        let x1 = ((x + width).round().max(0.0) as u32).min(cw);
        let y1 = ((y + height).round().max(0.0) as u32).min(ch);

        for py in y0..y1 {
            for px in x0..x1 {
                canvas.put_pixel(px, py, color);
            }
        }
    }

    /// Decodes to straight RGBA, the layout the platform clipboard expects.
    pub fn to_rgba(data: &[u8]) -> Result<RgbaImage> {
        Ok(Self::decode(data)?.to_rgba8())
    }
}

/// Encodes RGBA pixels as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| AppError::codec(format!("Failed to encode image: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACKISH: [u8; 4] = [10, 10, 10, 255];

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(width, height, WHITE)).unwrap()
    }

    fn cover(x: f32, y: f32, width: f32, height: f32, color: Option<[u8; 4]>) -> CoverRect {
        CoverRect {
            id: "c".to_string(),
            x,
            y,
            width,
            height,
            color,
        }
    }

    #[test]
    fn crop_region_rounds_and_clips() {
        let crop = CropRect::new(10.4, 9.6, 50.5, 200.0);
        let region = ImageProcessor::crop_region(100, 100, Some(&crop)).unwrap();
        assert_eq!(
            region,
            PixelRegion {
                x: 10,
                y: 10,
                width: 51,
                height: 90
            }
        );
    }

    #[test]
    fn crop_region_without_crop_is_full_image() {
        let region = ImageProcessor::crop_region(30, 20, None).unwrap();
        assert_eq!((region.width, region.height), (30, 20));
    }

    #[test]
    fn crop_region_outside_image_fails() {
        let crop = CropRect::new(200.0, 0.0, 20.0, 20.0);
        assert!(ImageProcessor::crop_region(100, 100, Some(&crop)).is_err());
    }

    #[test]
    fn covers_are_opaque_and_exact() {
        let data = white_png(20, 20);
        let covers = [cover(5.0, 5.0, 4.0, 4.0, Some([200, 0, 0, 100]))];
        let out = ImageProcessor::bake(&data, None, &covers, BLACKISH).unwrap();
        let img = ImageProcessor::to_rgba(&out).unwrap();

        assert_eq!(img.dimensions(), (20, 20));
        assert_eq!(*img.get_pixel(5, 5), Rgba([200, 0, 0, 255]));
        assert_eq!(*img.get_pixel(8, 8), Rgba([200, 0, 0, 255]));
        assert_eq!(*img.get_pixel(4, 4), WHITE);
        assert_eq!(*img.get_pixel(9, 9), WHITE);
    }

    #[test]
    fn covers_shift_with_crop_and_use_default_color() {
        let data = white_png(40, 40);
        let crop = CropRect::new(10.0, 10.0, 20.0, 20.0);
        let covers = [
            cover(5.0, 5.0, 10.0, 10.0, None),
            cover(35.0, 35.0, 5.0, 5.0, Some([0, 255, 0, 255])),
        ];
        let out = ImageProcessor::bake(&data, Some(&crop), &covers, BLACKISH).unwrap();
        let img = ImageProcessor::to_rgba(&out).unwrap();

        assert_eq!(img.dimensions(), (20, 20));
        // Partially overlapping cover is clipped to the crop's top-left 5x5.
        assert_eq!(*img.get_pixel(0, 0), Rgba(BLACKISH));
        assert_eq!(*img.get_pixel(4, 4), Rgba(BLACKISH));
        assert_eq!(*img.get_pixel(5, 5), WHITE);
        // The cover outside the crop leaves no trace.
        assert!(img.pixels().all(|p| *p != Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn undecodable_input_is_a_codec_error() {
        let result = ImageProcessor::bake(b"nope", None, &[], BLACKISH);
        assert!(matches!(result, Err(AppError::Codec(_))));
    }
}
