//! Decoded source images.

use crate::error::{ResourceError, ResourceResult};

use super::TextureFormat;

/// An immutable decoded image, the source asset for cached textures.
///
/// Images are shared as `Arc<Image>`; the texture caches key on the `Arc`
/// allocation, so two equal images are still distinct cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: Vec<u8>,
}

impl Image {
    /// Create an image, validating the pixel data length.
    pub fn new(
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Vec<u8>,
    ) -> ResourceResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel() as usize;
        if pixels.len() != expected {
            return Err(ResourceError::InvalidParameter(format!(
                "image data is {} bytes, expected {expected} for {width}x{height} {format:?}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Create an image filled with a single pixel value.
    pub fn filled(width: u32, height: u32, format: TextureFormat, pixel: &[u8]) -> ResourceResult<Self> {
        if pixel.len() != format.bytes_per_pixel() as usize {
            return Err(ResourceError::InvalidParameter(format!(
                "pixel is {} bytes, {format:?} needs {}",
                pixel.len(),
                format.bytes_per_pixel()
            )));
        }
        let pixels = pixel.repeat(width as usize * height as usize);
        Self::new(width, height, format, pixels)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Raw pixel data, tightly packed rows.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
