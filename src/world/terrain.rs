//! Terrain (biome map) image received at login

use std::io::Read;

use flate2::read::GzDecoder;
use tracing::warn;

use crate::net::codec::DecodeError;
use crate::net::constants::MAX_TERRAIN_PIXELS;

pub const BYTES_PER_PIXEL: usize = 3;

/// Row-major RGB pixel buffer, 3 bytes per pixel, no row padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerrainImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TerrainImage {
    /// Decompress a gzip blob into an image of the declared size.
    ///
    /// The buffer is always exactly `width * height * 3` bytes; a short
    /// decompressed stream leaves the missing pixels black.
    pub fn from_gzip(width: i32, height: i32, compressed: &[u8]) -> Result<Self, DecodeError> {
        let len = pixel_buffer_len(width, height)?;

        let mut raw = Vec::new();
        GzDecoder::new(compressed).read_to_end(&mut raw)?;

        if raw.len() != len {
            warn!(
                expected = len,
                received = raw.len(),
                "Terrain image size mismatch, clamping to declared dimensions"
            );
        }

        Ok(Self::from_rgb(width as u32, height as u32, &raw))
    }

    /// Build from raw RGB bytes, copying at most `width * height * 3`
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Self {
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        let mut pixels = vec![0u8; len];
        let available = rgb.len().min(len);
        pixels[..available].copy_from_slice(&rgb[..available]);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB at (x, y), `None` outside the image
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }

    /// Packed 0xRRGGBB at (x, y)
    pub fn rgb(&self, x: u32, y: u32) -> Option<u32> {
        self.pixel(x, y)
            .map(|[r, g, b]| (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }
}

fn pixel_buffer_len(width: i32, height: i32) -> Result<usize, DecodeError> {
    let invalid = || DecodeError::InvalidDimensions { width, height };
    let w = usize::try_from(width).map_err(|_| invalid())?;
    let h = usize::try_from(height).map_err(|_| invalid())?;
    let pixels = w.checked_mul(h).ok_or_else(invalid)?;
    if pixels > MAX_TERRAIN_PIXELS {
        return Err(invalid());
    }
    Ok(pixels * BYTES_PER_PIXEL)
}

/// Gzip-compress raw RGB bytes (the server side of [`TerrainImage::from_gzip`])
pub fn compress_rgb(rgb: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb)?;
    encoder.finish()
}
