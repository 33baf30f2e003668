//! Decoded RGBA pixel buffers.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// Bytes per pixel (R, G, B, A).
pub const CHANNELS: usize = 4;

/// A row-major RGBA8 pixel grid with stride `width * 4`.
///
/// Constructors reject zero dimensions and mismatched byte lengths, so every
/// buffer that exists is non-empty and well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer filled with transparent black.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = byte_len(width, height);
        Self::from_raw(width, height, vec![0; len])
    }

    /// Create a buffer where every pixel has the same RGBA value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either dimension is zero.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let data = rgba.repeat(byte_len(width, height) / CHANNELS);
        Self::from_raw(width, height, data)
    }

    /// Wrap raw RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either dimension is zero or
    /// `data.len() != width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != byte_len(width, height) {
            return Err(Error::InvalidInput {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode an encoded image (PNG, JPEG, ...) into an RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if decoding fails, or [`Error::InvalidInput`]
    /// for an image with a zero dimension.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        Self::try_from(img)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning its bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// RGBA value at `(x, y)`, or `None` outside the buffer.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let idx = self.index(x, y)?;
        let px = &self.data[idx..idx + CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Mutable RGBA slice at `(x, y)`, or `None` outside the buffer.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let idx = self.index(x, y)?;
        Some(&mut self.data[idx..idx + CHANNELS])
    }

    /// Encode the buffer as PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if the encoder fails.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.to_dynamic()?
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Convert into an `image` crate buffer for encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the dimensions do not fit the data,
    /// which construction already rules out.
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .map(DynamicImage::ImageRgba8)
            .ok_or(Error::InvalidInput {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            })
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * CHANNELS)
    }
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = Error;

    fn try_from(img: RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::from_raw(width, height, img.into_raw())
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}
