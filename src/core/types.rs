//! Image description types shared by every worker.
//!
//! Pixel data itself travels as [`image::RgbaImage`]; these types carry the
//! metadata the partitioner and the wire record need without the pixels.

use crate::core::error::ConfigError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes in one RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Pixel layout of every image the engine handles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Four 8-bit channels, red first.
    #[default]
    Rgba8,
}

impl PixelFormat {
    /// Size of one pixel in bytes.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => BYTES_PER_PIXEL,
        }
    }
}

/// Which edge of the file row 0 refers to.
///
/// Fixed for the lifetime of a job; the codec flips rows on both load and
/// save, so the engine never sees the difference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Row 0 is the top of the picture.
    #[default]
    TopLeft,
    /// Row 0 is the bottom of the picture.
    BottomLeft,
}

/// Image metadata without the pixel data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Pixel layout
    pub format: PixelFormat,
}

impl ImageDescriptor {
    /// Create an RGBA8 descriptor.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
        }
    }

    /// Describe an existing image.
    pub fn of(image: &RgbaImage) -> Self {
        Self::new(image.width() as usize, image.height() as usize)
    }

    /// Bytes in one row.
    pub fn row_bytes(&self) -> usize {
        self.width * self.format.bytes_per_pixel()
    }

    /// Bytes in the whole image.
    pub fn byte_len(&self) -> usize {
        self.row_bytes() * self.height
    }

    /// Check that `image` has exactly these dimensions.
    pub fn check(&self, image: &RgbaImage) -> Result<(), ConfigError> {
        let got = Self::of(image);
        if got.width != self.width || got.height != self.height {
            return Err(ConfigError::ImageMismatch {
                width: self.width,
                height: self.height,
                got_width: got.width,
                got_height: got.height,
            });
        }
        Ok(())
    }

    /// Wrap a raw row-major RGBA buffer with these dimensions.
    pub fn wrap(&self, data: Vec<u8>) -> Result<RgbaImage, ConfigError> {
        let got = data.len();
        if got != self.byte_len() {
            return Err(ConfigError::BufferSizeMismatch {
                expected: self.byte_len(),
                got,
            });
        }
        RgbaImage::from_raw(self.width as u32, self.height as u32, data).ok_or(
            ConfigError::BufferSizeMismatch {
                expected: self.byte_len(),
                got,
            },
        )
    }
}

impl fmt::Display for ImageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {:?}", self.width, self.height, self.format)
    }
}
