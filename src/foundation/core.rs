use crate::foundation::error::{CompographError, CompographResult};

pub use kurbo::{Affine, Point, Vec2};

/// A block of RGBA8 pixels.
///
/// Used for media uploads, device readback and target presentation. Rows are tightly packed and
/// stored top-down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Fully transparent frame.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; byte_len(width, height)],
            premultiplied: false,
        }
    }

    /// Frame filled with a single straight-alpha color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(byte_len(width, height));
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
            premultiplied: false,
        }
    }

    /// Wrap raw bytes, checking the length against the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> CompographResult<Self> {
        if data.len() != byte_len(width, height) {
            return Err(CompographError::validation(format!(
                "frame data is {} bytes, expected {} for {width}x{height}",
                data.len(),
                byte_len(width, height)
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            premultiplied: false,
        })
    }

    /// Pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Copy with the row order reversed.
    pub fn flipped_vertical(&self) -> Self {
        let row = self.width as usize * 4;
        let mut data = Vec::with_capacity(self.data.len());
        if row > 0 {
            for chunk in self.data.chunks_exact(row).rev() {
                data.extend_from_slice(chunk);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            data,
            premultiplied: self.premultiplied,
        }
    }

    /// Convert into an `image` buffer (e.g. for saving to PNG).
    pub fn to_image(&self) -> CompographResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| CompographError::validation("frame buffer size mismatch"))
    }

    /// Build from an `image` buffer.
    pub fn from_image(img: &image::RgbaImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.as_raw().clone(),
            premultiplied: false,
        }
    }
}

pub(crate) fn byte_len(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(4)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
