//! 1-bit frame buffer the layout engine draws into.
//!
//! Pixels are packed MSB first, one row after another, with each row padded
//! to a whole byte. A set bit is background (white), a cleared bit is ink
//! (black), which is the polarity the panel expects.
//!
//! Drawing goes through [`embedded_graphics`]: `BinaryColor::On` is ink and
//! `BinaryColor::Off` is background.

use std::convert::Infallible;
use std::path::Path;

use anyhow::{Context, Result};
use embedded_graphics::{
    geometry::{OriginDimensions, Size},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::Rectangle,
    Pixel,
};
use image::{GrayImage, Luma};

/// Fixed-size 1bpp bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Frame {
    /// Creates a frame filled with background.
    pub fn new(width: u32, height: u32) -> Self {
        let row_bytes = width.div_ceil(8) as usize;
        Self {
            width,
            height,
            bytes: vec![0xFF; row_bytes * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per packed row.
    pub fn row_bytes(&self) -> usize {
        self.width.div_ceil(8) as usize
    }

    /// Packed pixel data, row major.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sets a pixel. Out of bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: BinaryColor) {
        if x >= self.width || y >= self.height {
            return;
        }

        let index = y as usize * self.row_bytes() + (x / 8) as usize;
        let mask = 1u8 << (7 - (x % 8));

        if color.is_on() {
            self.bytes[index] &= !mask;
        } else {
            self.bytes[index] |= mask;
        }
    }

    /// Reads a pixel, `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<BinaryColor> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let index = y as usize * self.row_bytes() + (x / 8) as usize;
        let mask = 1u8 << (7 - (x % 8));
        if self.bytes[index] & mask == 0 {
            Some(BinaryColor::On)
        } else {
            Some(BinaryColor::Off)
        }
    }

    /// Number of ink pixels inside `area` (clipped to the frame).
    pub fn ink_in(&self, area: &Rectangle) -> usize {
        area.points()
            .filter(|p| p.x >= 0 && p.y >= 0)
            .filter(|p| self.pixel(p.x as u32, p.y as u32) == Some(BinaryColor::On))
            .count()
    }

    /// Number of ink pixels in the whole frame.
    pub fn ink_count(&self) -> usize {
        self.ink_in(&self.bounding_box())
    }

    /// Writes the frame as an 8-bit grayscale PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = GrayImage::from_fn(self.width, self.height, |x, y| match self.pixel(x, y) {
            Some(BinaryColor::On) => Luma([0u8]),
            _ => Luma([255u8]),
        });

        image
            .save(path)
            .with_context(|| format!("writing PNG to {}", path.display()))
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            self.set_pixel(point.x as u32, point.y as u32, color);
        }

        Ok(())
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
