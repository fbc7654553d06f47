use std::slice::ChunksExact;

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::{Channels, Header, Pixel};

/// A decoded image: `height` rows of `width` pixels, row 0 first, each pixel
/// stored as `channels` consecutive bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    header: Header,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Packs a decoded pixel sequence into rows of `channels` bytes per pixel.
    pub(crate) fn from_pixels(header: Header, pixels: &[Pixel]) -> Self {
        let channels = header.channels.count();
        let mut data = Vec::with_capacity(pixels.len() * channels);
        for pixel in pixels {
            data.extend_from_slice(&pixel.to_array()[..channels]);
        }
        Self { header, data }
    }

    pub const fn header(&self) -> &Header {
        &self.header
    }

    pub const fn width(&self) -> u32 {
        self.header.width
    }

    pub const fn height(&self) -> u32 {
        self.header.height
    }

    pub const fn channels(&self) -> Channels {
        self.header.channels
    }

    /// Channel values of the pixel at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let channels = self.channels().count();
        let start = (y as usize * self.width() as usize + x as usize) * channels;
        self.data.get(start..start + channels)
    }

    /// Rows top to bottom, each yielding its pixels left to right.
    pub fn rows(&self) -> impl Iterator<Item = ChunksExact<'_, u8>> + '_ {
        let channels = self.channels().count();
        let row_len = (self.width() as usize * channels).max(1);
        self.data
            .chunks_exact(row_len)
            .map(move |row| row.chunks_exact(channels))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Hands the pixels to the `image` crate, e.g. for saving as PNG.
    pub fn to_dynamic_image(&self) -> Option<DynamicImage> {
        let (width, height) = (self.width(), self.height());
        match self.channels() {
            Channels::Rgb => {
                RgbImage::from_raw(width, height, self.data.clone()).map(DynamicImage::ImageRgb8)
            }
            Channels::Rgba => {
                RgbaImage::from_raw(width, height, self.data.clone()).map(DynamicImage::ImageRgba8)
            }
        }
    }
}
