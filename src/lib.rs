//! A decoder for the Quite OK Image format that can narrate what it decodes.
//!
//! ```no_run
//! let data = std::fs::read("dice.qoi").unwrap();
//! let grid = qoi_trace::decode(&data).unwrap();
//! println!("{}x{}", grid.width(), grid.height());
//! ```

mod cursor;
mod decode;
mod grid;
pub mod trace;

pub use cursor::ByteCursor;
pub use decode::*;
pub use grid::PixelGrid;
pub use trace::{LogTrace, NoTrace, TraceEvent, TraceRecord, TraceSink};

pub const MAGIC: [u8; 4] = *b"qoif";
pub const END_MARKER: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 1];

/// Largest `width * height` accepted by default, same as the reference implementation.
pub const PIXELS_MAX: u64 = 400_000_000;

pub(crate) const OP_RGB: u8 = 0b11111110;
pub(crate) const OP_RGBA: u8 = 0b11111111;
pub(crate) const OP_INDEX: u8 = 0b00;
pub(crate) const OP_DIFF: u8 = 0b01;
pub(crate) const OP_LUMA: u8 = 0b10;
pub(crate) const OP_RUN: u8 = 0b11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
    pub colorspace: Colorspace,
}

impl Header {
    /// Number of pixels the opcode stream has to produce.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum Channels {
    #[default]
    #[display("RGB")]
    Rgb = 3,
    #[display("RGBA")]
    Rgba = 4,
}

impl Channels {
    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    pub const fn count(self) -> usize {
        self as usize
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum Colorspace {
    /// sRGB with linear alpha.
    #[default]
    #[display("sRGB and linear alpha")]
    Srgb = 0,
    /// All channels linear.
    #[display("all linear")]
    Linear = 1,
}

impl Colorspace {
    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Srgb),
            1 => Some(Self::Linear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    /// Content of every cache slot before the first pixel is decoded.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// The implicit pixel preceding the first one in the stream.
    pub const START: Self = Self::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Slot of this pixel in the 64 entry color cache.
    pub fn hash(self) -> usize {
        let [r, g, b, a] = self.to_array().map(usize::from);
        (r * 3 + g * 5 + b * 7 + a * 11) % 64
    }

    /// Applies signed per-channel deltas with wrap-around, keeping alpha.
    pub(crate) fn offset(self, dr: i8, dg: i8, db: i8) -> Self {
        Self {
            r: self.r.wrapping_add_signed(dr),
            g: self.g.wrapping_add_signed(dg),
            b: self.b.wrapping_add_signed(db),
            a: self.a,
        }
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[u8; 4]> for Pixel {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}
