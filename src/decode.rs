use std::path::Path;

use derive_more::{Display, Error, From};
use log::debug;

use crate::{
    ByteCursor, Channels, Colorspace, END_MARKER, Header, MAGIC, NoTrace, OP_DIFF, OP_INDEX,
    OP_LUMA, OP_RGB, OP_RGBA, OP_RUN, PIXELS_MAX, Pixel, PixelGrid, TraceEvent, TraceRecord,
    TraceSink,
};

/// Decodes a complete QOI file held in memory.
pub fn decode(data: &[u8]) -> Result<PixelGrid, DecodeError> {
    QoiDecoder::new(data).decode()
}

/// Parses only the 14 byte header.
pub fn decode_header(data: &[u8]) -> Result<Header, DecodeError> {
    QoiDecoder::new(data).decode_header()
}

/// Convenience function that reads the whole file, then calls `decode`.
pub fn decode_file(path: impl AsRef<Path>) -> Result<PixelGrid, DecodeError> {
    let data = std::fs::read(path)?;
    decode(&data)
}

#[derive(Debug, Display, Error, From)]
pub enum DecodeError {
    #[display("unexpected end of input at byte {offset}: wanted {wanted} bytes, {remaining} left")]
    UnexpectedEndOfInput {
        offset: usize,
        wanted: usize,
        remaining: usize,
    },
    #[display("invalid magic {found:?}, expected \"qoif\"")]
    InvalidMagic { found: String },
    #[display("invalid channel count {found}, expected 3 or 4")]
    InvalidChannelCount { found: u8 },
    #[display("invalid colorspace {found}, expected 0 or 1")]
    InvalidColorSpace { found: u8 },
    #[display("image of {width}x{height} pixels exceeds the limit of {limit} pixels")]
    ImageTooLarge { width: u32, height: u32, limit: u64 },
    #[display("corrupt stream: unknown tag {tag:#04x} at byte {offset}")]
    CorruptStream { offset: usize, tag: u8 },
    #[display("decoded {found} pixels, header declares {expected}")]
    LengthMismatch { expected: u64, found: u64 },
    #[display("malformed pixel {index}: {reason}")]
    MalformedPixel { index: usize, reason: String },
    #[display("failed to read input: {source}")]
    #[from]
    Io { source: std::io::Error },
}

/// Restrictions the decoder enforces before allocating anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    max_pixels: u64,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self { max_pixels: PIXELS_MAX }
    }
}

impl DecoderOptions {
    pub const fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    /// Rejects headers whose `width * height` is larger than `max_pixels`.
    pub const fn set_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }
}

/// One decoded opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Rgb([u8; 3]),
    Rgba([u8; 4]),
    Index(u8),
    Diff { dr: i8, dg: i8, db: i8 },
    Luma { dg: i8, dr_dg: i8, db_dg: i8 },
    Run(u8),
}

impl Op {
    fn event(self) -> TraceEvent {
        match self {
            Op::Rgb(_) => TraceEvent::Rgb,
            Op::Rgba(_) => TraceEvent::Rgba,
            Op::Index(slot) => TraceEvent::Index(slot),
            Op::Diff { .. } => TraceEvent::Diff,
            Op::Luma { .. } => TraceEvent::Luma,
            Op::Run(count) => TraceEvent::Run(count),
        }
    }
}

fn msb2(x: u8) -> u8 {
    (x & 0b11000000) >> 6
}

fn lsb6(x: u8) -> u8 {
    x & 0b00111111
}

/// State carried from one opcode to the next.
#[derive(Debug)]
struct Session {
    channels: Channels,
    cache: [Pixel; 64],
    previous: Pixel,
    pixels: Vec<Pixel>,
    /// Pixels past this count are never stored.
    limit: usize,
    /// First pixel that came from a four component literal in a three
    /// channel image.
    extra_alpha: Option<usize>,
}

impl Session {
    fn new(channels: Channels, limit: usize, capacity: usize) -> Self {
        Self {
            channels,
            cache: [Pixel::ZERO; 64],
            previous: Pixel::START,
            pixels: Vec::with_capacity(capacity),
            limit,
            extra_alpha: None,
        }
    }

    fn apply(&mut self, op: Op) -> Result<(), DecodeError> {
        let pixel = match op {
            Op::Rgb([r, g, b]) => Pixel::new(r, g, b, self.previous.a),
            Op::Rgba(rgba) => {
                if self.channels == Channels::Rgb && self.extra_alpha.is_none() {
                    self.extra_alpha = Some(self.pixels.len());
                }
                Pixel::from(rgba)
            }
            Op::Index(slot) => self.cache[usize::from(slot)],
            Op::Diff { dr, dg, db } => self.previous.offset(dr, dg, db),
            Op::Luma { dg, dr_dg, db_dg } => self.previous.offset(dg + dr_dg, dg, dg + db_dg),
            Op::Run(count) => {
                for _ in 0..count {
                    self.push(self.previous)?;
                }
                return Ok(());
            }
        };
        self.push(pixel)
    }

    fn push(&mut self, mut pixel: Pixel) -> Result<(), DecodeError> {
        if self.pixels.len() == self.limit {
            return Err(DecodeError::LengthMismatch {
                expected: self.limit as u64,
                found: self.limit as u64 + 1,
            });
        }
        if self.channels == Channels::Rgb {
            pixel.a = 255;
        }
        self.pixels.push(pixel);
        self.previous = pixel;
        self.cache[pixel.hash()] = pixel;
        Ok(())
    }
}

/// A Quite OK Image decoder over an in-memory buffer.
///
/// Each decoder owns its cursor, color cache and previous pixel, so separate
/// decoders never share state. A [`TraceSink`] may be attached to observe
/// the decode; it has no influence on the result.
#[derive(Debug)]
pub struct QoiDecoder<'a, S: TraceSink = NoTrace> {
    cursor: ByteCursor<'a>,
    options: DecoderOptions,
    header: Option<Header>,
    trace: S,
}

impl<'a> QoiDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::new_with_options(data, DecoderOptions::default())
    }

    pub fn new_with_options(data: &'a [u8], options: DecoderOptions) -> Self {
        Self {
            cursor: ByteCursor::new(data),
            options,
            header: None,
            trace: NoTrace,
        }
    }
}

impl<'a, S: TraceSink> QoiDecoder<'a, S> {
    /// Sends a record for every header field and opcode to `trace`.
    pub fn with_trace<T: TraceSink>(self, trace: T) -> QoiDecoder<'a, T> {
        QoiDecoder {
            cursor: self.cursor,
            options: self.options,
            header: self.header,
            trace,
        }
    }

    pub const fn options(&self) -> &DecoderOptions {
        &self.options
    }

    fn emit(&mut self, offset: usize, event: impl FnOnce() -> TraceEvent) {
        if self.trace.enabled() {
            self.trace.record(TraceRecord { offset, event: event() });
        }
    }

    /// Parses the header, or returns the one parsed earlier.
    pub fn decode_header(&mut self) -> Result<Header, DecodeError> {
        if let Some(header) = self.header {
            return Ok(header);
        }

        let offset = self.cursor.position();
        self.emit(offset, || TraceEvent::Header);
        let magic = self.cursor.read_ascii(MAGIC.len())?;
        self.emit(offset, || TraceEvent::Magic(magic.clone()));
        if magic.as_bytes() != MAGIC {
            return Err(DecodeError::InvalidMagic { found: magic });
        }

        let width = self.cursor.read_u32_be()?;
        self.emit(offset + 4, || TraceEvent::Width(width));
        let height = self.cursor.read_u32_be()?;
        self.emit(offset + 8, || TraceEvent::Height(height));

        let byte = self.cursor.read_byte()?;
        let channels =
            Channels::from_byte(byte).ok_or(DecodeError::InvalidChannelCount { found: byte })?;
        self.emit(offset + 12, || TraceEvent::Channels(channels));

        let byte = self.cursor.read_byte()?;
        let colorspace =
            Colorspace::from_byte(byte).ok_or(DecodeError::InvalidColorSpace { found: byte })?;
        self.emit(offset + 13, || TraceEvent::Colorspace(colorspace));

        let header = Header { width, height, channels, colorspace };
        debug!("Header: {width}x{height}, {channels}, {colorspace}");
        self.header = Some(header);
        Ok(header)
    }

    /// Decodes the whole image.
    ///
    /// The opcode stream is read until the input runs out, then the number
    /// of pixels produced has to equal `width * height` exactly. Decoding
    /// stops early once the stream produces more pixels than that.
    pub fn decode(&mut self) -> Result<PixelGrid, DecodeError> {
        let header = self.decode_header()?;

        let expected = header.pixel_count();
        if expected > self.options.max_pixels() {
            return Err(DecodeError::ImageTooLarge {
                width: header.width,
                height: header.height,
                limit: self.options.max_pixels(),
            });
        }
        if expected == 0 {
            return Err(DecodeError::LengthMismatch { expected, found: 0 });
        }
        let expected_len =
            usize::try_from(expected).map_err(|_| DecodeError::ImageTooLarge {
                width: header.width,
                height: header.height,
                limit: self.options.max_pixels(),
            })?;

        let end_marker = self.strip_end_marker();

        // A single opcode never yields more than 62 pixels.
        let capacity = expected_len.min(self.cursor.remaining().saturating_mul(62));
        let mut session = Session::new(header.channels, expected_len, capacity);

        while !self.cursor.is_empty() {
            let offset = self.cursor.position();
            let op = self.read_op()?;
            self.emit(offset, || op.event());
            session.apply(op)?;
        }
        if let Some(offset) = end_marker {
            self.emit(offset, || TraceEvent::EndMarker);
        }

        let found = session.pixels.len() as u64;
        if found != expected {
            return Err(DecodeError::LengthMismatch { expected, found });
        }
        if let Some(index) = session.extra_alpha {
            return Err(DecodeError::MalformedPixel {
                index,
                reason: "4 components in a 3 channel image".to_string(),
            });
        }
        debug!("Decoded {found} pixels");

        Ok(PixelGrid::from_pixels(header, &session.pixels))
    }

    /// Cuts the end marker off the opcode stream, returning where it started.
    fn strip_end_marker(&mut self) -> Option<usize> {
        let rest = self.cursor.rest();
        if !rest.ends_with(&END_MARKER) {
            return None;
        }
        let offset = self.cursor.position() + rest.len() - END_MARKER.len();
        self.cursor.truncate_end(END_MARKER.len());
        Some(offset)
    }

    fn read_op(&mut self) -> Result<Op, DecodeError> {
        let offset = self.cursor.position();
        let op = match self.cursor.read_byte()? {
            OP_RGB => Op::Rgb(self.cursor.read_array()?),
            OP_RGBA => Op::Rgba(self.cursor.read_array()?),
            tag => match msb2(tag) {
                OP_INDEX => Op::Index(lsb6(tag)),
                OP_DIFF => Op::Diff {
                    dr: ((tag >> 4) & 0b11) as i8 - 2,
                    dg: ((tag >> 2) & 0b11) as i8 - 2,
                    db: (tag & 0b11) as i8 - 2,
                },
                OP_LUMA => {
                    let byte = self.cursor.read_byte()?;
                    Op::Luma {
                        dg: lsb6(tag) as i8 - 32,
                        dr_dg: (byte >> 4) as i8 - 8,
                        db_dg: (byte & 0b1111) as i8 - 8,
                    }
                }
                OP_RUN => Op::Run(lsb6(tag) + 1),
                _ => return Err(DecodeError::CorruptStream { offset, tag }),
            },
        };
        Ok(op)
    }
}
