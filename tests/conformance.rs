//! Decodes images produced by the `image` crate's QOI encoder.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use qoi_trace::{Channels, DecodeError, PixelGrid, QoiDecoder, TraceEvent, TraceRecord};

/// xorshift, good enough to defeat the run and diff opcodes.
struct Noise(u32);

impl Noise {
    fn next(&mut self) -> u8 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 >> 24) as u8
    }
}

/// Flat stripes, smooth gradients, a small repeating palette and noise, so
/// every opcode shows up in the encoded stream.
fn rgba_image(width: u32, height: u32) -> RgbaImage {
    let mut noise = Noise(0x9e3779b9);
    let palette = [[255, 0, 0, 255], [0, 255, 0, 128], [0, 0, 255, 0], [7, 7, 7, 7]];
    RgbaImage::from_fn(width, height, |x, y| match y % 4 {
        0 => Rgba([40, 80, 120, 255]),
        1 => Rgba([x as u8, (x * 2) as u8, (x + y) as u8, 255]),
        2 => Rgba(palette[(x as usize / 3) % palette.len()]),
        _ => Rgba([noise.next(), noise.next(), noise.next(), noise.next()]),
    })
}

fn rgb_image(width: u32, height: u32) -> RgbImage {
    let rgba = rgba_image(width, height);
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, _] = rgba.get_pixel(x, y).0;
        Rgb([r, g, b])
    })
}

fn encode_rgba(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Qoi).unwrap();
    bytes
}

fn encode_rgb(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Qoi).unwrap();
    bytes
}

fn assert_shape(grid: &PixelGrid, channels: usize) {
    let expected = (grid.width() * grid.height()) as usize;
    assert_eq!(grid.rows().count(), grid.height() as usize);
    assert_eq!(grid.rows().flatten().count(), expected);
    assert!(grid.rows().flatten().all(|px| px.len() == channels));
}

#[test]
fn rgba_round_trip() {
    let image = rgba_image(67, 33);
    let grid = qoi_trace::decode(&encode_rgba(&image)).unwrap();

    assert_eq!(grid.channels(), Channels::Rgba);
    assert_shape(&grid, 4);
    assert_eq!(grid.as_bytes(), image.as_raw().as_slice());
}

#[test]
fn rgb_round_trip() {
    let image = rgb_image(64, 17);
    let grid = qoi_trace::decode(&encode_rgb(&image)).unwrap();

    assert_eq!(grid.channels(), Channels::Rgb);
    assert_shape(&grid, 3);
    assert_eq!(grid.as_bytes(), image.as_raw().as_slice());
}

#[test]
fn long_runs_span_rows() {
    let image = RgbaImage::from_pixel(200, 3, Rgba([1, 2, 3, 4]));
    let grid = qoi_trace::decode(&encode_rgba(&image)).unwrap();
    assert_eq!(grid.as_bytes(), image.as_raw().as_slice());
}

#[test]
fn agrees_with_image_crate_decoder() {
    let bytes = encode_rgba(&rgba_image(31, 29));
    let reference = image::load_from_memory_with_format(&bytes, ImageFormat::Qoi)
        .unwrap()
        .into_rgba8();

    let grid = qoi_trace::decode(&bytes).unwrap();
    assert_eq!(grid.to_dynamic_image().unwrap().into_rgba8(), reference);
}

#[test]
fn trace_covers_whole_stream() {
    let bytes = encode_rgba(&rgba_image(16, 8));
    let mut records: Vec<TraceRecord> = Vec::new();
    let traced = QoiDecoder::new(&bytes).with_trace(&mut records).decode().unwrap();

    assert_eq!(traced, qoi_trace::decode(&bytes).unwrap());
    assert_eq!(records.first().map(|r| r.offset), Some(0));
    assert_eq!(
        records.last(),
        Some(&TraceRecord { offset: bytes.len() - 8, event: TraceEvent::EndMarker })
    );
    assert!(records.windows(2).skip(6).all(|w| w[0].offset < w[1].offset));
}

#[test]
fn truncated_file_fails() {
    let bytes = encode_rgba(&rgba_image(20, 20));
    let err = qoi_trace::decode(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::LengthMismatch { expected: 400, .. }
            | DecodeError::UnexpectedEndOfInput { .. }
    ));
}

#[test]
fn not_a_qoi_file() {
    let mut png = Vec::new();
    rgba_image(2, 2)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    assert!(matches!(qoi_trace::decode(&png), Err(DecodeError::InvalidMagic { .. })));
}

#[test]
fn decodes_from_file() {
    let image = rgba_image(9, 9);
    let path = std::env::temp_dir().join(format!("qoi-trace-{}.qoi", std::process::id()));
    std::fs::write(&path, encode_rgba(&image)).unwrap();

    let decoded = qoi_trace::decode_file(&path);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(decoded.unwrap().as_bytes(), image.as_raw().as_slice());

    let missing = qoi_trace::decode_file(path.with_extension("missing"));
    assert!(matches!(missing, Err(DecodeError::Io { .. })));
}
