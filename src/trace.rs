//! Human readable narration of a decode.
//!
//! Every header field and every opcode produces one [`TraceRecord`] carrying
//! the byte offset it was read from. Records go to a [`TraceSink`]; the
//! default [`NoTrace`] sink discards them and costs nothing, so tracing never
//! changes what the decoder returns.

use std::fmt;

use crate::{Channels, Colorspace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Header,
    Magic(String),
    Width(u32),
    Height(u32),
    Channels(Channels),
    Colorspace(Colorspace),
    Rgb,
    Rgba,
    /// Cache slot referenced.
    Index(u8),
    Diff,
    Luma,
    /// Number of pixels repeated.
    Run(u8),
    EndMarker,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str(":HEADER"),
            Self::Magic(magic) => write!(f, ":MAGIC {magic}"),
            Self::Width(width) => write!(f, ":WIDTH {width}"),
            Self::Height(height) => write!(f, ":HEIGHT {height}"),
            Self::Channels(channels) => write!(f, ":CHANNELS {channels}"),
            Self::Colorspace(colorspace) => write!(f, ":COLORSPACE {colorspace}"),
            Self::Rgb => f.write_str(":QOI_OP_RGB"),
            Self::Rgba => f.write_str(":QOI_OP_RGBA"),
            Self::Index(slot) => write!(f, ":QOI_OP_INDEX {slot}"),
            Self::Diff => f.write_str(":QOI_OP_DIFF"),
            Self::Luma => f.write_str(":QOI_OP_LUMA"),
            Self::Run(count) => write!(f, ":QOI_OP_RUN {count}"),
            Self::EndMarker => f.write_str(":END"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Offset of the first byte of the field or opcode in the input.
    pub offset: usize,
    pub event: TraceEvent,
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05x} {}", self.offset, self.event)
    }
}

pub trait TraceSink {
    fn record(&mut self, record: TraceRecord);

    /// Lets the decoder skip building records nobody will look at.
    fn enabled(&self) -> bool {
        true
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    #[inline(always)]
    fn record(&mut self, _record: TraceRecord) {}

    #[inline(always)]
    fn enabled(&self) -> bool {
        false
    }
}

impl TraceSink for Vec<TraceRecord> {
    fn record(&mut self, record: TraceRecord) {
        self.push(record);
    }
}

/// Forwards records to the `log` facade at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn record(&mut self, record: TraceRecord) {
        log::trace!("{record}");
    }

    fn enabled(&self) -> bool {
        log::log_enabled!(log::Level::Trace)
    }
}

impl<S: TraceSink + ?Sized> TraceSink for &mut S {
    fn record(&mut self, record: TraceRecord) {
        (**self).record(record);
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn records_render_with_hex_offset() {
        let record = TraceRecord { offset: 0x1f, event: TraceEvent::Run(62) };
        assert_eq!(record.to_string(), "0001f :QOI_OP_RUN 62");

        let record = TraceRecord { offset: 12, event: TraceEvent::Channels(Channels::Rgba) };
        assert_eq!(record.to_string(), "0000c :CHANNELS RGBA");

        let record = TraceRecord { offset: 13, event: TraceEvent::Colorspace(Colorspace::Srgb) };
        assert_eq!(record.to_string(), "0000d :COLORSPACE sRGB and linear alpha");
    }

    #[test]
    fn borrowed_sink_forwards() {
        fn push_header(mut sink: impl TraceSink) {
            assert!(sink.enabled());
            sink.record(TraceRecord { offset: 0, event: TraceEvent::Header });
        }

        let mut records: Vec<TraceRecord> = Vec::new();
        push_header(&mut records);
        push_header(&mut records);
        assert_eq!(records.len(), 2);
        assert!(!NoTrace.enabled());
    }
}
