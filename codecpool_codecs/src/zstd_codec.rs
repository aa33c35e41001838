use std::io::{self, ErrorKind, Read, Write};
use std::ops::RangeInclusive;

use codecpool_core::{Compressor, Decompressor, PoolError, Resettable};
use zstd::stream::raw::{Decoder, Encoder, Operation, OutBuffer};

use crate::input::InputBuffer;

/// Highest level that does not need the "ultra" window sizes; used as the
/// best-compression level for zstd pools.
pub const ZSTD_BEST: i32 = 19;

const STAGING_CAPACITY: usize = 32 * 1024;

const FRAME_MAGIC: u32 = 0xFD2F_B528;
const SKIPPABLE_MAGIC: u32 = 0x184D_2A50;
const SKIPPABLE_MASK: u32 = 0xFFFF_FFF0;

// Frame header layout (RFC 8878 section 3.1.1.1).
const MAX_FRAME_HEADER: usize = 18;
const FHD_RESERVED: u8 = 0x08;
const FHD_SINGLE_SEGMENT: u8 = 0x20;

/// Largest window the decoder accepts at its default memory limit.
const MAX_WINDOW: u64 = 1 << 27;

fn level_range() -> RangeInclusive<i32> {
    zstd::compression_level_range()
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

/// Validate the frame header at the start of `head`, magic included.
///
/// Only what a dictionary-less decoder at the default window limit can
/// decode is accepted.
fn check_frame_header(head: &[u8]) -> io::Result<()> {
    let Some(&descriptor) = head.get(4) else {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "source too short for a zstd frame header",
        ));
    };
    if descriptor & FHD_RESERVED != 0 {
        return Err(invalid("reserved zstd frame descriptor bit set"));
    }

    let single_segment = descriptor & FHD_SINGLE_SEGMENT != 0;
    let window_len = usize::from(!single_segment);
    let dict_id_len = [0, 1, 2, 4][usize::from(descriptor & 0x03)];
    let content_size_len = match descriptor >> 6 {
        0 => usize::from(single_segment),
        1 => 2,
        2 => 4,
        _ => 8,
    };
    let header_len = 5 + window_len + dict_id_len + content_size_len;
    if head.len() < header_len {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "source too short for a zstd frame header",
        ));
    }

    if !single_segment {
        let window = head[5];
        let base = 1u64 << (10 + u32::from(window >> 3));
        let size = base + (base / 8) * u64::from(window & 0x07);
        if size > MAX_WINDOW {
            return Err(invalid("zstd frame window too large"));
        }
    }

    let dict_id = &head[5 + window_len..5 + window_len + dict_id_len];
    if dict_id.iter().any(|&b| b != 0) {
        return Err(invalid("zstd frame requires a dictionary"));
    }
    Ok(())
}

// ── Compression ─────────────────────────────────────────────────────────────

/// Poolable Zstandard compressor.
///
/// Wraps a native compression context; reset keeps its parameters and only
/// drops the session, which zstd guarantees is equivalent to a new context.
pub struct ZstdCompressor {
    encoder: Encoder<'static>,
    staging: Box<[u8]>,
}

impl Resettable for ZstdCompressor {
    fn reset(&mut self) -> io::Result<()> {
        self.encoder.reinit()
    }
}

impl Compressor for ZstdCompressor {
    type Level = i32;
    type Writer<W: Write> = ZstdWriter<W>;

    fn name() -> &'static str {
        "zstd"
    }

    fn best_level() -> i32 {
        ZSTD_BEST
    }

    fn validate_level(level: i32) -> Result<(), PoolError> {
        let range = level_range();
        if !range.contains(&level) {
            return Err(PoolError::Configuration(format!(
                "zstd level {level} out of range {}..={}",
                range.start(),
                range.end()
            )));
        }
        Ok(())
    }

    fn new(level: i32) -> io::Result<Self> {
        Ok(Self {
            encoder: Encoder::new(level)?,
            staging: vec![0u8; STAGING_CAPACITY].into_boxed_slice(),
        })
    }

    fn bind<W: Write>(self, sink: W) -> ZstdWriter<W> {
        ZstdWriter { state: self, sink }
    }

    fn finish<W: Write>(mut writer: ZstdWriter<W>) -> io::Result<(Self, W)> {
        let state = &mut writer.state;
        loop {
            let (remaining, produced) = {
                let mut out = OutBuffer::around(&mut state.staging[..]);
                let remaining = state.encoder.finish(&mut out, true)?;
                (remaining, out.pos())
            };
            writer.sink.write_all(&state.staging[..produced])?;
            if remaining == 0 {
                break;
            }
        }
        writer.sink.flush()?;
        Ok((writer.state, writer.sink))
    }
}

/// A [`ZstdCompressor`] bound to a sink.
pub struct ZstdWriter<W> {
    state: ZstdCompressor,
    sink: W,
}

impl<W: Write> Write for ZstdWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let state = &mut self.state;
        loop {
            let status = state.encoder.run_on_buffers(data, &mut state.staging)?;
            self.sink.write_all(&state.staging[..status.bytes_written])?;
            if status.bytes_read > 0 {
                return Ok(status.bytes_read);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let state = &mut self.state;
        loop {
            let (remaining, produced) = {
                let mut out = OutBuffer::around(&mut state.staging[..]);
                let remaining = state.encoder.flush(&mut out)?;
                (remaining, out.pos())
            };
            self.sink.write_all(&state.staging[..produced])?;
            if remaining == 0 {
                break;
            }
        }
        self.sink.flush()
    }
}

// ── Decompression ───────────────────────────────────────────────────────────

/// Poolable Zstandard decompressor.
///
/// Binding validates the first frame header; a skippable frame is accepted
/// on its magic number alone. Concatenated frames are decoded as one stream.
pub struct ZstdDecompressor {
    decoder: Decoder<'static>,
    input: InputBuffer,
    frame_done: bool,
}

impl Resettable for ZstdDecompressor {
    fn reset(&mut self) -> io::Result<()> {
        self.decoder.reinit()?;
        self.input.clear();
        self.frame_done = false;
        Ok(())
    }
}

impl Decompressor for ZstdDecompressor {
    type Reader<R: Read> = ZstdReader<R>;

    fn name() -> &'static str {
        "zstd"
    }

    fn new() -> io::Result<Self> {
        Ok(Self {
            decoder: Decoder::new()?,
            input: InputBuffer::new(),
            frame_done: false,
        })
    }

    fn bind<R: Read>(mut self, mut source: R) -> io::Result<ZstdReader<R>> {
        let head = self.input.peek(&mut source, MAX_FRAME_HEADER)?;
        if head.len() < 4 {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "source too short for a zstd frame header",
            ));
        }
        let magic = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
        if magic == FRAME_MAGIC {
            check_frame_header(head)?;
        } else if magic & SKIPPABLE_MASK != SKIPPABLE_MAGIC {
            return Err(invalid("not a zstd stream: bad magic number"));
        }
        Ok(ZstdReader {
            state: self,
            source,
        })
    }

    fn finish<R: Read>(mut reader: ZstdReader<R>) -> (Self, R) {
        reader.state.input.clear();
        (reader.state, reader.source)
    }
}

/// A [`ZstdDecompressor`] bound to a source.
pub struct ZstdReader<R> {
    state: ZstdDecompressor,
    source: R,
}

impl<R: std::fmt::Debug> std::fmt::Debug for ZstdReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdReader")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<R: Read> Read for ZstdReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let state = &mut self.state;
        loop {
            let input = state.input.fill(&mut self.source)?;
            let eof = input.is_empty();
            if eof && state.frame_done {
                return Ok(0);
            }

            // At end of input the decoder may still hold decoded bytes.
            let status = state
                .decoder
                .run_on_buffers(input, out)
                .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;
            state.input.consume(status.bytes_read);
            state.frame_done = status.remaining == 0;

            if status.bytes_written > 0 {
                return Ok(status.bytes_written);
            }
            if eof {
                if state.frame_done {
                    return Ok(0);
                }
                return Err(io::Error::new(ErrorKind::UnexpectedEof, "zstd frame truncated"));
            }
        }
    }
}
