use std::io::{self, ErrorKind, Read, Write};

use codecpool_core::{Compressor, Decompressor, PoolError, Resettable};
use flate2::{Crc, Decompress, FlushDecompress, Status};

use crate::deflate_codec::{validate_flate_level, DeflateEngine, FLATE_BEST};
use crate::gzip_header::{self, GzipHeader};
use crate::input::InputBuffer;

// ── Compression ─────────────────────────────────────────────────────────────

/// Poolable gzip (RFC 1952) compressor.
///
/// Writes a single member: a 10-byte header, the deflate body, and a
/// CRC-32/ISIZE trailer. The header goes out with the first write (or at
/// finish for an empty stream), so a bound writer that is never written to
/// still produces a valid, empty gzip file.
pub struct GzipCompressor {
    engine: DeflateEngine,
    crc: Crc,
    level: u32,
    header_pending: bool,
}

impl GzipCompressor {
    fn write_header<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        if self.header_pending {
            sink.write_all(&gzip_header::encode(self.level))?;
            self.header_pending = false;
        }
        Ok(())
    }
}

impl Resettable for GzipCompressor {
    fn reset(&mut self) -> io::Result<()> {
        self.engine.reset();
        self.crc.reset();
        self.header_pending = true;
        Ok(())
    }
}

impl Compressor for GzipCompressor {
    type Level = u32;
    type Writer<W: Write> = GzipWriter<W>;

    fn name() -> &'static str {
        "gzip"
    }

    fn best_level() -> u32 {
        FLATE_BEST
    }

    fn validate_level(level: u32) -> Result<(), PoolError> {
        validate_flate_level(Self::name(), level)
    }

    fn new(level: u32) -> io::Result<Self> {
        Ok(Self {
            engine: DeflateEngine::new(level),
            crc: Crc::new(),
            level,
            header_pending: true,
        })
    }

    fn bind<W: Write>(self, sink: W) -> GzipWriter<W> {
        GzipWriter { state: self, sink }
    }

    fn finish<W: Write>(mut writer: GzipWriter<W>) -> io::Result<(Self, W)> {
        let state = &mut writer.state;
        state.write_header(&mut writer.sink)?;
        state.engine.finish(&mut writer.sink)?;
        writer.sink.write_all(&state.crc.sum().to_le_bytes())?;
        writer.sink.write_all(&state.crc.amount().to_le_bytes())?;
        writer.sink.flush()?;
        Ok((writer.state, writer.sink))
    }
}

/// A [`GzipCompressor`] bound to a sink.
pub struct GzipWriter<W> {
    state: GzipCompressor,
    sink: W,
}

impl<W> GzipWriter<W> {
    pub fn get_ref(&self) -> &W {
        &self.sink
    }
}

impl<W: Write> Write for GzipWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.state.write_header(&mut self.sink)?;
        let n = self.state.engine.write(&mut self.sink, data)?;
        self.state.crc.update(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.write_header(&mut self.sink)?;
        self.state.engine.flush(&mut self.sink)?;
        self.sink.flush()
    }
}

// ── Decompression ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Body,
    Trailer,
    Done,
}

/// Poolable gzip decompressor.
///
/// Binding parses the first member header, so a source that is not gzip is
/// rejected at acquisition. Concatenated members are read back to back as
/// one stream; CRC-32 and length are checked at the end of each member.
pub struct GzipDecompressor {
    inflate: Decompress,
    crc: Crc,
    input: InputBuffer,
    header: GzipHeader,
    phase: Phase,
}

impl GzipDecompressor {
    fn read_trailer<R: Read>(&mut self, source: &mut R) -> io::Result<()> {
        let mut trailer = [0u8; 8];
        self.input.read_exact(source, &mut trailer).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                io::Error::new(ErrorKind::UnexpectedEof, "gzip trailer truncated")
            } else {
                err
            }
        })?;

        let crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let isize = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        if crc != self.crc.sum() {
            return Err(io::Error::new(ErrorKind::InvalidData, "gzip CRC-32 mismatch"));
        }
        if isize != self.crc.amount() {
            return Err(io::Error::new(ErrorKind::InvalidData, "gzip length mismatch"));
        }
        Ok(())
    }

    /// After a trailer: stop at end of input, otherwise start the next member.
    fn next_member<R: Read>(&mut self, source: &mut R) -> io::Result<()> {
        if self.input.fill(source)?.is_empty() {
            self.phase = Phase::Done;
            return Ok(());
        }
        self.inflate.reset(false);
        self.crc.reset();
        self.header = gzip_header::parse(&mut self.input, source)?;
        self.phase = Phase::Body;
        Ok(())
    }
}

impl Resettable for GzipDecompressor {
    fn reset(&mut self) -> io::Result<()> {
        self.inflate.reset(false);
        self.crc.reset();
        self.input.clear();
        self.header = GzipHeader::default();
        self.phase = Phase::Body;
        Ok(())
    }
}

impl Decompressor for GzipDecompressor {
    type Reader<R: Read> = GzipReader<R>;

    fn name() -> &'static str {
        "gzip"
    }

    fn new() -> io::Result<Self> {
        Ok(Self {
            inflate: Decompress::new(false),
            crc: Crc::new(),
            input: InputBuffer::new(),
            header: GzipHeader::default(),
            phase: Phase::Body,
        })
    }

    fn bind<R: Read>(mut self, mut source: R) -> io::Result<GzipReader<R>> {
        self.header = gzip_header::parse(&mut self.input, &mut source)?;
        self.phase = Phase::Body;
        Ok(GzipReader {
            state: self,
            source,
        })
    }

    fn finish<R: Read>(mut reader: GzipReader<R>) -> (Self, R) {
        reader.state.input.clear();
        reader.state.phase = Phase::Done;
        (reader.state, reader.source)
    }
}

/// A [`GzipDecompressor`] bound to a source.
///
/// The decompressor reads ahead, so after release the source position is
/// somewhere past the end of the gzip data.
pub struct GzipReader<R> {
    state: GzipDecompressor,
    source: R,
}

impl<R: std::fmt::Debug> std::fmt::Debug for GzipReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipReader")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<R> GzipReader<R> {
    /// Header of the member currently being decoded.
    pub fn header(&self) -> &GzipHeader {
        &self.state.header
    }
}

impl<R: Read> Read for GzipReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let state = &mut self.state;
        loop {
            match state.phase {
                Phase::Done => return Ok(0),
                Phase::Trailer => {
                    state.read_trailer(&mut self.source)?;
                    state.next_member(&mut self.source)?;
                }
                Phase::Body => {
                    let input = state.input.fill(&mut self.source)?;
                    let eof = input.is_empty();

                    let before_in = state.inflate.total_in();
                    let before_out = state.inflate.total_out();
                    let status = state
                        .inflate
                        .decompress(input, out, FlushDecompress::None)
                        .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;
                    let consumed = (state.inflate.total_in() - before_in) as usize;
                    let produced = (state.inflate.total_out() - before_out) as usize;

                    state.input.consume(consumed);
                    state.crc.update(&out[..produced]);

                    if status == Status::StreamEnd {
                        state.phase = Phase::Trailer;
                    }
                    if produced > 0 || out.is_empty() {
                        return Ok(produced);
                    }
                    if eof && status != Status::StreamEnd {
                        return Err(io::Error::new(ErrorKind::UnexpectedEof, "gzip stream truncated"));
                    }
                }
            }
        }
    }
}
