use std::io::{self, Write};

use codecpool_core::{Compressor, PoolError, Resettable};
use flate2::{Compress, Compression, FlushCompress, Status};

/// Size of the staging buffer between the deflate engine and the sink.
const STAGING_CAPACITY: usize = 32 * 1024;

/// Highest level flate2 accepts.
pub const FLATE_BEST: u32 = 9;

pub(crate) fn validate_flate_level(family: &str, level: u32) -> Result<(), PoolError> {
    if level > FLATE_BEST {
        return Err(PoolError::Configuration(format!(
            "{family} level {level} out of range 0..={FLATE_BEST}"
        )));
    }
    Ok(())
}

/// Raw deflate engine plus its staging buffer, shared by the deflate and
/// gzip writers.
pub(crate) struct DeflateEngine {
    compress: Compress,
    staging: Vec<u8>,
}

impl DeflateEngine {
    pub(crate) fn new(level: u32) -> Self {
        Self {
            compress: Compress::new(Compression::new(level), false),
            staging: Vec::with_capacity(STAGING_CAPACITY),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.compress.reset();
        self.staging.clear();
    }

    fn drain<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        if !self.staging.is_empty() {
            sink.write_all(&self.staging)?;
            self.staging.clear();
        }
        Ok(())
    }

    fn run(&mut self, input: &[u8], flush: FlushCompress) -> io::Result<Status> {
        self.compress
            .compress_vec(input, &mut self.staging, flush)
            .map_err(io::Error::other)
    }

    /// Compress as much of `data` as fits, returning how many bytes were taken.
    pub(crate) fn write<W: Write>(&mut self, sink: &mut W, data: &[u8]) -> io::Result<usize> {
        loop {
            self.drain(sink)?;
            let before = self.compress.total_in();
            let status = self.run(data, FlushCompress::None)?;
            let consumed = (self.compress.total_in() - before) as usize;

            // Staging filled before any input was taken; drain and go again.
            if consumed == 0 && !data.is_empty() && status != Status::StreamEnd {
                continue;
            }
            return Ok(consumed);
        }
    }

    /// Sync flush: every byte written so far reaches the sink, the stream
    /// stays open.
    pub(crate) fn flush<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        self.drain(sink)?;
        self.run(&[], FlushCompress::Sync)?;
        loop {
            self.drain(sink)?;
            let before = self.compress.total_out();
            self.run(&[], FlushCompress::None)?;
            if before == self.compress.total_out() {
                return Ok(());
            }
        }
    }

    /// Terminate the deflate stream into `sink`. Does not flush the sink.
    pub(crate) fn finish<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        loop {
            self.drain(sink)?;
            let before = self.compress.total_out();
            self.run(&[], FlushCompress::Finish)?;
            if before == self.compress.total_out() {
                return Ok(());
            }
        }
    }
}

/// Poolable raw deflate (RFC 1951) compressor.
///
/// Building one allocates the match-finder tables, which is the cost the
/// pool amortizes. Raw deflate has no header, so there is no matching
/// reader pool: a decoder cannot tell a valid source from garbage at bind
/// time.
pub struct DeflateCompressor {
    engine: DeflateEngine,
}

impl Resettable for DeflateCompressor {
    fn reset(&mut self) -> io::Result<()> {
        self.engine.reset();
        Ok(())
    }
}

impl Compressor for DeflateCompressor {
    type Level = u32;
    type Writer<W: Write> = DeflateWriter<W>;

    fn name() -> &'static str {
        "deflate"
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
        })
    }

    fn bind<W: Write>(self, sink: W) -> DeflateWriter<W> {
        DeflateWriter { state: self, sink }
    }

    fn finish<W: Write>(mut writer: DeflateWriter<W>) -> io::Result<(Self, W)> {
        writer.state.engine.finish(&mut writer.sink)?;
        writer.sink.flush()?;
        Ok((writer.state, writer.sink))
    }
}

/// A [`DeflateCompressor`] bound to a sink.
pub struct DeflateWriter<W> {
    state: DeflateCompressor,
    sink: W,
}

impl<W: Write> Write for DeflateWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.state.engine.write(&mut self.sink, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.engine.flush(&mut self.sink)?;
        self.sink.flush()
    }
}
