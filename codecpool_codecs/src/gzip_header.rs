use std::io::{self, ErrorKind, Read};

use flate2::Crc;

use crate::deflate_codec::FLATE_BEST;
use crate::input::InputBuffer;

// RFC 1952 member header layout.
const MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;

const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const FRESERVED: u8 = 0xe0;

/// OS byte written by the compressor: "unknown".
pub const OS_UNKNOWN: u8 = 255;

/// Length of the header the compressor writes.
pub(crate) const HEADER_LEN: usize = 10;

/// Metadata from the header of the gzip member currently being read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GzipHeader {
    /// Modification time, seconds since the Unix epoch; 0 when absent.
    pub mtime: u32,
    pub os: u8,
    pub extra: Option<Vec<u8>>,
    /// Original file name, without the terminating zero.
    pub filename: Option<Vec<u8>>,
    pub comment: Option<Vec<u8>>,
}

/// Minimal header: no name, no mtime, unknown OS.
pub(crate) fn encode(level: u32) -> [u8; HEADER_LEN] {
    let xfl = if level >= FLATE_BEST {
        2
    } else if level <= 1 {
        4
    } else {
        0
    };
    [
        MAGIC[0],
        MAGIC[1],
        METHOD_DEFLATE,
        0,
        0,
        0,
        0,
        0,
        xfl,
        OS_UNKNOWN,
    ]
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

/// Header bytes read through the input buffer, checksummed for FHCRC.
struct HeaderSource<'a, R> {
    input: &'a mut InputBuffer,
    source: &'a mut R,
    crc: Crc,
}

impl<R: Read> HeaderSource<'_, R> {
    fn read_exact(&mut self, out: &mut [u8]) -> io::Result<()> {
        self.input.read_exact(&mut *self.source, out)?;
        self.crc.update(out);
        Ok(())
    }

    fn read_u8(&mut self) -> io::Result<u8> {
        let byte = self.input.read_u8(&mut *self.source)?;
        self.crc.update(&[byte]);
        Ok(byte)
    }

    fn read_u16_le(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_zero_terminated(&mut self) -> io::Result<Vec<u8>> {
        let mut field = Vec::new();
        loop {
            match self.read_u8()? {
                0 => return Ok(field),
                byte => field.push(byte),
            }
        }
    }
}

/// Read and validate one member header.
///
/// A source that ends before the first byte is reported as
/// `UnexpectedEof`; anything that is not a deflate-method gzip header is
/// `InvalidData`.
pub(crate) fn parse<R: Read>(input: &mut InputBuffer, source: &mut R) -> io::Result<GzipHeader> {
    let mut src = HeaderSource {
        input,
        source,
        crc: Crc::new(),
    };

    let mut fixed = [0u8; HEADER_LEN];
    src.read_exact(&mut fixed).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            io::Error::new(ErrorKind::UnexpectedEof, "source too short for a gzip header")
        } else {
            err
        }
    })?;

    if fixed[..2] != MAGIC {
        return Err(invalid("not a gzip stream: bad magic bytes"));
    }
    if fixed[2] != METHOD_DEFLATE {
        return Err(invalid("unsupported gzip compression method"));
    }
    let flags = fixed[3];
    if flags & FRESERVED != 0 {
        return Err(invalid("reserved gzip header flags set"));
    }

    let mut header = GzipHeader {
        mtime: u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]),
        os: fixed[9],
        ..GzipHeader::default()
    };

    if flags & FEXTRA != 0 {
        let len = src.read_u16_le()? as usize;
        let mut extra = vec![0u8; len];
        src.read_exact(&mut extra)?;
        header.extra = Some(extra);
    }
    if flags & FNAME != 0 {
        header.filename = Some(src.read_zero_terminated()?);
    }
    if flags & FCOMMENT != 0 {
        header.comment = Some(src.read_zero_terminated()?);
    }
    if flags & FHCRC != 0 {
        let expected = src.crc.sum() as u16;
        let mut stored = [0u8; 2];
        src.input.read_exact(&mut *src.source, &mut stored)?;
        if u16::from_le_bytes(stored) != expected {
            return Err(invalid("gzip header checksum mismatch"));
        }
    }

    Ok(header)
}
