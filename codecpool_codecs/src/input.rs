use std::io::{self, ErrorKind, Read};

/// Size of the input staging buffer owned by every pooled decompressor.
pub(crate) const INPUT_CAPACITY: usize = 32 * 1024;

/// Read-ahead buffer between a source and a decoder.
///
/// Lives inside the pooled decompressor state, so the allocation is made once
/// per instance rather than once per stream.
pub(crate) struct InputBuffer {
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
}

impl InputBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: vec![0u8; INPUT_CAPACITY].into_boxed_slice(),
            pos: 0,
            end: 0,
        }
    }

    /// Forget buffered bytes.
    pub(crate) fn clear(&mut self) {
        self.pos = 0;
        self.end = 0;
    }

    /// Buffered bytes, refilling from `source` first if none are left.
    /// An empty slice means `source` is exhausted.
    pub(crate) fn fill<R: Read>(&mut self, source: &mut R) -> io::Result<&[u8]> {
        if self.pos == self.end {
            self.pos = 0;
            self.end = read_retrying(source, &mut self.buf)?;
        }
        Ok(&self.buf[self.pos..self.end])
    }

    /// At least `n` buffered bytes without consuming them, or fewer if the
    /// source ends first.
    pub(crate) fn peek<R: Read>(&mut self, source: &mut R, n: usize) -> io::Result<&[u8]> {
        debug_assert!(n <= self.buf.len());
        if self.end - self.pos < n {
            self.buf.copy_within(self.pos..self.end, 0);
            self.end -= self.pos;
            self.pos = 0;
            while self.end < n {
                let read = read_retrying(source, &mut self.buf[self.end..])?;
                if read == 0 {
                    break;
                }
                self.end += read;
            }
        }
        Ok(&self.buf[self.pos..self.end])
    }

    pub(crate) fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.end);
    }

    /// Fill `out` completely from the buffer and then the source.
    pub(crate) fn read_exact<R: Read>(&mut self, source: &mut R, out: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            let n = {
                let avail = self.fill(source)?;
                if avail.is_empty() {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "stream ended early"));
                }
                let n = avail.len().min(out.len() - filled);
                out[filled..filled + n].copy_from_slice(&avail[..n]);
                n
            };
            self.consume(n);
            filled += n;
        }
        Ok(())
    }

    pub(crate) fn read_u8<R: Read>(&mut self, source: &mut R) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(source, &mut byte)?;
        Ok(byte[0])
    }
}

fn read_retrying<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
