use std::fmt::Debug;
use std::io::{self, Read, Write};

use crate::error::PoolError;

/// Discard every piece of session state so the instance behaves exactly like
/// one freshly constructed with the same parameters.
///
/// The pools call `reset` on every instance they take out of idle storage,
/// before binding it to the next endpoint. An error means the instance could
/// not be brought back to a clean state; the pool drops it and builds a new
/// one instead.
pub trait Resettable {
    fn reset(&mut self) -> io::Result<()>;
}

/// Endpoint-free compression state managed by a [`WriterPool`].
///
/// The value itself owns the expensive allocations (match tables, windows,
/// staging buffers). Attaching it to a sink yields [`Compressor::Writer`];
/// [`Compressor::finish`] ends the stream and hands both halves back.
///
/// [`WriterPool`]: crate::WriterPool
pub trait Compressor: Resettable + Send + Sized + 'static {
    /// Algorithm parameter fixed for the lifetime of one pool.
    type Level: Copy + Debug + Send + Sync + 'static;

    /// The compressor bound to a sink.
    type Writer<W: Write>: Write;

    /// Short family name used in logs.
    fn name() -> &'static str;

    /// Level used by pools built with [`WriterPool::best`](crate::WriterPool::best).
    fn best_level() -> Self::Level;

    /// Reject levels the algorithm does not accept.
    fn validate_level(level: Self::Level) -> Result<(), PoolError>;

    /// Build a fresh instance at `level`.
    fn new(level: Self::Level) -> io::Result<Self>;

    /// Attach a clean instance to `sink`.
    fn bind<W: Write>(self, sink: W) -> Self::Writer<W>;

    /// Flush pending output and write the stream trailer into the sink
    /// without closing it.
    fn finish<W: Write>(writer: Self::Writer<W>) -> io::Result<(Self, W)>;
}

/// Endpoint-free decompression state managed by a [`ReaderPool`].
///
/// Only codec families whose decoder resets cleanly against an arbitrary new
/// source implement this.
///
/// [`ReaderPool`]: crate::ReaderPool
pub trait Decompressor: Resettable + Send + Sized + 'static {
    /// The decompressor bound to a source.
    type Reader<R: Read>: Read;

    fn name() -> &'static str;

    fn new() -> io::Result<Self>;

    /// Attach a clean instance to `source`, reading and validating the stream
    /// header immediately. On error the instance is consumed.
    fn bind<R: Read>(self, source: R) -> io::Result<Self::Reader<R>>;

    /// Detach from the source, discarding any buffered but unread input.
    fn finish<R: Read>(reader: Self::Reader<R>) -> (Self, R);
}
