use std::io::{self, Write};

use tracing::{debug, trace};

use crate::codec::Compressor;
use crate::error::PoolError;
use crate::pool::Pool;
use crate::stats::{Counters, PoolStats};

/// Recycles compressors of one family at one fixed level.
///
/// # Protocol
/// 1. [`acquire_writer`] hands out a compressor bound to the caller's sink:
///    an idle instance after [`reset`], or a new one when the pool is empty.
/// 2. The caller writes through it.
/// 3. [`release_writer`] finalizes the stream (pending output and trailer go
///    to the sink, the sink itself stays open), stores the detached state for
///    the next caller, and gives the sink back.
///
/// Output is byte-identical whether the instance was fresh or recycled.
/// A writer dropped without being released is simply lost: its stream is
/// left unterminated and its state never returns to the pool.
///
/// [`acquire_writer`]: WriterPool::acquire_writer
/// [`release_writer`]: WriterPool::release_writer
/// [`reset`]: crate::Resettable::reset
pub struct WriterPool<C: Compressor> {
    level: C::Level,
    idle: Pool<C>,
    counters: Counters,
}

impl<C: Compressor> WriterPool<C> {
    /// Pool at `level`.
    ///
    /// The level is validated here and one instance is built straight away,
    /// so a level the codec rejects is a [`PoolError::Configuration`] now
    /// rather than a failure on some later acquisition. That first instance
    /// becomes the pool's first idle member.
    pub fn new(level: C::Level) -> Result<Self, PoolError> {
        C::validate_level(level)?;
        let first = C::new(level).map_err(|err| {
            PoolError::Configuration(format!("{} rejected level {:?}: {}", C::name(), level, err))
        })?;

        let pool = Self::unprimed(level);
        pool.counters.constructed();
        pool.idle.put(first);
        Ok(pool)
    }

    /// Pool at the family's best-compression level. Nothing is built until
    /// the first acquisition.
    pub fn best() -> Self {
        Self::unprimed(C::best_level())
    }

    fn unprimed(level: C::Level) -> Self {
        Self {
            level,
            idle: Pool::new(),
            counters: Counters::default(),
        }
    }

    pub fn level(&self) -> C::Level {
        self.level
    }

    /// Compressor bound to `sink`, ready for writes.
    ///
    /// Reuse never fails. The only error is [`PoolError::Io`] when the pool
    /// is empty and the codec library cannot allocate a new context.
    pub fn acquire_writer<W: Write>(&self, sink: W) -> Result<C::Writer<W>, PoolError> {
        let state = match self.take_idle() {
            Some(state) => state,
            None => {
                let state = C::new(self.level)?;
                self.counters.constructed();
                trace!(codec = C::name(), level = ?self.level, "constructed compressor");
                state
            }
        };
        Ok(state.bind(sink))
    }

    /// Finalize `writer` and return its state to the pool.
    ///
    /// Buffered output and the stream trailer are written to the sink, which
    /// is then flushed and handed back open. If any of that fails the error is
    /// returned and the state is dropped instead of pooled.
    pub fn release_writer<W: Write>(&self, writer: C::Writer<W>) -> io::Result<W> {
        match C::finish(writer) {
            Ok((state, sink)) => {
                self.idle.put(state);
                self.counters.released();
                trace!(codec = C::name(), "released compressor");
                Ok(sink)
            }
            Err(err) => {
                self.counters.discarded();
                debug!(codec = C::name(), error = %err, "finalize failed; compressor dropped");
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.idle.idle())
    }

    /// Drop every idle compressor. Checked-out writers are unaffected.
    pub fn clear(&self) -> usize {
        let dropped = self.idle.clear();
        debug!(codec = C::name(), dropped, "cleared idle compressors");
        dropped
    }

    fn take_idle(&self) -> Option<C> {
        while let Some(mut state) = self.idle.get() {
            match state.reset() {
                Ok(()) => {
                    self.counters.reused();
                    trace!(codec = C::name(), "reusing compressor");
                    return Some(state);
                }
                Err(err) => {
                    self.counters.discarded();
                    debug!(codec = C::name(), error = %err, "reset failed; compressor dropped");
                }
            }
        }
        None
    }
}

impl<C: Compressor> std::fmt::Debug for WriterPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterPool")
            .field("codec", &C::name())
            .field("level", &self.level)
            .field("stats", &self.stats())
            .finish()
    }
}
