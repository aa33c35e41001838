use std::io::Read;

use tracing::{debug, trace};

use crate::codec::Decompressor;
use crate::error::PoolError;
use crate::pool::Pool;
use crate::stats::{Counters, PoolStats};

/// Recycles decompressors of one family.
///
/// Decompressors have nothing to flush, so releasing one simply detaches it
/// and drops whatever input it had buffered. Callers read the stream to the
/// end first, then release.
pub struct ReaderPool<D: Decompressor> {
    idle: Pool<D>,
    counters: Counters,
}

impl<D: Decompressor> ReaderPool<D> {
    pub fn new() -> Self {
        Self {
            idle: Pool::new(),
            counters: Counters::default(),
        }
    }

    /// Decompressor bound to `source` with the stream header already parsed.
    ///
    /// Fails with [`PoolError::Initialization`] when `source` does not begin
    /// with a valid header, whether the instance was fresh or recycled. The
    /// failed instance is dropped; idle instances are not touched.
    pub fn acquire_reader<R: Read>(&self, source: R) -> Result<D::Reader<R>, PoolError> {
        let state = match self.take_idle() {
            Some(state) => state,
            None => {
                let state = D::new()?;
                self.counters.constructed();
                trace!(codec = D::name(), "constructed decompressor");
                state
            }
        };

        state.bind(source).map_err(|err| {
            self.counters.discarded();
            debug!(codec = D::name(), error = %err, "header rejected; decompressor dropped");
            PoolError::Initialization(err)
        })
    }

    /// Detach `reader` from its source, pool its state, and return the
    /// source unclosed.
    pub fn release_reader<R: Read>(&self, reader: D::Reader<R>) -> R {
        let (state, source) = D::finish(reader);
        self.idle.put(state);
        self.counters.released();
        trace!(codec = D::name(), "released decompressor");
        source
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.idle.idle())
    }

    /// Drop every idle decompressor.
    pub fn clear(&self) -> usize {
        let dropped = self.idle.clear();
        debug!(codec = D::name(), dropped, "cleared idle decompressors");
        dropped
    }

    fn take_idle(&self) -> Option<D> {
        while let Some(mut state) = self.idle.get() {
            match state.reset() {
                Ok(()) => {
                    self.counters.reused();
                    trace!(codec = D::name(), "reusing decompressor");
                    return Some(state);
                }
                Err(err) => {
                    self.counters.discarded();
                    debug!(codec = D::name(), error = %err, "reset failed; decompressor dropped");
                }
            }
        }
        None
    }
}

impl<D: Decompressor> Default for ReaderPool<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Decompressor> std::fmt::Debug for ReaderPool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderPool")
            .field("codec", &D::name())
            .field("stats", &self.stats())
            .finish()
    }
}
