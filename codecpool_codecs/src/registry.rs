use std::sync::OnceLock;

use codecpool_core::{PoolError, ReaderPool, WriterPool};
use tracing::debug;

use crate::deflate_codec::{DeflateCompressor, FLATE_BEST};
use crate::gzip_codec::{GzipCompressor, GzipDecompressor};
use crate::zstd_codec::{ZstdCompressor, ZstdDecompressor, ZSTD_BEST};

/// Compression level for each writer pool in a [`PoolRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub deflate_level: u32,
    pub gzip_level: u32,
    pub zstd_level: i32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            deflate_level: FLATE_BEST,
            gzip_level: FLATE_BEST,
            zstd_level: ZSTD_BEST,
        }
    }
}

/// Every codec pool the process uses, in one value.
///
/// Build one explicitly with [`new`](PoolRegistry::new) or
/// [`with_config`](PoolRegistry::with_config), or share the process-wide
/// instance from [`global`](PoolRegistry::global). All pools are safe to use
/// from any number of threads at once.
///
/// Raw deflate has no reader pool; see [`DeflateCompressor`].
#[derive(Debug)]
pub struct PoolRegistry {
    deflate_writers: WriterPool<DeflateCompressor>,
    gzip_writers: WriterPool<GzipCompressor>,
    gzip_readers: ReaderPool<GzipDecompressor>,
    zstd_writers: WriterPool<ZstdCompressor>,
    zstd_readers: ReaderPool<ZstdDecompressor>,
}

static GLOBAL: OnceLock<PoolRegistry> = OnceLock::new();

impl PoolRegistry {
    /// Registry with every writer pool at its best-compression level.
    pub fn new() -> Self {
        Self {
            deflate_writers: WriterPool::best(),
            gzip_writers: WriterPool::best(),
            gzip_readers: ReaderPool::new(),
            zstd_writers: WriterPool::best(),
            zstd_readers: ReaderPool::new(),
        }
    }

    /// Registry with explicit levels. Every level is validated here.
    pub fn with_config(config: &RegistryConfig) -> Result<Self, PoolError> {
        Ok(Self {
            deflate_writers: WriterPool::new(config.deflate_level)?,
            gzip_writers: WriterPool::new(config.gzip_level)?,
            gzip_readers: ReaderPool::new(),
            zstd_writers: WriterPool::new(config.zstd_level)?,
            zstd_readers: ReaderPool::new(),
        })
    }

    /// The process-wide registry, built on first use at best levels and never
    /// torn down.
    pub fn global() -> &'static PoolRegistry {
        GLOBAL.get_or_init(|| {
            debug!("initializing global codec pool registry");
            PoolRegistry::new()
        })
    }

    pub fn deflate_writers(&self) -> &WriterPool<DeflateCompressor> {
        &self.deflate_writers
    }

    pub fn gzip_writers(&self) -> &WriterPool<GzipCompressor> {
        &self.gzip_writers
    }

    pub fn gzip_readers(&self) -> &ReaderPool<GzipDecompressor> {
        &self.gzip_readers
    }

    pub fn zstd_writers(&self) -> &WriterPool<ZstdCompressor> {
        &self.zstd_writers
    }

    pub fn zstd_readers(&self) -> &ReaderPool<ZstdDecompressor> {
        &self.zstd_readers
    }

    /// Drop every idle instance in every pool, returning how many went.
    pub fn clear(&self) -> usize {
        self.deflate_writers.clear()
            + self.gzip_writers.clear()
            + self.gzip_readers.clear()
            + self.zstd_writers.clear()
            + self.zstd_readers.clear()
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
