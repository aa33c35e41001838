use std::io;

use thiserror::Error;

/// Errors surfaced by pool construction and acquisition.
///
/// Stream-level failures (corrupt input, a sink that refuses bytes) are
/// reported through `std::io::Error` by the bound readers and writers
/// themselves; this type only covers the pool boundary.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool's fixed algorithm parameter is invalid. Only returned while
    /// building a pool or registry, never per call.
    #[error("invalid pool configuration: {0}")]
    Configuration(String),

    /// The source handed to a reader acquisition does not start with a valid
    /// stream header (or is empty). The instance that tried to bind has been
    /// dropped; nothing needs to be released.
    #[error("stream header rejected: {0}")]
    Initialization(#[source] io::Error),

    /// The codec library could not build a new instance.
    #[error("codec construction failed: {0}")]
    Io(#[from] io::Error),
}
