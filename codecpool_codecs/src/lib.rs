mod deflate_codec;
mod gzip_codec;
mod gzip_header;
mod input;
mod registry;
mod zstd_codec;

pub use deflate_codec::{DeflateCompressor, DeflateWriter, FLATE_BEST};
pub use gzip_codec::{GzipCompressor, GzipDecompressor, GzipReader, GzipWriter};
pub use gzip_header::{GzipHeader, OS_UNKNOWN};
pub use registry::{PoolRegistry, RegistryConfig};
pub use zstd_codec::{ZstdCompressor, ZstdDecompressor, ZstdReader, ZstdWriter, ZSTD_BEST};

use codecpool_core::PoolError;

/// Codec families with pooled writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Deflate,
    Gzip,
    Zstd,
}

impl Family {
    pub fn name(self) -> &'static str {
        match self {
            Family::Deflate => "deflate",
            Family::Gzip => "gzip",
            Family::Zstd => "zstd",
        }
    }

    /// Whether the family also has a pooled reader.
    pub fn has_reader_pool(self) -> bool {
        !matches!(self, Family::Deflate)
    }
}

/// Resolve a family from its name, accepting the short aliases the CLI uses.
pub fn family_by_name(name: &str) -> Result<Family, PoolError> {
    match name {
        "deflate" | "flate" => Ok(Family::Deflate),
        "gzip" | "gz" => Ok(Family::Gzip),
        "zstd" | "zst" | "z" => Ok(Family::Zstd),
        other => Err(PoolError::Configuration(format!(
            "unknown codec '{other}'; supported: deflate, gzip, zstd"
        ))),
    }
}
