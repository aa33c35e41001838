pub mod codec;
pub mod error;
pub mod pool;
pub mod reader_pool;
pub mod stats;
pub mod writer_pool;

pub use codec::{Compressor, Decompressor, Resettable};
pub use error::PoolError;
pub use pool::Pool;
pub use reader_pool::ReaderPool;
pub use stats::PoolStats;
pub use writer_pool::WriterPool;
