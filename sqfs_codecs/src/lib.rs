mod lz4_codec;
mod raw;
mod zlib_codec;
mod zstd_codec;

pub use lz4_codec::Lz4;
pub use raw::RawCopy;
pub use zlib_codec::Zlib;
pub use zstd_codec::Zstd;

use sqfs_core::format::{LZ4_COMPRESSION, ZLIB_COMPRESSION, ZSTD_COMPRESSION};
use sqfs_core::{Decompressor, Error, Result};

/// Resolve a decompressor from the superblock's on-disk compression id.
///
/// Called once at mount time; lzma/lzo/xz ids are recognised on disk but not
/// bundled, so they surface as [`Error::UnknownCodec`] like any other
/// unsupported id.
pub fn decompressor_by_id(id: u16) -> Result<Box<dyn Decompressor>> {
    match id {
        ZLIB_COMPRESSION => Ok(Box::new(Zlib)),
        LZ4_COMPRESSION => Ok(Box::new(Lz4)),
        ZSTD_COMPRESSION => Ok(Box::new(Zstd)),
        other => Err(Error::UnknownCodec(other)),
    }
}
