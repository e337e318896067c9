use std::io;

use sqfs_core::format::ZSTD_COMPRESSION;
use sqfs_core::{Decompressor, Error, PageBuffer, Result, ViewReader};

/// Zstandard codec. Each block is one self-terminating zstd frame, decoded
/// by streaming straight off the view list.
pub struct Zstd;

impl Decompressor for Zstd {
    fn id(&self) -> u16 {
        ZSTD_COMPRESSION
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn decompress(
        &mut self,
        views: &[&[u8]],
        offset: usize,
        length: usize,
        out: &mut PageBuffer,
    ) -> Result<usize> {
        let before = out.written();
        let reader = ViewReader::new(views, offset, length);
        let mut decoder =
            zstd::stream::read::Decoder::new(reader).map_err(|e| Error::codec("zstd", e))?;
        io::copy(&mut decoder, out).map_err(|e| Error::codec("zstd", e))?;
        Ok(out.written() - before)
    }
}
