use std::io;

use flate2::read::ZlibDecoder;

use sqfs_core::format::ZLIB_COMPRESSION;
use sqfs_core::{Decompressor, Error, PageBuffer, Result, ViewReader};

/// Zlib (deflate with zlib framing), squashfs's default codec.
pub struct Zlib;

impl Decompressor for Zlib {
    fn id(&self) -> u16 {
        ZLIB_COMPRESSION
    }

    fn name(&self) -> &'static str {
        "zlib"
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
        let mut decoder = ZlibDecoder::new(reader);
        io::copy(&mut decoder, out).map_err(|e| Error::codec("zlib", e))?;
        // The stream must account for the whole declared payload; a short
        // consume means the block boundary and the zlib stream disagree.
        let consumed = decoder.total_in() as usize;
        if consumed != length {
            return Err(Error::codec(
                "zlib",
                format!("stream ended after {consumed} of {length} input bytes"),
            ));
        }
        Ok(out.written() - before)
    }
}
