use std::io::Read;

use sqfs_core::format::LZ4_COMPRESSION;
use sqfs_core::{Decompressor, Error, PageBuffer, Result, ViewReader};

/// LZ4 block-format codec (squashfs stores bare LZ4 blocks, no frame).
///
/// `lz4_flex`'s block decoder needs the input contiguous, so the views are
/// gathered into one bounce buffer first — the only codec that cannot stream
/// straight off the view list.
pub struct Lz4;

impl Decompressor for Lz4 {
    fn id(&self) -> u16 {
        LZ4_COMPRESSION
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn decompress(
        &mut self,
        views: &[&[u8]],
        offset: usize,
        length: usize,
        out: &mut PageBuffer,
    ) -> Result<usize> {
        let mut input = Vec::with_capacity(length);
        ViewReader::new(views, offset, length)
            .read_to_end(&mut input)
            .map_err(|e| Error::codec("lz4", e))?;
        if input.len() != length {
            return Err(Error::codec(
                "lz4",
                format!("premature end of input: {} of {length} bytes", input.len()),
            ));
        }
        let raw = lz4_flex::block::decompress(&input, out.remaining())
            .map_err(|e| Error::codec("lz4", e))?;
        out.put(&raw)?;
        Ok(raw.len())
    }
}
