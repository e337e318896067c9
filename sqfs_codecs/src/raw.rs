use std::io::Read;

use sqfs_core::{Decompressor, Error, PageBuffer, Result, ViewReader};

/// No-op codec: copies the payload verbatim out of the views.
///
/// Not an on-disk compression id; used to exercise the view/page plumbing
/// independently of any real algorithm.
pub struct RawCopy;

impl Decompressor for RawCopy {
    fn id(&self) -> u16 {
        0
    }

    fn name(&self) -> &'static str {
        "raw"
    }

    fn decompress(
        &mut self,
        views: &[&[u8]],
        offset: usize,
        length: usize,
        out: &mut PageBuffer,
    ) -> Result<usize> {
        let mut reader = ViewReader::new(views, offset, length);
        let mut chunk = [0u8; 4096];
        let mut copied = 0;
        loop {
            let n = reader
                .read(&mut chunk)
                .map_err(|e| Error::codec("raw", e))?;
            if n == 0 {
                break;
            }
            out.put(&chunk[..n])?;
            copied += n;
        }
        if copied != length {
            return Err(Error::codec(
                "raw",
                format!("premature end of input: {copied} of {length} bytes"),
            ));
        }
        Ok(copied)
    }
}
