//! Codec abstraction for the read path.

use std::io::{self, Read};

use crate::error::Result;
use crate::output::PageBuffer;

/// Core decompression abstraction.
///
/// One implementation is selected at mount time from the superblock's
/// compression id and owned by the reader; `&mut self` carries whatever
/// stream state the codec needs, so there is no process-wide state.
///
/// `views` are borrowed, device-block-strided slices into buffers owned by
/// the caller — an implementation must never stash them past its own return.
/// The payload is `length` logical bytes starting at `offset` into
/// `views[0]` and running contiguously through the remaining views; an
/// implementation must consume exactly that much input or fail, and writes
/// its output through the page buffer's cursor.
pub trait Decompressor {
    /// Stable compression id as stored in the superblock.
    fn id(&self) -> u16;

    /// Human-readable codec name for logs and CLI display.
    fn name(&self) -> &'static str;

    /// Expand one block, returning the decompressed byte count.
    fn decompress(
        &mut self,
        views: &[&[u8]],
        offset: usize,
        length: usize,
        out: &mut PageBuffer,
    ) -> Result<usize>;
}

/// `io::Read` over a sub-block view list.
///
/// Presents `length` bytes starting at `offset` into `views[0]` as one
/// contiguous stream, letting the streaming codec crates consume the view
/// list without a gather copy.
pub struct ViewReader<'a> {
    views: &'a [&'a [u8]],
    view: usize,
    offset: usize,
    remaining: usize,
}

impl<'a> ViewReader<'a> {
    pub fn new(views: &'a [&'a [u8]], offset: usize, length: usize) -> Self {
        Self {
            views,
            view: 0,
            offset,
            remaining: length,
        }
    }

    /// Logical payload bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Read for ViewReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        // Skip exhausted views. The starting offset may equal or exceed the
        // first view's length when a metadata header read ends exactly on a
        // block boundary.
        while self.view < self.views.len() && self.offset >= self.views[self.view].len() {
            self.offset -= self.views[self.view].len();
            self.view += 1;
        }
        if self.view == self.views.len() {
            // Declared length ran past the views: premature end of input.
            return Ok(0);
        }
        let cur = &self.views[self.view][self.offset..];
        let take = cur.len().min(buf.len()).min(self.remaining);
        buf[..take].copy_from_slice(&cur[..take]);
        self.offset += take;
        self.remaining -= take;
        Ok(take)
    }
}
