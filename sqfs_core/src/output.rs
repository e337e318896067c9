//! Page-structured output buffer the read path scatters into.

use std::io;

use crate::error::{Error, Result};

/// Caller-supplied destination for one logical block's decompressed bytes.
///
/// Storage is a run of fixed-size pages with a single write cursor; both the
/// uncompressed scatter path and the decompressors append through [`put`],
/// wrapping to the next page whenever one fills. Capacity is a byte limit
/// independent of the page grid — the last page may be only partially
/// writable.
///
/// [`put`]: PageBuffer::put
pub struct PageBuffer {
    pages: Vec<Box<[u8]>>,
    page_size: usize,
    capacity: usize,
    /// Cursor: page number and offset within it.
    page: usize,
    offset: usize,
}

impl PageBuffer {
    /// Allocate `ceil(capacity / page_size)` zeroed pages.
    pub fn new(page_size: usize, capacity: usize) -> Self {
        assert!(page_size > 0, "page_size must be non-zero");
        let count = capacity.div_ceil(page_size);
        Self {
            pages: (0..count)
                .map(|_| vec![0u8; page_size].into_boxed_slice())
                .collect(),
            page_size,
            capacity,
            page: 0,
            offset: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far.
    pub fn written(&self) -> usize {
        self.page * self.page_size + self.offset
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.written()
    }

    /// Rewind the cursor without touching page contents.
    pub fn reset(&mut self) {
        self.page = 0;
        self.offset = 0;
    }

    /// Append `data` at the cursor, wrapping across pages.
    ///
    /// Fails when `data` does not fit in the remaining capacity; the cursor
    /// is left where the overflow was detected.
    pub fn put(&mut self, mut data: &[u8]) -> Result<()> {
        if data.len() > self.remaining() {
            return Err(Error::InvalidLength {
                length: self.written() + data.len(),
                capacity: self.capacity,
            });
        }
        while !data.is_empty() {
            if self.offset == self.page_size {
                self.page += 1;
                self.offset = 0;
            }
            let room = self.page_size - self.offset;
            let take = room.min(data.len());
            self.pages[self.page][self.offset..self.offset + take]
                .copy_from_slice(&data[..take]);
            self.offset += take;
            data = &data[take..];
        }
        Ok(())
    }

    /// Borrow page `i`.
    pub fn page(&self, i: usize) -> &[u8] {
        &self.pages[i]
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Copy the written bytes out as one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.written());
        let mut left = self.written();
        for page in &self.pages {
            if left == 0 {
                break;
            }
            let take = left.min(page.len());
            out.extend_from_slice(&page[..take]);
            left -= take;
        }
        out
    }
}

/// Streaming decompressors drive the buffer through `io::Write`.
impl io::Write for PageBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.put(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
