//! Block locator: turns a logical block descriptor into device-aligned read
//! parameters.
//!
//! Two granularities meet here. `index` and payload sizes are plain byte
//! quantities in the filesystem's address space; every device read must start
//! on a device-block boundary and cover a whole number of device blocks. The
//! locator resolves one logical read to exactly one aligned device read (two
//! in metadata mode, where the block's own length sits in a 2-byte header in
//! front of the payload).

use crate::error::{Error, Result};
use crate::format::{DATA_COMPRESSED_BIT, METADATA_COMPRESSED_BIT};

/// Round `n` up to the next multiple of `granularity` (a power of two).
pub const fn round_up(n: usize, granularity: usize) -> usize {
    (n + granularity - 1) & !(granularity - 1)
}

/// Device-aligned read parameters for one logical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLocation {
    /// Device-block-aligned byte offset of the read.
    pub start: u64,
    /// Offset of the payload's first byte within the first sub-block view.
    pub offset: usize,
    /// Device-rounded length of the body read. Zero when the metadata header
    /// read already covers the whole payload.
    pub read_len: usize,
    /// False when the payload is stored verbatim.
    pub compressed: bool,
    /// Un-rounded on-disk payload size. `next_index` arithmetic must use
    /// this, never `read_len`, so the next logical block starts exactly where
    /// this one's payload ends.
    pub size: usize,
}

impl BlockLocation {
    /// Number of device blocks the body read spans.
    pub fn body_blocks(&self, devblk: usize) -> usize {
        self.read_len / devblk
    }
}

/// Locate a data block from its inode-supplied length descriptor.
pub fn locate_data(
    index: u64,
    length: u32,
    devblk: usize,
    bytes_used: u64,
    capacity: usize,
) -> Result<BlockLocation> {
    let compressed = length & DATA_COMPRESSED_BIT == 0;
    let size = (length & !DATA_COMPRESSED_BIT) as usize;
    if size == 0 || size > capacity {
        return Err(Error::InvalidLength {
            length: size,
            capacity,
        });
    }
    if index + size as u64 > bytes_used {
        return Err(Error::OutOfRange { index, bytes_used });
    }
    let offset = (index % devblk as u64) as usize;
    Ok(BlockLocation {
        start: index - offset as u64,
        offset,
        read_len: round_up(size + offset, devblk),
        compressed,
        size,
    })
}

/// Device-rounded length of the header read for a metadata block at `index`.
pub fn metadata_header_read_len(index: u64, devblk: usize) -> usize {
    let offset = (index % devblk as u64) as usize;
    round_up(offset + 2, devblk)
}

/// Decode a metadata block's 2-byte length header into
/// `(compressed, payload_size)`.
///
/// A masked size of zero decodes as `METADATA_COMPRESSED_BIT` itself, the
/// squashfs convention for a maximally-sized block.
pub fn decode_metadata_header(header: u16) -> (bool, usize) {
    let compressed = header & METADATA_COMPRESSED_BIT == 0;
    let masked = header & !METADATA_COMPRESSED_BIT;
    let size = if masked == 0 {
        METADATA_COMPRESSED_BIT as usize
    } else {
        masked as usize
    };
    (compressed, size)
}

/// Locate a metadata block's body given its decoded 2-byte header.
///
/// `hdr_read_len` is the device-rounded length of the header read that
/// already happened; the payload begins at `offset + 2` inside it, and the
/// body read only covers whatever the header read did not. The subtraction
/// of `hdr_read_len` before rounding is deliberate: the header read consumed
/// the first device block's worth of space, and re-deriving the body length
/// without it shifts `next_index` by one block.
pub fn locate_metadata_body(
    index: u64,
    header: u16,
    devblk: usize,
    hdr_read_len: usize,
    bytes_used: u64,
    capacity: usize,
) -> Result<BlockLocation> {
    let (compressed, size) = decode_metadata_header(header);
    if size == 0 || size > capacity {
        return Err(Error::InvalidLength {
            length: size,
            capacity,
        });
    }
    if index + 2 + size as u64 > bytes_used {
        return Err(Error::OutOfRange { index, bytes_used });
    }
    let offset = (index % devblk as u64) as usize;
    let start = index - offset as u64;
    // Offset of the payload within the header read.
    let body_offset = offset + 2;
    let need = size + body_offset;
    let read_len = if need > hdr_read_len {
        round_up(need - hdr_read_len, devblk)
    } else {
        0
    };
    Ok(BlockLocation {
        start: start + hdr_read_len as u64,
        offset: body_offset,
        read_len,
        compressed,
        size,
    })
}
