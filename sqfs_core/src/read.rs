//! The single-read data path: locate, fetch, slice into views, expand.

use log::debug;

use crate::decompress::Decompressor;
use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::format::{compression_name, Superblock, SUPERBLOCK_SIZE};
use crate::locate::{
    locate_data, locate_metadata_body, metadata_header_read_len, round_up, BlockLocation,
};
use crate::output::PageBuffer;

/// Read-only squashfs block reader.
///
/// # Read sequence
/// 1. The locator turns `(index, length)` into one device-aligned region
///    (metadata mode first resolves the block's 2-byte length header with
///    its own aligned read).
/// 2. The device is read **once** for the whole region, however many device
///    blocks it spans.
/// 3. The buffer is sliced into device-block-strided views; no further I/O
///    or copying happens in this step.
/// 4. Compressed payloads go through the mounted codec; raw payloads are
///    scattered straight into the output pages.
///
/// Buffers and the view list are locals of [`read_data`]; every exit path,
/// including mid-sequence failures, releases them exactly once by scope
/// exit.
///
/// [`read_data`]: SqfsReader::read_data
pub struct SqfsReader<D: BlockDevice> {
    dev: D,
    devblk: usize,
    block_size: u32,
    bytes_used: u64,
    codec: Box<dyn Decompressor>,
    superblock: Option<Superblock>,
}

impl<D: BlockDevice> core::fmt::Debug for SqfsReader<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SqfsReader")
            .field("devblk", &self.devblk)
            .field("block_size", &self.block_size)
            .field("bytes_used", &self.bytes_used)
            .field("superblock", &self.superblock)
            .finish_non_exhaustive()
    }
}

impl<D: BlockDevice> SqfsReader<D> {
    /// Mount an image: read and validate the superblock, then check the
    /// provided codec against its compression id.
    ///
    /// `codec` is resolved by the caller (e.g. `sqfs_codecs::decompressor_by_id`
    /// after a first-pass superblock peek) so this crate stays codec-agnostic.
    pub fn mount(mut dev: D, devblk: usize, codec: Box<dyn Decompressor>) -> Result<Self> {
        // `devblk` can come straight from a CLI flag, so reject it as an
        // error rather than asserting.
        if !devblk.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "device block size {devblk} is not a power of two"
            )));
        }
        let buf = dev.read(0, round_up(SUPERBLOCK_SIZE, devblk))?;
        let sb = Superblock::from_bytes(&buf)?;
        if sb.compression != codec.id() {
            return Err(Error::BadSuperblock(format!(
                "image uses {} (id {}) but the {} codec (id {}) was supplied",
                compression_name(sb.compression),
                sb.compression,
                codec.name(),
                codec.id()
            )));
        }
        debug!(
            "mounted: block_size={} compression={} bytes_used={}",
            sb.block_size,
            codec.name(),
            sb.bytes_used
        );
        Ok(Self {
            dev,
            devblk,
            block_size: sb.block_size,
            bytes_used: sb.bytes_used,
            codec,
            superblock: Some(sb),
        })
    }

    /// Construct from already-known parameters, skipping superblock parsing.
    /// Used by tests and by callers that probed the image themselves.
    pub fn from_parts(
        dev: D,
        devblk: usize,
        block_size: u32,
        bytes_used: u64,
        codec: Box<dyn Decompressor>,
    ) -> Self {
        assert!(devblk.is_power_of_two(), "devblk must be a power of two");
        Self {
            dev,
            devblk,
            block_size,
            bytes_used,
            codec,
            superblock: None,
        }
    }

    pub fn devblk_size(&self) -> usize {
        self.devblk
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn bytes_used(&self) -> u64 {
        self.bytes_used
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// The mounted superblock, when this reader came from [`mount`].
    ///
    /// [`mount`]: SqfsReader::mount
    pub fn superblock(&self) -> Option<&Superblock> {
        self.superblock.as_ref()
    }

    /// Read one logical block into `out`, returning the byte count written.
    ///
    /// `length` is the inode-supplied descriptor for a data block, or `0`
    /// for a metadata block whose size sits in a 2-byte header at `index`.
    /// When `next_index` is supplied it receives the byte offset where the
    /// following logical block starts, computed from the un-rounded payload
    /// size.
    pub fn read_data(
        &mut self,
        index: u64,
        length: u32,
        next_index: Option<&mut u64>,
        out: &mut PageBuffer,
    ) -> Result<usize> {
        let devblk = self.devblk;
        let capacity = out.capacity();

        let (header_buf, loc) = if length != 0 {
            let loc = locate_data(index, length, devblk, self.bytes_used, capacity)?;
            if let Some(next) = next_index {
                *next = index + loc.size as u64;
            }
            (None, loc)
        } else {
            let (hbuf, loc) = self.read_metadata_header(index, capacity)?;
            if let Some(next) = next_index {
                *next = index + loc.size as u64 + 2;
            }
            (Some(hbuf), loc)
        };

        // One device read covers every remaining device block of the
        // payload, however many it spans.
        let body = if loc.read_len > 0 {
            Some(self.devread(loc.start, loc.read_len)?)
        } else {
            None
        };

        let views = derive_views(header_buf.as_deref(), body.as_deref(), devblk);
        debug!(
            "read_data: index={} size={} compressed={} views={} offset={}",
            index,
            loc.size,
            loc.compressed,
            views.len(),
            loc.offset
        );

        if loc.compressed {
            self.codec.decompress(&views, loc.offset, loc.size, out)
        } else {
            scatter(&views, loc.offset, loc.size, out)
        }
    }

    /// Metadata mode: fetch the device-rounded region holding the 2-byte
    /// length header, decode it, and locate the body. Validation happens
    /// here, before any body read.
    fn read_metadata_header(
        &mut self,
        index: u64,
        capacity: usize,
    ) -> Result<(Vec<u8>, BlockLocation)> {
        if index + 2 > self.bytes_used {
            return Err(Error::OutOfRange {
                index,
                bytes_used: self.bytes_used,
            });
        }
        let offset = (index % self.devblk as u64) as usize;
        let hdr_read = metadata_header_read_len(index, self.devblk);
        let hbuf = self.devread(index - offset as u64, hdr_read)?;
        let header = u16::from_le_bytes([hbuf[offset], hbuf[offset + 1]]);
        let loc = locate_metadata_body(
            index,
            header,
            self.devblk,
            hdr_read,
            self.bytes_used,
            capacity,
        )?;
        Ok((hbuf, loc))
    }

    /// Single device read with the exact-length contract enforced.
    fn devread(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        debug_assert_eq!(len % self.devblk, 0, "unaligned device read");
        let buf = self.dev.read(offset, len)?;
        if buf.len() < len {
            return Err(Error::Io { offset, len });
        }
        Ok(buf)
    }
}

/// Slice the raw buffer(s) into the sub-block view list.
///
/// Data mode: one view per device block of the body. Metadata mode: slot 0
/// is the whole header read, followed by the body's device blocks. Pure
/// pointer arithmetic; the final view covers a full device block even when
/// only partially consumed.
fn derive_views<'a>(
    header: Option<&'a [u8]>,
    body: Option<&'a [u8]>,
    devblk: usize,
) -> Vec<&'a [u8]> {
    let blocks = body.map_or(0, |b| b.len() / devblk);
    let mut views = Vec::with_capacity(blocks + 1);
    if let Some(h) = header {
        views.push(h);
    }
    if let Some(b) = body {
        views.extend(b.chunks(devblk));
    }
    views
}

/// Uncompressed path: copy `size` payload bytes out of the views into the
/// page buffer, zeroing the within-view offset after the first copy.
fn scatter(views: &[&[u8]], mut offset: usize, size: usize, out: &mut PageBuffer) -> Result<usize> {
    let mut remaining = size;
    for view in views {
        if remaining == 0 {
            break;
        }
        if offset >= view.len() {
            offset -= view.len();
            continue;
        }
        let take = (view.len() - offset).min(remaining);
        out.put(&view[offset..offset + take])?;
        remaining -= take;
        offset = 0;
    }
    // The locator sized the views to cover the payload.
    debug_assert_eq!(remaining, 0, "views shorter than declared payload");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_views_counts_body_blocks() {
        let body = vec![0u8; 4 * 512];
        let views = derive_views(None, Some(&body), 512);
        assert_eq!(views.len(), 4);
        assert!(views.iter().all(|v| v.len() == 512));
    }

    #[test]
    fn derive_views_metadata_head_slot() {
        let header = vec![0u8; 512];
        let body = vec![0u8; 2 * 512];
        let views = derive_views(Some(&header), Some(&body), 512);
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].len(), 512);
    }

    #[test]
    fn scatter_respects_offset_and_size() {
        let a: Vec<u8> = (0..8).collect();
        let b: Vec<u8> = (8..16).collect();
        let views = [a.as_slice(), b.as_slice()];
        let mut out = PageBuffer::new(4, 16);
        let n = scatter(&views, 3, 10, &mut out).unwrap();
        assert_eq!(n, 10);
        assert_eq!(out.to_vec(), (3..13).collect::<Vec<u8>>());
    }

    #[test]
    fn scatter_skips_fully_consumed_first_view() {
        let a: Vec<u8> = (0..4).collect();
        let b: Vec<u8> = (4..8).collect();
        let views = [a.as_slice(), b.as_slice()];
        let mut out = PageBuffer::new(4, 8);
        scatter(&views, 4, 3, &mut out).unwrap();
        assert_eq!(out.to_vec(), vec![4, 5, 6]);
    }
}
