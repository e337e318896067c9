//! The block-device read primitive the reader is built on.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

/// A byte-addressed, block-granular storage medium.
///
/// The reader always rounds `len` up to device-block granularity before
/// calling, and issues at most one call per logical body read (plus one for
/// a metadata header). Implementations may block on storage I/O; there is no
/// cancellation at this layer.
pub trait BlockDevice {
    /// Read exactly `len` bytes starting at byte `offset`.
    ///
    /// Returning a buffer shorter than `len` is treated as an I/O failure by
    /// the caller.
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>;
}

/// In-memory image, used by tests and by anything that already holds the
/// whole image in RAM.
///
/// Real devices are a whole number of blocks long; hand-built images often
/// are not, so a read overhanging the tail is padded with zeros rather than
/// rejected. Reads starting past the end still fail.
pub struct MemDevice {
    data: Vec<u8>,
}

impl MemDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl BlockDevice for MemDevice {
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = offset as usize;
        if start >= self.data.len() {
            return Err(Error::Io { offset, len });
        }
        let avail = (self.data.len() - start).min(len);
        let mut buf = vec![0u8; len];
        buf[..avail].copy_from_slice(&self.data[start..start + avail]);
        Ok(buf)
    }
}

/// File-backed device, used by the CLI to read image files.
pub struct FileDevice {
    file: File,
}

impl FileDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(&path).map_err(|_| Error::Io { offset: 0, len: 0 })?;
        Ok(Self { file })
    }
}

impl BlockDevice for FileDevice {
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|_| Error::Io { offset, len })?;
        // Tolerate a short tail like MemDevice: zero-fill past end of file.
        let mut filled = 0;
        while filled < len {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(Error::Io { offset, len }),
            }
        }
        if filled == 0 {
            return Err(Error::Io { offset, len });
        }
        Ok(buf)
    }
}
