//! On-disk constants and the superblock, bit-compatible with squashfs 4.0.

use crate::error::{Error, Result};

/// Squashfs magic, "hsqs" little-endian.
pub const SQUASHFS_MAGIC: u32 = 0x7371_7368;

/// Full on-disk superblock size in bytes. Only the first 48 bytes are
/// decoded here; the table-start offsets that follow belong to the
/// metadata layers above this crate.
pub const SUPERBLOCK_SIZE: usize = 96;

/// Maximum decompressed payload of one metadata block.
pub const METADATA_SIZE: usize = 8192;

/// Top bit of a metadata block's 2-byte length header.
/// Set means the block is stored uncompressed.
pub const METADATA_COMPRESSED_BIT: u16 = 1 << 15;

/// Bit 24 of a data block's length descriptor.
/// Set means the block is stored uncompressed; the low 24 bits carry the
/// on-disk payload size either way.
pub const DATA_COMPRESSED_BIT: u32 = 1 << 24;

/// Default granularity of device reads, in bytes.
pub const DEFAULT_DEVBLK_SIZE: usize = 1024;

// ── Compression ids (superblock `compression` field) ───────────────────────

pub const ZLIB_COMPRESSION: u16 = 1;
pub const LZMA_COMPRESSION: u16 = 2;
pub const LZO_COMPRESSION: u16 = 3;
pub const XZ_COMPRESSION: u16 = 4;
pub const LZ4_COMPRESSION: u16 = 5;
pub const ZSTD_COMPRESSION: u16 = 6;

// ── Superblock ──────────────────────────────────────────────────────────────

/// Decoded prefix of the squashfs superblock.
#[derive(Debug, Clone)]
pub struct Superblock {
    pub inode_count: u32,
    pub mod_time: u32,
    /// Filesystem data-block size; also the upper bound on any decompressed
    /// block, which makes it the natural output-buffer capacity.
    pub block_size: u32,
    pub frag_count: u32,
    pub compression: u16,
    pub block_log: u16,
    pub flags: u16,
    pub id_count: u16,
    pub ver_major: u16,
    pub ver_minor: u16,
    pub root_inode: u64,
    /// Total bytes of the image that hold filesystem data. Reads must never
    /// extend past this, even when the backing device is larger.
    pub bytes_used: u64,
}

impl Superblock {
    /// Decode from at least the first 48 bytes of the image.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 48 {
            return Err(Error::BadSuperblock(format!(
                "image too small for a superblock ({} bytes)",
                buf.len()
            )));
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != SQUASHFS_MAGIC {
            return Err(Error::BadSuperblock(format!(
                "wrong magic 0x{magic:08x} — not a squashfs image"
            )));
        }
        let sb = Self {
            inode_count: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            mod_time: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            block_size: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            frag_count: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            compression: u16::from_le_bytes(buf[20..22].try_into().unwrap()),
            block_log: u16::from_le_bytes(buf[22..24].try_into().unwrap()),
            flags: u16::from_le_bytes(buf[24..26].try_into().unwrap()),
            id_count: u16::from_le_bytes(buf[26..28].try_into().unwrap()),
            ver_major: u16::from_le_bytes(buf[28..30].try_into().unwrap()),
            ver_minor: u16::from_le_bytes(buf[30..32].try_into().unwrap()),
            root_inode: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            bytes_used: u64::from_le_bytes(buf[40..48].try_into().unwrap()),
        };
        sb.validate()?;
        Ok(sb)
    }

    /// Serialize to exactly `SUPERBLOCK_SIZE` bytes (tail zeroed).
    pub fn to_bytes(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        buf[0..4].copy_from_slice(&SQUASHFS_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&self.inode_count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.mod_time.to_le_bytes());
        buf[12..16].copy_from_slice(&self.block_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.frag_count.to_le_bytes());
        buf[20..22].copy_from_slice(&self.compression.to_le_bytes());
        buf[22..24].copy_from_slice(&self.block_log.to_le_bytes());
        buf[24..26].copy_from_slice(&self.flags.to_le_bytes());
        buf[26..28].copy_from_slice(&self.id_count.to_le_bytes());
        buf[28..30].copy_from_slice(&self.ver_major.to_le_bytes());
        buf[30..32].copy_from_slice(&self.ver_minor.to_le_bytes());
        buf[32..40].copy_from_slice(&self.root_inode.to_le_bytes());
        buf[40..48].copy_from_slice(&self.bytes_used.to_le_bytes());
        buf
    }

    fn validate(&self) -> Result<()> {
        if self.ver_major != 4 || self.ver_minor != 0 {
            return Err(Error::BadSuperblock(format!(
                "unsupported version {}.{} (only 4.0 is supported)",
                self.ver_major, self.ver_minor
            )));
        }
        if self.block_log > 20 || (1u32 << self.block_log) != self.block_size {
            return Err(Error::BadSuperblock(format!(
                "block_size {} does not match block_log {}",
                self.block_size, self.block_log
            )));
        }
        if self.block_size < 4096 {
            return Err(Error::BadSuperblock(format!(
                "block_size {} below the 4 KB minimum",
                self.block_size
            )));
        }
        if self.bytes_used as usize <= SUPERBLOCK_SIZE {
            return Err(Error::BadSuperblock(format!(
                "bytes_used {} leaves no room past the superblock",
                self.bytes_used
            )));
        }
        Ok(())
    }
}

/// Human-readable name of a superblock compression id.
pub fn compression_name(id: u16) -> &'static str {
    match id {
        ZLIB_COMPRESSION => "zlib",
        LZMA_COMPRESSION => "lzma",
        LZO_COMPRESSION => "lzo",
        XZ_COMPRESSION => "xz",
        LZ4_COMPRESSION => "lz4",
        ZSTD_COMPRESSION => "zstd",
        _ => "unknown",
    }
}
