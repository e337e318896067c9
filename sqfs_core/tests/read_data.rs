//! End-to-end tests for the single-read data path.
//!
//! Images are built by hand: a payload is planted at a chosen byte offset in
//! an in-memory device, and an instrumented device wrapper counts how many
//! read calls the path actually issues — the batched-read guarantee is the
//! point of this design, so it is asserted directly.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqfs_codecs::{RawCopy, Zlib};
use sqfs_core::format::{
    DATA_COMPRESSED_BIT, METADATA_COMPRESSED_BIT, METADATA_SIZE, ZLIB_COMPRESSION,
};
use sqfs_core::{BlockDevice, Error, MemDevice, PageBuffer, Result, SqfsReader, Superblock};

const DEVBLK: usize = 1024;

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Plant `payload` at byte `index` of a fresh image; everything else is a
/// recognizable filler byte so scatter gaps/overlaps would show up.
fn image_with(index: u64, payload: &[u8]) -> Vec<u8> {
    let mut image = vec![0xEEu8; index as usize + payload.len()];
    image[index as usize..].copy_from_slice(payload);
    image
}

fn zlib_compress(raw: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(raw).unwrap();
    enc.finish().unwrap()
}

// ── Instrumented devices ────────────────────────────────────────────────────

struct CountingDevice {
    inner: MemDevice,
    reads: Arc<AtomicUsize>,
}

impl CountingDevice {
    fn new(image: Vec<u8>) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner: MemDevice::new(image),
                reads: reads.clone(),
            },
            reads,
        )
    }
}

impl BlockDevice for CountingDevice {
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        assert_eq!(len % DEVBLK, 0, "device read not block-granular");
        assert_eq!(offset % DEVBLK as u64, 0, "device read not block-aligned");
        self.inner.read(offset, len)
    }
}

struct FailingDevice;

impl BlockDevice for FailingDevice {
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        Err(Error::Io { offset, len })
    }
}

/// Fails the first `failures` read calls, then behaves like the backing
/// image — models a device that comes back after a transient error.
struct FlakyDevice {
    inner: MemDevice,
    failures: usize,
}

impl BlockDevice for FlakyDevice {
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(Error::Io { offset, len });
        }
        self.inner.read(offset, len)
    }
}

// ── Data blocks ─────────────────────────────────────────────────────────────

#[test]
fn data_block_uses_exactly_one_device_read() {
    // 40 device blocks' worth of payload at an unaligned offset: still one
    // read call.
    let payload = pseudo_random_bytes(40 * DEVBLK + 17, 1);
    let index = 3 * DEVBLK as u64 + 700;
    let (dev, reads) = CountingDevice::new(image_with(index, &payload));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, 1 << 17);
    let n = reader
        .read_data(index, payload.len() as u32, None, &mut out)
        .unwrap();
    assert_eq!(n, payload.len());
    assert_eq!(out.to_vec(), payload);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn data_block_next_index_uses_unrounded_size() {
    let payload = pseudo_random_bytes(1500, 2);
    let index = 2048;
    let (dev, _) = CountingDevice::new(image_with(index, &payload));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, 1 << 17);
    let mut next = 0u64;
    reader
        .read_data(index, 1500, Some(&mut next), &mut out)
        .unwrap();
    assert_eq!(next, index + 1500);
}

#[test]
fn uncompressed_scatter_is_byte_exact() {
    // Output smaller than one page, input spanning two device blocks with a
    // non-zero within-block offset.
    let payload = pseudo_random_bytes(1500, 3);
    let index = 4096 + 800;
    let (dev, reads) = CountingDevice::new(image_with(index, &payload));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, 1500);
    let n = reader
        .read_data(index, DATA_COMPRESSED_BIT | 1500, None, &mut out)
        .unwrap();
    assert_eq!(n, 1500);
    assert_eq!(out.to_vec(), payload);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn data_block_past_end_is_out_of_range() {
    let (dev, reads) = CountingDevice::new(vec![0u8; 8 * DEVBLK]);
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 4096, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, 1 << 17);
    let err = reader
        .read_data(4000, DATA_COMPRESSED_BIT | 500, None, &mut out)
        .unwrap_err();
    assert!(matches!(err, Error::OutOfRange { .. }));
    // Rejected before any device I/O.
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

// ── Metadata blocks ─────────────────────────────────────────────────────────

/// Serialize a metadata block: 2-byte header then payload.
fn metadata_block(payload: &[u8], compressed: bool) -> Vec<u8> {
    let mut header = payload.len() as u16;
    if !compressed {
        header |= METADATA_COMPRESSED_BIT;
    }
    let mut block = header.to_le_bytes().to_vec();
    block.extend_from_slice(payload);
    block
}

#[test]
fn metadata_block_uses_header_read_plus_one_body_read() {
    let raw = pseudo_random_bytes(6000, 4);
    let stored = zlib_compress(&raw);
    let index = 5 * DEVBLK as u64 + 123;
    let (dev, reads) = CountingDevice::new(image_with(index, &metadata_block(&stored, true)));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(Zlib));

    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let mut next = 0u64;
    let n = reader.read_data(index, 0, Some(&mut next), &mut out).unwrap();
    assert_eq!(n, raw.len());
    assert_eq!(out.to_vec(), raw);
    assert_eq!(next, index + 2 + stored.len() as u64);
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn metadata_block_within_one_device_block_reads_once() {
    // Uncompressed 200-byte metadata block right at a block boundary: the
    // header read already covers the payload, so no body read happens.
    let raw = pseudo_random_bytes(200, 5);
    let index = 4 * DEVBLK as u64;
    let (dev, reads) = CountingDevice::new(image_with(index, &metadata_block(&raw, false)));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let n = reader.read_data(index, 0, None, &mut out).unwrap();
    assert_eq!(n, 200);
    assert_eq!(out.to_vec(), raw);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn metadata_header_straddling_blocks_decodes() {
    // Header's two bytes land in different device blocks.
    let raw = pseudo_random_bytes(3000, 6);
    let index = 2 * DEVBLK as u64 - 1;
    let (dev, _) = CountingDevice::new(image_with(index, &metadata_block(&raw, false)));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let n = reader.read_data(index, 0, None, &mut out).unwrap();
    assert_eq!(n, 3000);
    assert_eq!(out.to_vec(), raw);
}

#[test]
fn metadata_length_at_capacity_succeeds() {
    let raw = pseudo_random_bytes(METADATA_SIZE, 7);
    let index = 1024;
    let (dev, _) = CountingDevice::new(image_with(index, &metadata_block(&raw, false)));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let n = reader.read_data(index, 0, None, &mut out).unwrap();
    assert_eq!(n, METADATA_SIZE);
    assert_eq!(out.to_vec(), raw);
}

#[test]
fn metadata_length_over_capacity_fails_before_body_read() {
    // Header declares 8193 bytes against an 8192-byte output. Only the
    // header read may happen.
    let raw = vec![0u8; 8193];
    let index = 1024;
    let (dev, reads) = CountingDevice::new(image_with(index, &metadata_block(&raw, false)));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let err = reader.read_data(index, 0, None, &mut out).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidLength {
            length: 8193,
            capacity: METADATA_SIZE
        }
    ));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

// ── Failure and idempotence ─────────────────────────────────────────────────

#[test]
fn device_failure_surfaces_as_io_error() {
    let mut reader =
        SqfsReader::from_parts(FailingDevice, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));
    let mut out = PageBuffer::new(4096, 1 << 17);
    let err = reader
        .read_data(2048, DATA_COMPRESSED_BIT | 500, None, &mut out)
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(out.written(), 0);
}

#[test]
fn corrupt_compressed_stream_is_a_codec_error() {
    let garbage = pseudo_random_bytes(500, 8);
    let index = 2048;
    let (dev, _) = CountingDevice::new(image_with(index, &metadata_block(&garbage, true)));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(Zlib));

    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let err = reader.read_data(index, 0, None, &mut out).unwrap_err();
    assert!(matches!(err, Error::Codec { codec: "zlib", .. }));
}

#[test]
fn read_recovers_after_transient_device_failure() {
    // A failed read leaves no residual state behind: retrying the same
    // descriptor on the same reader succeeds once the device does.
    let payload = pseudo_random_bytes(2500, 14);
    let index = 2 * DEVBLK as u64 + 300;
    let dev = FlakyDevice {
        inner: MemDevice::new(image_with(index, &payload)),
        failures: 1,
    };
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(RawCopy));

    let mut out = PageBuffer::new(4096, 1 << 17);
    let err = reader
        .read_data(index, DATA_COMPRESSED_BIT | 2500, None, &mut out)
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(out.written(), 0);

    let n = reader
        .read_data(index, DATA_COMPRESSED_BIT | 2500, None, &mut out)
        .unwrap();
    assert_eq!(n, 2500);
    assert_eq!(out.to_vec(), payload);
}

#[test]
fn repeated_reads_are_identical() {
    let raw = pseudo_random_bytes(5000, 9);
    let stored = zlib_compress(&raw);
    let index = 3 * DEVBLK as u64 + 10;
    let (dev, _) = CountingDevice::new(image_with(index, &metadata_block(&stored, true)));
    let mut reader = SqfsReader::from_parts(dev, DEVBLK, 1 << 17, 1 << 20, Box::new(Zlib));

    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let first_n = reader.read_data(index, 0, None, &mut out).unwrap();
    let first = out.to_vec();

    out.reset();
    let second_n = reader.read_data(index, 0, None, &mut out).unwrap();
    assert_eq!(first_n, second_n);
    assert_eq!(first, out.to_vec());
}

// ── Mount ───────────────────────────────────────────────────────────────────

fn sample_superblock(bytes_used: u64) -> Superblock {
    Superblock {
        inode_count: 1,
        mod_time: 0,
        block_size: 131072,
        frag_count: 0,
        compression: ZLIB_COMPRESSION,
        block_log: 17,
        flags: 0,
        id_count: 1,
        ver_major: 4,
        ver_minor: 0,
        root_inode: 0,
        bytes_used,
    }
}

#[test]
fn mount_reads_superblock_and_serves_blocks() {
    let raw = pseudo_random_bytes(3000, 10);
    let stored = zlib_compress(&raw);
    let index = 2 * DEVBLK as u64;
    let mut image = image_with(index, &metadata_block(&stored, true));
    let sb = sample_superblock(image.len() as u64);
    image[..96].copy_from_slice(&sb.to_bytes());

    let mut reader = SqfsReader::mount(MemDevice::new(image), DEVBLK, Box::new(Zlib)).unwrap();
    assert_eq!(reader.block_size(), 131072);
    assert_eq!(reader.codec_name(), "zlib");

    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let n = reader.read_data(index, 0, None, &mut out).unwrap();
    assert_eq!(n, raw.len());
    assert_eq!(out.to_vec(), raw);
}

#[test]
fn mount_rejects_non_power_of_two_devblk() {
    let mut image = vec![0u8; 4096];
    let sb = sample_superblock(4096);
    image[..96].copy_from_slice(&sb.to_bytes());

    let err = SqfsReader::mount(MemDevice::new(image), 1000, Box::new(Zlib)).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn mount_rejects_codec_mismatch() {
    let mut image = vec![0u8; 4096];
    let sb = sample_superblock(4096);
    image[..96].copy_from_slice(&sb.to_bytes());

    let err = SqfsReader::mount(MemDevice::new(image), DEVBLK, Box::new(RawCopy)).unwrap_err();
    assert!(matches!(err, Error::BadSuperblock(_)));
}
