use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sqfs_codecs::decompressor_by_id;
use sqfs_core::format::{compression_name, DEFAULT_DEVBLK_SIZE, METADATA_SIZE, SUPERBLOCK_SIZE};
use sqfs_core::{FileDevice, PageBuffer, SqfsReader, Superblock};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "sqfs",
    about = "Inspect squashfs images and read raw data/metadata blocks",
    version
)]
struct Cli {
    /// Device read granularity in bytes (power of two)
    #[arg(long, global = true, default_value_t = DEFAULT_DEVBLK_SIZE)]
    devblk: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print superblock fields
    Info {
        /// Squashfs image
        image: PathBuf,
    },
    /// Read one data block by byte offset and inode length descriptor
    ///
    /// The whole block is fetched with a single device read, decompressed if
    /// its descriptor says so, and dumped.
    ReadBlock {
        /// Squashfs image
        image: PathBuf,
        /// Byte offset of the block within the image
        #[arg(short, long)]
        index: u64,
        /// On-disk length descriptor (bit 24 set = stored uncompressed)
        #[arg(short, long)]
        length: u32,
        /// Write raw bytes to a file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read one metadata block (its size comes from its 2-byte header)
    ReadMeta {
        /// Squashfs image
        image: PathBuf,
        /// Byte offset of the metadata block's header
        #[arg(short, long)]
        index: u64,
        /// Write raw bytes to a file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn peek_superblock(image: &PathBuf) -> anyhow::Result<Superblock> {
    let mut f = File::open(image).with_context(|| format!("opening image {image:?}"))?;
    let mut buf = [0u8; SUPERBLOCK_SIZE];
    f.read_exact(&mut buf)?;
    Ok(Superblock::from_bytes(&buf)?)
}

fn open_reader(image: &PathBuf, devblk: usize) -> anyhow::Result<SqfsReader<FileDevice>> {
    let sb = peek_superblock(image)?;
    let codec = decompressor_by_id(sb.compression)?;
    let dev = FileDevice::open(image)?;
    Ok(SqfsReader::mount(dev, devblk, codec)?)
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn dump(label: &str, bytes: &[u8], output: Option<PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let mut f =
                File::create(&path).with_context(|| format!("creating output file {path:?}"))?;
            f.write_all(bytes)?;
            eprintln!("  written {} to {:?}", human_bytes(bytes.len() as u64), path);
        }
        None => {
            let preview = &bytes[..bytes.len().min(256)];
            println!(
                "--- {} ({} bytes, first {} shown) ---",
                label,
                bytes.len(),
                preview.len()
            );
            for (i, chunk) in preview.chunks(16).enumerate() {
                print!("  {:04x}  ", i * 16);
                for b in chunk {
                    print!("{b:02x} ");
                }
                println!();
            }
        }
    }
    Ok(())
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_info(image: PathBuf) -> anyhow::Result<()> {
    let sb = peek_superblock(&image)?;
    println!("=== squashfs image: {image:?} ===");
    println!();
    println!("  version     : {}.{}", sb.ver_major, sb.ver_minor);
    println!(
        "  compression : {} (id={})",
        compression_name(sb.compression),
        sb.compression
    );
    println!("  block size  : {}", human_bytes(sb.block_size as u64));
    println!("  inodes      : {}", sb.inode_count);
    println!("  fragments   : {}", sb.frag_count);
    println!("  ids         : {}", sb.id_count);
    println!("  flags       : 0x{:04x}", sb.flags);
    println!("  bytes used  : {}", human_bytes(sb.bytes_used));
    Ok(())
}

fn run_read_block(
    image: PathBuf,
    devblk: usize,
    index: u64,
    length: u32,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut reader = open_reader(&image, devblk)?;
    let mut out = PageBuffer::new(4096, reader.block_size() as usize);
    let n = reader.read_data(index, length, None, &mut out)?;
    eprintln!(
        "  decoded {} with {} (single device read)",
        human_bytes(n as u64),
        reader.codec_name()
    );
    dump(&format!("data block @{index}"), &out.to_vec(), output)
}

fn run_read_meta(
    image: PathBuf,
    devblk: usize,
    index: u64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut reader = open_reader(&image, devblk)?;
    let mut out = PageBuffer::new(4096, METADATA_SIZE);
    let mut next = 0u64;
    let n = reader.read_data(index, 0, Some(&mut next), &mut out)?;
    eprintln!(
        "  decoded {} with {}; next block at {}",
        human_bytes(n as u64),
        reader.codec_name(),
        next
    );
    dump(&format!("metadata block @{index}"), &out.to_vec(), output)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Info { image } => run_info(image),
        Commands::ReadBlock {
            image,
            index,
            length,
            output,
        } => run_read_block(image, cli.devblk, index, length, output),
        Commands::ReadMeta {
            image,
            index,
            output,
        } => run_read_meta(image, cli.devblk, index, output),
    }
}
