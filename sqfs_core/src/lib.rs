pub mod decompress;
pub mod device;
pub mod error;
pub mod format;
pub mod locate;
pub mod output;
pub mod read;

pub use decompress::{Decompressor, ViewReader};
pub use device::{BlockDevice, FileDevice, MemDevice};
pub use error::{Error, Result};
pub use format::Superblock;
pub use output::PageBuffer;
pub use read::SqfsReader;
