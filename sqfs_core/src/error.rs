//! Error types for the sqfs reader.

/// The result type used throughout sqfs.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the read path can surface.
///
/// All errors are reported synchronously from the top-level call; nothing is
/// retried internally. Retry policy, if any, belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A device implementation could not allocate its read buffer.
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    /// The device failed the read, or returned fewer bytes than requested.
    #[error("device read failed at offset {offset} ({len} bytes)")]
    Io { offset: u64, len: usize },

    /// The computed read region extends past the filesystem's valid extent.
    #[error("block at {index} reaches past end of filesystem ({bytes_used} bytes used)")]
    OutOfRange { index: u64, bytes_used: u64 },

    /// A decoded block length is zero or larger than the output can hold.
    #[error("block length {length} invalid for output capacity {capacity}")]
    InvalidLength { length: usize, capacity: usize },

    /// The decompression stream reported corruption or premature end.
    #[error("{codec} decompression failed: {detail}")]
    Codec { codec: &'static str, detail: String },

    /// The superblock names a compression id no bundled codec implements.
    #[error("unknown compression id {0}")]
    UnknownCodec(u16),

    /// The superblock failed validation at mount time.
    #[error("bad superblock: {0}")]
    BadSuperblock(String),

    /// A caller-supplied mount parameter is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Creates a codec error from any displayable detail.
    pub fn codec(codec: &'static str, detail: impl ToString) -> Self {
        Error::Codec {
            codec,
            detail: detail.to_string(),
        }
    }
}
