//! Error types used throughout this crate.

/// Any error this crate can return.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O-related error, propagated from the underlying source.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A TAR header failed validation (bad checksum, truncated record).
    #[error("invalid tar header: {0}")]
    InvalidTarHeader(String),

    /// A ZIP archive could not be opened by the underlying `zip` crate.
    #[error("zip: {0}")]
    Zip(#[from] ::zip::result::ZipError),

    /// Decompression failed: the compressed stream is corrupt.
    #[error("{codec} decompression error: {msg}")]
    Decompression {
        /// Name of the codec that failed (`"gzip"`, `"bzip2"`, `"xz"`).
        codec: &'static str,
        /// Additional detail, when the underlying library provides one.
        msg: String,
    },
}

/// This crate's result alias.
pub type Result<T> = std::result::Result<T, Error>;
