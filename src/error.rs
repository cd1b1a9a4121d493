//! Error type shared by the encoder, the set and the I/O helpers.

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by k-mer encoding, set construction and classification.
pub enum KmerError {
    /// Bad `k`, zero expected count, wrong k-mer length, mismatched sets.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Insertion into a table with no free slot left.
    #[error("k-mer set is full ({capacity} slots)")]
    Overflow {
        /// Slot count of the table that overflowed.
        capacity: usize,
    },
    /// A byte outside {A,C,G,T} under the strict symbol policy.
    #[error("malformed symbol {symbol:?} at position {pos}")]
    MalformedSymbol {
        /// Offending byte, as a char.
        symbol: char,
        /// Offset of the byte in the sequence handed to the encoder.
        pos: usize,
    },
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// FASTA/FASTQ parse error.
    #[error("sequence parse error: {0}")]
    Parse(#[from] needletail::errors::ParseError),
    /// The per-call rayon pool could not be built.
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KmerError>;

pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(KmerError::InvalidArgument(msg.into()))
}
