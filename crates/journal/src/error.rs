use thiserror::Error;

use crate::{OrderId, Sequence};

/// Errors that can occur when reading or writing the journal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The stream moved on since the caller last read it.
    #[error(
        "Concurrency conflict for stream {stream_id}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        stream_id: OrderId,
        expected: Sequence,
        actual: Sequence,
    },

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A persisted line could not be decoded.
    #[error("Corrupt journal line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;
