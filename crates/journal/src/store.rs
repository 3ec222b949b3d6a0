use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{JournalEntry, JournalError, OrderId, Result, Sequence};

/// Options for appending entries to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Position the caller believes the stream is at.
    /// If `None`, no position check is performed.
    pub expected_sequence: Option<Sequence>,
}

impl AppendOptions {
    /// Creates options with no position check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the stream to be at exactly `sequence`.
    pub fn expect_sequence(sequence: Sequence) -> Self {
        Self {
            expected_sequence: Some(sequence),
        }
    }

    /// Expects the stream not to exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_sequence: Some(Sequence::initial()),
        }
    }
}

/// A stream of journal entries.
pub type EntryStream = Pin<Box<dyn Stream<Item = Result<JournalEntry>> + Send>>;

/// Durable, append-only log of saga transitions keyed by order.
///
/// Implementations must be safe to share between many saga tasks.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Appends a batch of entries to one stream.
    ///
    /// The batch is written atomically. If `options.expected_sequence` is
    /// set and the stream is elsewhere, fails with `ConcurrencyConflict`.
    ///
    /// Returns the stream's position after the append.
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions) -> Result<Sequence>;

    /// Reads every entry of a stream in sequence order.
    async fn read_stream(&self, stream_id: OrderId) -> Result<Vec<JournalEntry>>;

    /// Returns the current position of a stream, or `None` if it has no entries.
    async fn stream_position(&self, stream_id: OrderId) -> Result<Option<Sequence>>;

    /// Lists every stream in the order it was first written.
    async fn stream_ids(&self) -> Result<Vec<OrderId>>;

    /// Streams every entry in recording order.
    async fn stream_all(&self) -> Result<EntryStream>;
}

/// Checks that a batch targets one stream with consecutive sequences.
pub(crate) fn validate_batch(entries: &[JournalEntry]) -> Result<()> {
    let Some(first) = entries.first() else {
        return Err(JournalError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected = first.sequence;
    for entry in entries.iter().skip(1) {
        if entry.stream_id != first.stream_id {
            return Err(JournalError::InvalidAppend(
                "all entries must belong to the same stream".to_string(),
            ));
        }
        expected = expected.next();
        if entry.sequence != expected {
            return Err(JournalError::InvalidAppend(format!(
                "sequences must be consecutive: expected {}, got {}",
                expected, entry.sequence
            )));
        }
    }

    Ok(())
}

/// Checks a validated batch against the stream's current position.
pub(crate) fn check_position(
    entries: &[JournalEntry],
    current: Sequence,
    options: &AppendOptions,
) -> Result<Sequence> {
    let first = &entries[0];

    if let Some(expected) = options.expected_sequence
        && expected != current
    {
        return Err(JournalError::ConcurrencyConflict {
            stream_id: first.stream_id,
            expected,
            actual: current,
        });
    }

    if first.sequence != current.next() {
        return Err(JournalError::ConcurrencyConflict {
            stream_id: first.stream_id,
            expected: options.expected_sequence.unwrap_or(current),
            actual: current,
        });
    }

    Ok(entries[entries.len() - 1].sequence)
}
