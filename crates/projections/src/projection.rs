//! The projection trait and the per-order watermark it is replayed against.

use std::collections::HashMap;

use async_trait::async_trait;
use journal::{JournalEntry, OrderId, Sequence};

use crate::Result;

/// The last sequence a projection applied from each order's stream.
///
/// Order within a stream is the only ordering the journal guarantees, so
/// progress is kept per stream rather than as one global offset. Replaying an
/// entry at or below its stream's watermark is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    applied: HashMap<OrderId, Sequence>,
    entries: u64,
}

impl ProjectionPosition {
    pub fn new() -> Self {
        Self::default()
    }

    /// The highest sequence applied from `stream_id`, if any.
    pub fn applied(&self, stream_id: OrderId) -> Option<Sequence> {
        self.applied.get(&stream_id).copied()
    }

    /// Whether `entry` has already been applied.
    pub fn covers(&self, entry: &JournalEntry) -> bool {
        self.applied(entry.stream_id)
            .is_some_and(|applied| entry.sequence <= applied)
    }

    /// Moves the stream's watermark up to `entry`.
    pub fn record(&mut self, entry: &JournalEntry) {
        let applied = self.applied.entry(entry.stream_id).or_default();
        if entry.sequence > *applied {
            *applied = entry.sequence;
            self.entries += 1;
        }
    }

    /// Entries applied across all streams.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn streams(&self) -> usize {
        self.applied.len()
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} entries over {} orders", self.entries, self.applied.len())
    }
}

/// A read model fed from journal entries.
///
/// Live updates normally reach read models directly from the saga; a
/// projection lets the same model be rebuilt from the journal after a
/// restart.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Applies one entry. Called only for entries the position does not
    /// cover yet.
    async fn handle(&self, entry: &JournalEntry) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Clears the read model and its position.
    async fn reset(&self) -> Result<()>;
}
