use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    JournalEntry, OrderId, Result, Sequence,
    store::{AppendOptions, EntryStream, Journal, check_position, validate_batch},
};

/// Entries in recording order plus a per-stream index into them.
#[derive(Debug, Default)]
pub(crate) struct JournalLog {
    entries: Vec<JournalEntry>,
    streams: HashMap<OrderId, Vec<usize>>,
    stream_order: Vec<OrderId>,
}

impl JournalLog {
    pub(crate) fn position(&self, stream_id: OrderId) -> Sequence {
        self.streams
            .get(&stream_id)
            .and_then(|positions| positions.last())
            .map(|&idx| self.entries[idx].sequence)
            .unwrap_or(Sequence::initial())
    }

    /// Validates a batch against this log without modifying it.
    pub(crate) fn check(&self, entries: &[JournalEntry], options: &AppendOptions) -> Result<Sequence> {
        validate_batch(entries)?;
        let current = self.position(entries[0].stream_id);
        check_position(entries, current, options)
    }

    /// Appends entries that already passed [`JournalLog::check`].
    pub(crate) fn extend(&mut self, entries: Vec<JournalEntry>) {
        for entry in entries {
            let stream_id = entry.stream_id;
            let positions = self.streams.entry(stream_id).or_insert_with(|| {
                self.stream_order.push(stream_id);
                Vec::new()
            });
            positions.push(self.entries.len());
            self.entries.push(entry);
        }
    }

    pub(crate) fn read(&self, stream_id: OrderId) -> Vec<JournalEntry> {
        self.streams
            .get(&stream_id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&idx| self.entries[idx].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn stream_position(&self, stream_id: OrderId) -> Option<Sequence> {
        self.streams
            .contains_key(&stream_id)
            .then(|| self.position(stream_id))
    }

    pub(crate) fn stream_ids(&self) -> Vec<OrderId> {
        self.stream_order.clone()
    }

    pub(crate) fn all(&self) -> Vec<JournalEntry> {
        self.entries.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Journal kept entirely in memory.
///
/// Cheap to clone; clones share the same log. Used by tests and by the
/// server when no journal file is configured.
#[derive(Clone, Default)]
pub struct InMemoryJournal {
    log: Arc<RwLock<JournalLog>>,
}

impl InMemoryJournal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries across all streams.
    pub async fn entry_count(&self) -> usize {
        self.log.read().await.len()
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions) -> Result<Sequence> {
        let mut log = self.log.write().await;
        let position = log.check(&entries, &options)?;
        log.extend(entries);
        metrics::counter!("journal_appends_total").increment(1);
        Ok(position)
    }

    async fn read_stream(&self, stream_id: OrderId) -> Result<Vec<JournalEntry>> {
        Ok(self.log.read().await.read(stream_id))
    }

    async fn stream_position(&self, stream_id: OrderId) -> Result<Option<Sequence>> {
        Ok(self.log.read().await.stream_position(stream_id))
    }

    async fn stream_ids(&self) -> Result<Vec<OrderId>> {
        Ok(self.log.read().await.stream_ids())
    }

    async fn stream_all(&self) -> Result<EntryStream> {
        use futures_util::stream;

        let entries = self.log.read().await.all();
        Ok(Box::pin(stream::iter(entries.into_iter().map(Ok))))
    }
}
