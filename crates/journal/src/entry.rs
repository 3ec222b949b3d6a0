use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::OrderId;

/// Unique identifier for a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an entry within its stream, used for optimistic concurrency.
///
/// An empty stream is at [`Sequence::initial`] (0); its first entry carries
/// [`Sequence::first`] (1) and every further entry increments by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The position of a stream with no entries.
    pub fn initial() -> Self {
        Self(0)
    }

    /// The position of a stream's first entry.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded saga transition together with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier for this entry.
    pub entry_id: EntryId,

    /// The kind of transition recorded (e.g. "PizzaVerified").
    pub entry_type: String,

    /// The order stream this entry belongs to.
    pub stream_id: OrderId,

    /// The kind of stream (e.g. "PlaceOrder").
    pub stream_type: String,

    /// Position of this entry within its stream.
    pub sequence: Sequence,

    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,

    /// The transition payload as JSON.
    pub payload: serde_json::Value,

    /// Free-form annotations (correlation ids, operator names, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl JournalEntry {
    /// Creates a new journal entry builder.
    pub fn builder() -> JournalEntryBuilder {
        JournalEntryBuilder::default()
    }
}

/// Builder for [`JournalEntry`].
#[derive(Debug, Default)]
pub struct JournalEntryBuilder {
    entry_id: Option<EntryId>,
    entry_type: Option<String>,
    stream_id: Option<OrderId>,
    stream_type: Option<String>,
    sequence: Option<Sequence>,
    recorded_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl JournalEntryBuilder {
    pub fn entry_id(mut self, id: EntryId) -> Self {
        self.entry_id = Some(id);
        self
    }

    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = Some(entry_type.into());
        self
    }

    pub fn stream_id(mut self, id: OrderId) -> Self {
        self.stream_id = Some(id);
        self
    }

    pub fn stream_type(mut self, stream_type: impl Into<String>) -> Self {
        self.stream_type = Some(stream_type.into());
        self
    }

    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Sets the recording time. Defaults to now.
    pub fn recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the entry, returning `None` if a required field is missing.
    ///
    /// Required: entry type, stream id, stream type, sequence and payload.
    pub fn build(self) -> Option<JournalEntry> {
        Some(JournalEntry {
            entry_id: self.entry_id.unwrap_or_default(),
            entry_type: self.entry_type?,
            stream_id: self.stream_id?,
            stream_type: self.stream_type?,
            sequence: self.sequence?,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
            payload: self.payload?,
            metadata: self.metadata,
        })
    }
}
