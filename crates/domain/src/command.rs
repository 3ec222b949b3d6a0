//! Command handling over the step journal.

use std::marker::PhantomData;

use common::OrderId;
use journal::{AppendOptions, Journal, JournalEntry, Sequence};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::{DomainError, Result};

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The stream position after the command.
    pub new_sequence: Sequence,
}

/// Loads aggregates from a journal and appends the events their commands
/// produce.
///
/// Each execution:
/// 1. Replays the aggregate's stream
/// 2. Runs the command against the rebuilt state
/// 3. Appends the resulting events, expecting the stream to still be where
///    it was when loaded
pub struct CommandHandler<J, A>
where
    J: Journal,
    A: Aggregate,
{
    journal: J,
    _phantom: PhantomData<A>,
}

impl<J, A> CommandHandler<J, A>
where
    J: Journal,
    A: Aggregate,
{
    /// Creates a new command handler over the given journal.
    pub fn new(journal: J) -> Self {
        Self {
            journal,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying journal.
    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Loads an aggregate by replaying its stream.
    ///
    /// If the stream is empty, returns a default instance.
    pub async fn load(&self, id: OrderId) -> Result<A> {
        let entries = self.journal.read_stream(id).await?;
        replay(entries)
    }

    /// Loads an aggregate, returning `None` if its stream is empty.
    pub async fn load_existing(&self, id: OrderId) -> Result<Option<A>> {
        let aggregate: A = self.load(id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command receives the current aggregate state and returns either
    /// the events to record or a rejection. A command that returns no
    /// events leaves the journal untouched.
    pub async fn execute<F>(&self, id: OrderId, command_fn: F) -> Result<CommandResult<A>>
    where
        F: FnOnce(&A) -> std::result::Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate: A = self.load(id).await?;
        let current = aggregate.sequence();

        let events = command_fn(&aggregate)?;
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_sequence: current,
            });
        }

        let entries = build_entries::<A>(id, current, &events)?;
        let options = if current == Sequence::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_sequence(current)
        };
        let new_sequence = self.journal.append(entries, options).await?;

        tracing::debug!(
            order_id = %id,
            stream_type = A::stream_type(),
            sequence = %new_sequence,
            events = events.len(),
            "events recorded"
        );

        aggregate.apply_events(events.iter().cloned());
        aggregate.set_sequence(new_sequence);

        Ok(CommandResult {
            aggregate,
            events,
            new_sequence,
        })
    }
}

impl<J, A> Clone for CommandHandler<J, A>
where
    J: Journal + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self::new(self.journal.clone())
    }
}

/// Rebuilds an aggregate from already-read journal entries.
pub fn replay<A: Aggregate>(entries: impl IntoIterator<Item = JournalEntry>) -> Result<A> {
    let mut aggregate = A::default();
    for entry in entries {
        let event: A::Event = serde_json::from_value(entry.payload)?;
        aggregate.apply(event);
        aggregate.set_sequence(entry.sequence);
    }
    Ok(aggregate)
}

fn build_entries<A: Aggregate>(
    id: OrderId,
    current: Sequence,
    events: &[A::Event],
) -> Result<Vec<JournalEntry>> {
    let mut entries = Vec::with_capacity(events.len());
    let mut sequence = current;

    for event in events {
        sequence = sequence.next();
        let entry = JournalEntry::builder()
            .stream_id(id)
            .stream_type(A::stream_type())
            .entry_type(event.event_type())
            .sequence(sequence)
            .payload(event)?
            .build()
            .ok_or(DomainError::IncompleteEntry)?;
        entries.push(entry);
    }

    Ok(entries)
}
