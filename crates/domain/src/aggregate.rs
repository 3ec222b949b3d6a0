//! Core aggregate and domain event traits.

use common::OrderId;
use journal::Sequence;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events record facts that have already happened. They are immutable
/// and named in the past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name, stored as the journal entry type.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates rebuilt from a journal stream.
///
/// Aggregates:
/// - Are rebuilt by replaying their events in order
/// - Turn commands into new events without mutating themselves
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors a rejected command produces.
    type Error: std::error::Error + Send + Sync;

    /// Returns the stream type written to every journal entry.
    fn stream_type() -> &'static str;

    /// Returns the aggregate's identifier, or `None` before its first event.
    fn id(&self) -> Option<OrderId>;

    /// Returns the sequence of the last applied event.
    fn sequence(&self) -> Sequence;

    /// Sets the sequence. Called by the command handler while replaying.
    fn set_sequence(&mut self, sequence: Sequence);

    /// Applies an event to the aggregate.
    ///
    /// Must not fail: the event has already been recorded.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: OrderId },
        Bumped { by: u32 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Bumped { .. } => "CounterBumped",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        id: Option<OrderId>,
        total: u32,
        sequence: Sequence,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn stream_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<OrderId> {
            self.id
        }

        fn sequence(&self) -> Sequence {
            self.sequence
        }

        fn set_sequence(&mut self, sequence: Sequence) {
            self.sequence = sequence;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { id } => self.id = Some(id),
                CounterEvent::Bumped { by } => self.total += by,
            }
        }
    }

    #[test]
    fn test_apply_events_in_order() {
        let id = OrderId::new();
        let mut counter = Counter::default();
        counter.apply_events(vec![
            CounterEvent::Opened { id },
            CounterEvent::Bumped { by: 2 },
            CounterEvent::Bumped { by: 40 },
        ]);

        assert_eq!(counter.id(), Some(id));
        assert_eq!(counter.total, 42);
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(
            CounterEvent::Opened { id: OrderId::new() }.event_type(),
            "CounterOpened"
        );
        assert_eq!(CounterEvent::Bumped { by: 1 }.event_type(), "CounterBumped");
    }
}
