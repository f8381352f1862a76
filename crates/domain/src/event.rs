//! Domain event trait and the per-unit-of-work event buffer.

use common::AggregateId;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is used for the outbox record's `event_type` tag.
    fn event_type(&self) -> &'static str;

    /// Returns the id of the aggregate this event concerns.
    ///
    /// Every event variant must answer this from its own data; there is no
    /// fallback and no runtime discovery.
    fn aggregate_id(&self) -> AggregateId;
}

/// Buffer that accumulates events raised during one unit of work.
///
/// A fresh context is created at the start of a use case, passed into every
/// aggregate transition the use case performs, and drained exactly once at
/// the persistence boundary. It is an owned value with no ambient state, so
/// it cannot leak across concurrent operations.
///
/// `record` only appends; it never invokes handlers, so a transition can
/// never re-enter the context while it is being written to.
#[derive(Debug)]
pub struct EventContext<E> {
    events: Vec<E>,
}

impl<E> EventContext<E> {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Appends an event to the buffer.
    pub fn record(&mut self, event: E) {
        self.events.push(event);
    }

    /// Returns the buffered events, leaving the context empty.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }

    /// Returns the number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the buffered events without draining them.
    pub fn events(&self) -> &[E] {
        &self.events
    }
}

impl<E> Default for EventContext<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_drain() {
        let mut ctx = EventContext::new();
        ctx.record("first");
        ctx.record("second");
        assert_eq!(ctx.len(), 2);

        let drained = ctx.drain();
        assert_eq!(drained, vec!["first", "second"]);
        assert!(ctx.is_empty());
    }

    #[test]
    fn drain_on_empty_context_returns_nothing() {
        let mut ctx: EventContext<&str> = EventContext::new();
        assert!(ctx.drain().is_empty());
    }

    #[test]
    fn context_is_reusable_after_drain() {
        let mut ctx = EventContext::new();
        ctx.record(1);
        ctx.drain();
        ctx.record(2);
        assert_eq!(ctx.drain(), vec![2]);
    }
}
