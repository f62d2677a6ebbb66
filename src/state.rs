use std::fmt::{Debug, Formatter};

use crate::store::{EventStoreLockGuard, StoreEvent};
use crate::types::SequenceNumber;

/// The internal state for an Aggregate.
/// It contains:
/// - an id uniquely representing the aggregate,
/// - the sequence number of the last event applied to it,
/// - an inner state definition,
/// - an optional lock, held while the state is being handled.
pub struct AggregateState<S> {
    id: String,
    sequence_number: SequenceNumber,
    inner: S,
    lock: Option<EventStoreLockGuard>,
}

impl<S: Default> AggregateState<S> {
    /// Creates a new instance of an [`AggregateState`] with the given aggregate id. The
    /// sequence number starts from 0, meaning no event has been applied yet.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Default::default(),
            sequence_number: 0,
            lock: None,
        }
    }

    /// Consumes the events, ordered by sequence number, applying them onto the inner state through
    /// `function`. The sequence number follows the last applied event.
    pub fn apply_store_events<T, F>(&mut self, store_events: Vec<StoreEvent<T>>, function: F)
    where
        F: Fn(S, T) -> S,
    {
        let mut inner: S = std::mem::take(&mut self.inner);

        for store_event in store_events {
            if store_event.sequence_number > self.sequence_number {
                self.sequence_number = store_event.sequence_number;
            }
            inner = function(inner, store_event.payload);
        }

        self.inner = inner;
    }
}

impl<S> AggregateState<S> {
    /// Returns the aggregate id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns an immutable reference to the inner state.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the sequence number of the last event applied to this state.
    pub fn sequence_number(&self) -> &SequenceNumber {
        &self.sequence_number
    }

    /// Increments and returns the sequence number the next persisted event will get.
    pub fn next_sequence_number(&mut self) -> SequenceNumber {
        self.sequence_number += 1;
        self.sequence_number
    }

    /// Inserts the lock guard into self, replacing any current one.
    pub fn set_lock(&mut self, guard: EventStoreLockGuard) {
        self.lock = Some(guard);
    }

    /// Extracts the lock from self, leaving nothing behind.
    pub fn take_lock(&mut self) -> Option<EventStoreLockGuard> {
        self.lock.take()
    }
}

impl<S: Debug> Debug for AggregateState<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateState")
            .field("id", &self.id)
            .field("sequence_number", &self.sequence_number)
            .field("inner", &self.inner)
            .field("locked", &self.lock.is_some())
            .finish()
    }
}
