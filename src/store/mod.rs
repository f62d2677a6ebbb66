use std::ops::Deref;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::shard::{ShardTag, ShardTagger};
use crate::state::AggregateState;
use crate::types::{Offset, SequenceNumber};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

/// Marker trait for every [`EventStoreLockGuard`].
///
/// Implementors should unlock concurrent access to the guarded resource, when dropped.
pub trait UnlockOnDrop: Send + Sync + 'static {}

/// Lock guard preventing concurrent access to a resource.
///
/// The lock is released when this guard is dropped.
pub struct EventStoreLockGuard(Box<dyn UnlockOnDrop>);

impl EventStoreLockGuard {
    /// Creates a new instance from any [`UnlockOnDrop`].
    #[must_use]
    pub fn new(lock: impl UnlockOnDrop) -> Self {
        Self(Box::new(lock))
    }
}

impl UnlockOnDrop for tokio::sync::OwnedMutexGuard<()> {}

type Ev<S> = <<S as EventStore>::Aggregate as Aggregate>::Event;
type St<S> = <<S as EventStore>::Aggregate as Aggregate>::State;

/// An EventStore is responsible for persisting events that an aggregate emits into a durable,
/// append-only log, and loading the events that represent an aggregate's history from it.
///
/// Every persisted event gets a global offset and the shard tag of its aggregate, so that the log
/// can be read back one shard at a time.
#[async_trait]
pub trait EventStore: Send + Sync {
    type Aggregate: Aggregate;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Acquires a lock for the given aggregate, or waits for outstanding guards to be released.
    ///
    /// Used to prevent concurrent access to the aggregate state.
    /// Note that any process which does *not* `lock` will get immediate (possibly shared!) access.
    /// ALL accesses (regardless of this guard) are subject to the usual optimistic locking strategy on write.
    async fn lock(&self, aggregate_id: &str) -> Result<EventStoreLockGuard, Self::Error>;

    /// Loads the events that an aggregate instance has emitted in the past, ordered by sequence number.
    async fn by_aggregate_id(&self, aggregate_id: &str) -> Result<Vec<StoreEvent<Ev<Self>>>, Self::Error>;

    /// Persists multiple events into the log. Either all the events are persisted, or none are.
    ///
    /// Sequence numbers continue from the one of `aggregate_state`. If another writer already
    /// persisted an event with the same sequence number the whole batch is refused.
    async fn persist(
        &self,
        aggregate_state: &mut AggregateState<St<Self>>,
        events: Vec<Ev<Self>>,
    ) -> Result<Vec<StoreEvent<Ev<Self>>>, Self::Error>;

    /// Loads at most `limit` events of the given shard whose offset is greater than `after`,
    /// ordered by offset. `None` reads from the beginning of the log.
    async fn by_shard(
        &self,
        shard: ShardTag,
        after: Option<Offset>,
        limit: usize,
    ) -> Result<Vec<StoreEvent<Ev<Self>>>, Self::Error>;

    /// The tagger used to assign each persisted event to a shard.
    fn shard_tagger(&self) -> ShardTagger;
}

/// Blanket implementation making an [`EventStore`] every (smart) pointer to an [`EventStore`],
/// e.g. `&Store`, `Box<Store>`, `Arc<Store>`.
/// This is particularly useful when there's the need in your codebase to have a generic [`EventStore`].
#[async_trait]
impl<A, E, T, S> EventStore for T
where
    A: Aggregate,
    E: std::error::Error + Send + Sync + 'static,
    S: EventStore<Aggregate = A, Error = E> + ?Sized,
    T: Deref<Target = S> + Send + Sync,
{
    type Aggregate = A;
    type Error = E;

    /// Deref call to [`EventStore::lock`].
    async fn lock(&self, aggregate_id: &str) -> Result<EventStoreLockGuard, Self::Error> {
        self.deref().lock(aggregate_id).await
    }

    /// Deref call to [`EventStore::by_aggregate_id`].
    async fn by_aggregate_id(&self, aggregate_id: &str) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        self.deref().by_aggregate_id(aggregate_id).await
    }

    /// Deref call to [`EventStore::persist`].
    async fn persist(
        &self,
        aggregate_state: &mut AggregateState<A::State>,
        events: Vec<A::Event>,
    ) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        self.deref().persist(aggregate_state, events).await
    }

    /// Deref call to [`EventStore::by_shard`].
    async fn by_shard(
        &self,
        shard: ShardTag,
        after: Option<Offset>,
        limit: usize,
    ) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        self.deref().by_shard(shard, after, limit).await
    }

    /// Deref call to [`EventStore::shard_tagger`].
    fn shard_tagger(&self) -> ShardTagger {
        self.deref().shard_tagger()
    }
}

/// A `StoreEvent` contains the payload (the original event) alongside the event's metadata.
#[derive(Clone, Debug)]
pub struct StoreEvent<Event> {
    /// Uniquely identifies an event among all events emitted from all aggregates.
    pub id: Uuid,
    /// The aggregate instance that emitted the event.
    pub aggregate_id: String,
    /// The original, emitted, event.
    pub payload: Event,
    /// The timestamp of when the event is persisted.
    pub occurred_on: DateTime<Utc>,
    /// The sequence number of the event, within its specific aggregate instance. Starts from 1.
    pub sequence_number: SequenceNumber,
    /// Position of the event in the whole log. Strictly increasing, not dense.
    pub offset: Offset,
    /// The shard of the aggregate instance.
    pub shard: ShardTag,
}

impl<Event> StoreEvent<Event> {
    /// Returns the sequence number of the event, within its specific aggregate instance.
    pub const fn sequence_number(&self) -> &SequenceNumber {
        &self.sequence_number
    }

    /// Returns the original, emitted, event.
    pub const fn payload(&self) -> &Event {
        &self.payload
    }
}
