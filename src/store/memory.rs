use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::shard::{ShardTag, ShardTagger};
use crate::state::AggregateState;
use crate::store::{EventStore, EventStoreLockGuard, StoreEvent};
use crate::types::{Offset, SequenceNumber};

#[derive(thiserror::Error, Debug)]
pub enum InMemoryStoreError {
    /// Serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Another writer already appended an event with this sequence number.
    #[error("sequence number {sequence_number} already taken for aggregate {aggregate_id}")]
    SequenceConflict {
        aggregate_id: String,
        sequence_number: SequenceNumber,
    },
}

/// Event log kept in memory. Useful for tests and for running the whole pipeline in a single process.
///
/// Payloads are stored serialized, exactly like a durable store would, so that what is read back
/// has been through the same serde round trip. The store is protected by an [`Arc`] that allows it to
/// be cloneable still having the same memory reference.
pub struct InMemoryStore<A> {
    inner: Arc<InnerInMemoryStore>,
    _aggregate: PhantomData<A>,
}

struct InnerInMemoryStore {
    tagger: ShardTagger,
    log: RwLock<Vec<Record>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

struct Record {
    id: Uuid,
    aggregate_id: String,
    payload: Value,
    occurred_on: DateTime<Utc>,
    sequence_number: SequenceNumber,
    offset: Offset,
    shard: ShardTag,
}

impl Record {
    fn to_store_event<E: crate::event::Event>(&self) -> Result<StoreEvent<E>, serde_json::Error> {
        Ok(StoreEvent {
            id: self.id,
            aggregate_id: self.aggregate_id.clone(),
            payload: serde_json::from_value(self.payload.clone())?,
            occurred_on: self.occurred_on,
            sequence_number: self.sequence_number,
            offset: self.offset,
            shard: self.shard,
        })
    }
}

impl<A> InMemoryStore<A> {
    pub fn new(tagger: ShardTagger) -> Self {
        Self {
            inner: Arc::new(InnerInMemoryStore {
                tagger,
                log: RwLock::new(vec![]),
                locks: Mutex::new(HashMap::new()),
            }),
            _aggregate: PhantomData,
        }
    }

    /// Number of events in the log.
    pub async fn len(&self) -> usize {
        self.inner.log.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<A> Default for InMemoryStore<A> {
    fn default() -> Self {
        Self::new(ShardTagger::default())
    }
}

impl<A> Clone for InMemoryStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _aggregate: PhantomData,
        }
    }
}

impl<A> std::fmt::Debug for InMemoryStore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("tagger", &self.inner.tagger)
            .finish()
    }
}

#[async_trait]
impl<A> EventStore for InMemoryStore<A>
where
    A: Aggregate + Send + Sync,
{
    type Aggregate = A;
    type Error = InMemoryStoreError;

    async fn lock(&self, aggregate_id: &str) -> Result<EventStoreLockGuard, Self::Error> {
        let mutex = {
            let mut locks = self.inner.locks.lock().await;
            Arc::clone(locks.entry(aggregate_id.to_string()).or_default())
        };

        Ok(EventStoreLockGuard::new(mutex.lock_owned().await))
    }

    async fn by_aggregate_id(&self, aggregate_id: &str) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        let log = self.inner.log.read().await;

        Ok(log
            .iter()
            .filter(|record| record.aggregate_id == aggregate_id)
            .map(Record::to_store_event::<A::Event>)
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[tracing::instrument(skip_all, fields(aggregate_id = %aggregate_state.id()), err)]
    async fn persist(
        &self,
        aggregate_state: &mut AggregateState<A::State>,
        events: Vec<A::Event>,
    ) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        let payloads = events
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;

        let mut log = self.inner.log.write().await;

        let last_sequence_number = log
            .iter()
            .filter(|record| record.aggregate_id == aggregate_state.id())
            .map(|record| record.sequence_number)
            .max()
            .unwrap_or(0);

        if last_sequence_number != *aggregate_state.sequence_number() {
            return Err(InMemoryStoreError::SequenceConflict {
                aggregate_id: aggregate_state.id().to_string(),
                sequence_number: *aggregate_state.sequence_number() + 1,
            });
        }

        let occurred_on: DateTime<Utc> = Utc::now();
        let shard = self.inner.tagger.tag_for(aggregate_state.id());
        let mut store_events: Vec<StoreEvent<A::Event>> = Vec::with_capacity(events.len());

        for (event, payload) in events.into_iter().zip(payloads) {
            let record = Record {
                id: Uuid::new_v4(),
                aggregate_id: aggregate_state.id().to_string(),
                payload,
                occurred_on,
                sequence_number: aggregate_state.next_sequence_number(),
                offset: log.len() as Offset + 1,
                shard,
            };

            store_events.push(StoreEvent {
                id: record.id,
                aggregate_id: record.aggregate_id.clone(),
                payload: event,
                occurred_on,
                sequence_number: record.sequence_number,
                offset: record.offset,
                shard,
            });
            log.push(record);
        }

        drop(aggregate_state.take_lock());

        Ok(store_events)
    }

    async fn by_shard(
        &self,
        shard: ShardTag,
        after: Option<Offset>,
        limit: usize,
    ) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        let log = self.inner.log.read().await;
        let after = after.unwrap_or(0);

        Ok(log
            .iter()
            .filter(|record| record.shard == shard && record.offset > after)
            .take(limit)
            .map(Record::to_store_event::<A::Event>)
            .collect::<Result<Vec<_>, _>>()?)
    }

    fn shard_tagger(&self) -> ShardTagger {
        self.inner.tagger
    }
}
