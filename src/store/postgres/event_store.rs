use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgAdvisoryLock, PgAdvisoryLockGuard, PgAdvisoryLockKey};
use sqlx::types::Json;
use sqlx::{Executor, Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::shard::{stable_hash, ShardTag, ShardTagger};
use crate::sql::event::DbEvent;
use crate::sql::statements::Statements;
use crate::state::AggregateState;
use crate::store::postgres::PgStoreError;
use crate::store::{EventStore, EventStoreLockGuard, StoreEvent, UnlockOnDrop};
use crate::types::{Offset, SequenceNumber};

/// Default Postgres implementation for the [`EventStore`]. Use this struct in order to have a
/// pre-made implementation of an [`EventStore`] persisting on Postgres.
///
/// The store is protected by an [`Arc`] that allows it to be cloneable still having the same memory
/// reference.
///
/// Persisting takes a transaction level advisory lock on the shard of the aggregate, so that the
/// offsets of a shard become visible in increasing order and a shard reader never skips one.
pub struct PgStore<A>
where
    A: Aggregate,
{
    pub(super) inner: Arc<InnerPgStore>,
    pub(super) _aggregate: PhantomData<A>,
}

pub(super) struct InnerPgStore {
    pub(super) pool: Pool<Postgres>,
    pub(super) statements: Statements,
    pub(super) tagger: ShardTagger,
}

impl<A> PgStore<A>
where
    A: Aggregate,
{
    /// Returns the name of the event store table
    pub fn table_name(&self) -> &str {
        self.inner.statements.table_name()
    }

    /// Save an event in the event store and return a new [`StoreEvent`] instance.
    ///
    /// # Errors
    ///
    /// Will return an `Err` if the insert of the values into the database fails.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn save_event(
        &self,
        aggregate_id: &str,
        event: A::Event,
        occurred_on: DateTime<Utc>,
        sequence_number: SequenceNumber,
        shard: ShardTag,
        executor: impl Executor<'_, Database = Postgres>,
    ) -> Result<StoreEvent<A::Event>, PgStoreError> {
        let id: Uuid = Uuid::new_v4();

        let offset: Offset = sqlx::query_scalar(self.inner.statements.insert())
            .bind(id)
            .bind(aggregate_id)
            .bind(Json(&event))
            .bind(occurred_on)
            .bind(sequence_number)
            .bind(i32::from(shard.index()))
            .fetch_one(executor)
            .await
            .map_err(|error| match error {
                sqlx::Error::Database(ref database_error) if database_error.is_unique_violation() => {
                    PgStoreError::SequenceConflict {
                        aggregate_id: aggregate_id.to_string(),
                        sequence_number,
                    }
                }
                other => PgStoreError::Sqlx(other),
            })?;

        Ok(StoreEvent {
            id,
            aggregate_id: aggregate_id.to_string(),
            payload: event,
            occurred_on,
            sequence_number,
            offset,
            shard,
        })
    }
}

/// Concrete implementation of [`EventStoreLockGuard`] for the [`PgStore`].
///
/// It holds both the [`PgAdvisoryLock`] and its child [`PgAdvisoryLockGuard`].
/// When dropped, the [`PgAdvisoryLockGuard`] is dropped thus releasing the [`PgAdvisoryLock`].
#[ouroboros::self_referencing]
pub struct PgStoreLockGuard {
    lock: PgAdvisoryLock,
    #[borrows(lock)]
    #[covariant]
    guard: PgAdvisoryLockGuard<'this, PoolConnection<Postgres>>,
}

/// Marking [`PgStoreLockGuard`] as an [`UnlockOnDrop`] trait object.
impl UnlockOnDrop for PgStoreLockGuard {}

#[async_trait]
impl<A> EventStore for PgStore<A>
where
    A: Aggregate + Send + Sync,
{
    type Aggregate = A;
    type Error = PgStoreError;

    async fn lock(&self, aggregate_id: &str) -> Result<EventStoreLockGuard, Self::Error> {
        let key = stable_hash(&format!("{}/{}", self.table_name(), aggregate_id)) as i64;
        let connection = self.inner.pool.acquire().await?;
        let lock_guard = PgStoreLockGuardAsyncSendTryBuilder {
            lock: PgAdvisoryLock::with_key(PgAdvisoryLockKey::BigInt(key)),
            guard_builder: |lock: &PgAdvisoryLock| Box::pin(async move { lock.acquire(connection).await }),
        }
        .try_build()
        .await?;
        Ok(EventStoreLockGuard::new(lock_guard))
    }

    async fn by_aggregate_id(&self, aggregate_id: &str) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        Ok(sqlx::query_as::<_, DbEvent>(self.inner.statements.by_aggregate_id())
            .bind(aggregate_id)
            .fetch_all(&self.inner.pool)
            .await?
            .into_iter()
            .map(|event| event.try_into_store_event::<A::Event>())
            .collect::<Result<Vec<StoreEvent<A::Event>>, PgStoreError>>()?)
    }

    // Note: https://github.com/rust-lang/rust-clippy/issues/12281
    #[allow(clippy::blocks_in_conditions)]
    #[tracing::instrument(skip_all, fields(aggregate_id = %aggregate_state.id()), err)]
    async fn persist(
        &self,
        aggregate_state: &mut AggregateState<A::State>,
        events: Vec<A::Event>,
    ) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        let mut transaction: Transaction<Postgres> = self.inner.pool.begin().await?;
        let occurred_on: DateTime<Utc> = Utc::now();
        let shard: ShardTag = self.inner.tagger.tag_for(aggregate_state.id());
        let mut store_events: Vec<StoreEvent<A::Event>> = vec![];

        let _ = sqlx::query(self.inner.statements.lock_shard())
            .bind(self.inner.statements.lock_namespace())
            .bind(i32::from(shard.index()))
            .execute(&mut *transaction)
            .await?;

        let aggregate_id = aggregate_state.id().to_string();

        for event in events.into_iter() {
            let store_event: StoreEvent<<A as Aggregate>::Event> = self
                .save_event(
                    &aggregate_id,
                    event,
                    occurred_on,
                    aggregate_state.next_sequence_number(),
                    shard,
                    &mut *transaction,
                )
                .await?;

            store_events.push(store_event);
        }

        transaction.commit().await?;

        // The events are persisted, the aggregate lock is not needed anymore.
        drop(aggregate_state.take_lock());

        Ok(store_events)
    }

    async fn by_shard(
        &self,
        shard: ShardTag,
        after: Option<Offset>,
        limit: usize,
    ) -> Result<Vec<StoreEvent<A::Event>>, Self::Error> {
        Ok(sqlx::query_as::<_, DbEvent>(self.inner.statements.by_shard())
            .bind(i32::from(shard.index()))
            .bind(after.unwrap_or(0))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.inner.pool)
            .await?
            .into_iter()
            .map(|event| event.try_into_store_event::<A::Event>())
            .collect::<Result<Vec<StoreEvent<A::Event>>, PgStoreError>>()?)
    }

    fn shard_tagger(&self) -> ShardTagger {
        self.inner.tagger
    }
}

/// Debug implementation for [`PgStore`]. It just shows the statements, that are the only thing
/// that might be useful to debug.
impl<A: Aggregate> std::fmt::Debug for PgStore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("statements", &self.inner.statements)
            .finish()
    }
}

impl<A> Clone for PgStore<A>
where
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _aggregate: PhantomData,
        }
    }
}
