use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use crate::aggregate::Aggregate;
use crate::bus::EventBus;
use crate::offset::OffsetStore;
use crate::shard::ShardTag;
use crate::store::{EventStore, StoreEvent};

/// Name under which the publication offsets are committed by default.
pub const DEFAULT_STREAM: &str = "consumption-ingestion-events";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum PublisherError {
    #[error("failed to read the event log: {0}")]
    Store(#[source] BoxError),
    #[error("failed to access the publication offsets: {0}")]
    Offsets(#[source] BoxError),
    #[error("failed to publish on the bus: {0}")]
    Bus(#[source] BoxError),
}

#[derive(TypedBuilder, Clone, Debug)]
pub struct PublisherConfig {
    /// Name under which offsets are committed. Two producers with the same name share their progress.
    #[builder(default = DEFAULT_STREAM.to_string(), setter(into))]
    pub(crate) stream: String,
    /// Maximum number of events read from the log at once for a shard.
    #[builder(default = NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN))]
    pub(crate) batch_size: NonZeroUsize,
    /// Pause before looking for new events once a shard is drained.
    #[builder(default = Duration::from_millis(500))]
    pub(crate) poll_interval: Duration,
    /// Pause before retrying a shard after a failure.
    #[builder(default = Duration::from_secs(1))]
    pub(crate) retry_delay: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Publishes the event log on a bus, one independent loop per shard.
///
/// Within a shard events are published in offset order and the shard offset is committed only after
/// the bus acknowledged the event. A crash between the two publishes the event again on restart,
/// nothing is ever skipped.
pub struct TopicProducer<E, O, B, M> {
    event_store: E,
    offsets: O,
    bus: B,
    config: PublisherConfig,
    _message: PhantomData<fn() -> M>,
}

impl<E, O, B, M> TopicProducer<E, O, B, M>
where
    E: EventStore,
    O: OffsetStore,
    B: EventBus<M>,
    M: for<'a> From<&'a StoreEvent<<E::Aggregate as Aggregate>::Event>> + Serialize + Send + Sync,
{
    pub fn new(event_store: E, offsets: O, bus: B, config: PublisherConfig) -> Self {
        Self {
            event_store,
            offsets,
            bus,
            config,
            _message: PhantomData,
        }
    }

    /// Publishes the next batch of events of `shard`, returning how many were published.
    ///
    /// On error, the events published before the failure have their offsets committed and the
    /// failing one will be the first of the next batch.
    #[tracing::instrument(skip(self), fields(stream = %self.config.stream), err)]
    pub async fn publish_shard_batch(&self, shard: ShardTag) -> Result<usize, PublisherError> {
        let stream = self.config.stream.as_str();

        let after = self
            .offsets
            .load(stream, shard)
            .await
            .map_err(|error| PublisherError::Offsets(Box::new(error)))?;

        let store_events = self
            .event_store
            .by_shard(shard, after, self.config.batch_size.get())
            .await
            .map_err(|error| PublisherError::Store(Box::new(error)))?;

        for store_event in &store_events {
            let message = M::from(store_event);

            self.bus
                .publish(&store_event.aggregate_id, &message)
                .await
                .map_err(|error| PublisherError::Bus(Box::new(error)))?;

            self.offsets
                .save(stream, shard, store_event.offset)
                .await
                .map_err(|error| PublisherError::Offsets(Box::new(error)))?;

            tracing::debug!(
                aggregate_id = %store_event.aggregate_id,
                offset = store_event.offset,
                "event published"
            );
        }

        Ok(store_events.len())
    }

    /// Publishes `shard` until `shutdown` is cancelled. A batch in flight is always finished first.
    pub async fn run_shard(&self, shard: ShardTag, shutdown: CancellationToken) {
        loop {
            let delay = match self.publish_shard_batch(shard).await {
                Ok(published) if published >= self.config.batch_size.get() => Duration::ZERO,
                Ok(_) => self.config.poll_interval,
                Err(error) => {
                    tracing::warn!(%shard, error = %error, "shard publication failed, retrying");
                    self.config.retry_delay
                }
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::debug!(%shard, "shard publication stopped");
    }
}

impl<E, O, B, M> TopicProducer<E, O, B, M>
where
    E: EventStore + 'static,
    O: OffsetStore + 'static,
    B: EventBus<M> + 'static,
    M: for<'a> From<&'a StoreEvent<<E::Aggregate as Aggregate>::Event>> + Serialize + Send + Sync + 'static,
{
    /// Starts one publication task per shard of the event store.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        self.event_store
            .shard_tagger()
            .all_tags()
            .map(|shard| {
                let producer = Arc::clone(&self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { producer.run_shard(shard, shutdown).await })
            })
            .collect()
    }
}
