use std::sync::Arc;

use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::aggregate::Aggregate;
use crate::bus::{EventBus, EventSource};
use crate::offset::OffsetStore;
use crate::publisher::TopicProducer;
use crate::store::{EventStore, StoreEvent};
use crate::usage::{ProjectorError, UsageProjector, UsageRepository};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Projector(#[from] ProjectorError),
    #[error("background task panicked: {0}")]
    Panicked(#[from] JoinError),
}

/// Background tasks moving events from the event log to the usage counters: one publication loop per
/// shard and the usage projector.
///
/// Nothing runs before [`Pipeline::start`] and everything is stopped by [`Pipeline::shutdown`].
pub struct Pipeline {
    shutdown: CancellationToken,
    publishers: Vec<JoinHandle<()>>,
    projector: JoinHandle<Result<(), ProjectorError>>,
}

impl Pipeline {
    pub fn start<E, O, B, M, R, S>(
        producer: Arc<TopicProducer<E, O, B, M>>,
        projector: Arc<UsageProjector<R>>,
        source: S,
    ) -> Self
    where
        E: EventStore + 'static,
        O: OffsetStore + 'static,
        B: EventBus<M> + 'static,
        M: for<'a> From<&'a StoreEvent<<E::Aggregate as Aggregate>::Event>> + Serialize + Send + Sync + 'static,
        R: UsageRepository + 'static,
        S: EventSource + 'static,
    {
        let shutdown = CancellationToken::new();
        let publishers = producer.spawn(shutdown.clone());

        let token = shutdown.clone();
        let projector = tokio::spawn(async move {
            let result = projector.run(source, token).await;
            if let Err(error) = &result {
                tracing::error!(error = %error, "usage projector stopped");
            }
            result
        });

        tracing::debug!(shards = publishers.len(), "pipeline started");

        Self {
            shutdown,
            publishers,
            projector,
        }
    }

    /// Whether the projector gave up, in which case [`Pipeline::shutdown`] returns its error.
    pub fn projector_stopped(&self) -> bool {
        self.projector.is_finished()
    }

    /// Stops every task and waits for them. Work in flight is completed first: a batch being
    /// published, a record being projected and committed.
    pub async fn shutdown(self) -> Result<(), PipelineError> {
        self.shutdown.cancel();

        let _ = futures::future::try_join_all(self.publishers).await?;

        self.projector.await??;
        tracing::debug!("pipeline stopped");

        Ok(())
    }
}
