use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use crate::bus::{Delivery, EventSource};
use crate::consumption::ConsumerMessage;
use crate::usage::{IncrementOutcome, UsageIncrement, UsageRepository};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectorError {
    #[error("failed to receive from the bus: {0}")]
    Receive(#[source] BoxError),
    #[error("failed to commit offset {offset} of partition {partition}: {source}")]
    Commit {
        partition: i32,
        offset: i64,
        #[source]
        source: BoxError,
    },
    /// The repository kept failing on this record. It was not committed and will be delivered again.
    #[error("gave up on offset {offset} of partition {partition}: {source}")]
    RetriesExhausted {
        partition: i32,
        offset: i64,
        #[source]
        source: BoxError,
    },
}

#[derive(TypedBuilder, Clone, Debug)]
pub struct ProjectorConfig {
    /// Retries of a failing increment before the projector stops.
    #[builder(default = 5)]
    pub(crate) max_retries: usize,
    #[builder(default = Duration::from_millis(100))]
    pub(crate) min_delay: Duration,
    #[builder(default = Duration::from_secs(5))]
    pub(crate) max_delay: Duration,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ProjectorConfig {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// What the projector did with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Applied,
    /// Already applied before, dropped.
    Duplicate,
    /// A message type the projector does not handle.
    Ignored,
    /// The payload could not be decoded. Logged and skipped.
    Poisoned,
}

/// Folds the consumption messages into the daily usage counters, with at-least-once delivery.
///
/// A delivery is committed only once its increment is stored, dropped as a duplicate, or known to
/// be unusable.
pub struct UsageProjector<R> {
    repository: R,
    config: ProjectorConfig,
}

impl<R> UsageProjector<R>
where
    R: UsageRepository,
{
    pub fn new(repository: R, config: ProjectorConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Applies one delivery to the repository, without committing it.
    #[tracing::instrument(skip_all, fields(partition = delivery.partition, offset = delivery.offset))]
    pub async fn project(&self, delivery: &Delivery) -> Result<Projection, ProjectorError> {
        let message: ConsumerMessage = match serde_json::from_slice(&delivery.payload) {
            Ok(message) => message,
            Err(error) => {
                tracing::error!(key = ?delivery.key, error = %error, "undecodable message, skipping it");
                return Ok(Projection::Poisoned);
            }
        };

        let increment = match message {
            ConsumerMessage::ConsumptionRecorded {
                consumer_id,
                timestamp,
                consumption,
                sequence_number,
            } => UsageIncrement {
                consumer_id,
                date: timestamp.date(),
                watts: u64::from(consumption),
                sequence_number,
            },
            ConsumerMessage::Unknown => return Ok(Projection::Ignored),
        };

        let outcome = (|| async { self.repository.increment(&increment).await })
            .retry(self.config.backoff())
            .notify(|error, delay| {
                tracing::warn!(error = %error, ?delay, "usage increment failed, retrying");
            })
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "usage increment failed, giving up");
                ProjectorError::RetriesExhausted {
                    partition: delivery.partition,
                    offset: delivery.offset,
                    source: Box::new(error),
                }
            })?;

        tracing::debug!(consumer_id = %increment.consumer_id, date = %increment.date, ?outcome, "usage projected");

        Ok(match outcome {
            IncrementOutcome::Applied => Projection::Applied,
            IncrementOutcome::Duplicate => Projection::Duplicate,
        })
    }

    /// Projects `delivery` then commits it.
    pub async fn process<S>(&self, source: &mut S, delivery: &Delivery) -> Result<Projection, ProjectorError>
    where
        S: EventSource,
    {
        let projection = self.project(delivery).await?;

        source
            .commit(delivery)
            .await
            .map_err(|error| ProjectorError::Commit {
                partition: delivery.partition,
                offset: delivery.offset,
                source: Box::new(error),
            })?;

        Ok(projection)
    }

    /// Consumes `source` until `shutdown` is cancelled.
    ///
    /// Cancellation is only observed while waiting for the next record, so the record being
    /// handled always completes, commit included.
    pub async fn run<S>(&self, mut source: S, shutdown: CancellationToken) -> Result<(), ProjectorError>
    where
        S: EventSource,
    {
        loop {
            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = source.receive() => received.map_err(|error| ProjectorError::Receive(Box::new(error)))?,
            };

            self.process(&mut source, &delivery).await?;
        }

        tracing::debug!("usage projector stopped");
        Ok(())
    }
}
