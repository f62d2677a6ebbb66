use crate::consumption::{Consumption, ConsumptionQuery, ConsumerAggregate, ConsumerCommand, ConsumerError};
use crate::manager::CommandError;
use crate::ptu::parse_timestamp;
use crate::registry::EntityRegistry;
use crate::store::EventStore;

#[derive(thiserror::Error, Debug)]
pub enum ConsumptionError {
    /// The request was malformed. No event was emitted.
    #[error("{0}")]
    InvalidCommand(String),
    /// The event log could not be read or written. Safe to retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl<S> From<CommandError<ConsumerError, S>> for ConsumptionError
where
    S: std::error::Error + Send + Sync + 'static,
{
    fn from(error: CommandError<ConsumerError, S>) -> Self {
        match error {
            CommandError::Rejected(rejection) => Self::InvalidCommand(rejection.to_string()),
            CommandError::StorageUnavailable(error) => Self::StorageUnavailable(Box::new(error)),
        }
    }
}

/// Entry point of the write side: ingests consumptions and answers point queries.
pub struct ConsumptionService<E>
where
    E: EventStore<Aggregate = ConsumerAggregate>,
{
    registry: EntityRegistry<E>,
}

impl<E> ConsumptionService<E>
where
    E: EventStore<Aggregate = ConsumerAggregate>,
{
    pub fn new(event_store: E) -> Self {
        Self {
            registry: EntityRegistry::new(event_store),
        }
    }

    pub fn event_store(&self) -> &E {
        self.registry.manager().event_store()
    }

    /// Records a consumption. Returns once the resulting event is in the event log.
    #[tracing::instrument(skip_all, fields(consumer_id = %consumption.consumer_id))]
    pub async fn ingest(&self, consumption: &Consumption) -> Result<(), ConsumptionError> {
        let command = ConsumerCommand::RecordConsumption {
            timestamp: consumption.timestamp.clone(),
            consumption: consumption.consumption,
        };

        self.registry.ask(&consumption.consumer_id, command).await?;

        Ok(())
    }

    /// Watts recorded for the PTU containing the queried timestamp, 0 when nothing was recorded.
    pub async fn query(&self, query: &ConsumptionQuery) -> Result<u64, ConsumptionError> {
        let timestamp = parse_timestamp(&query.timestamp).map_err(|_| {
            let error = ConsumerError::InvalidTimestamp(query.timestamp.clone());
            ConsumptionError::InvalidCommand(error.to_string())
        })?;

        self.registry
            .read(&query.consumer_id, |state| state.ptu_value(&timestamp))
            .await
            .map_err(|error| ConsumptionError::StorageUnavailable(Box::new(error)))
    }
}
