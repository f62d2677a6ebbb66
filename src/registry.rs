use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::aggregate::Aggregate;
use crate::manager::{AggregateManager, CommandError};
use crate::state::AggregateState;
use crate::store::EventStore;

type State<E> = <<E as EventStore>::Aggregate as Aggregate>::State;
type Entity<E> = Arc<Mutex<Option<AggregateState<State<E>>>>>;

/// Single writer per aggregate id.
///
/// Each aggregate id gets its own async mutex guarding a cached [`AggregateState`]. The first access
/// replays the event log, following ones reuse the cached state. Commands and reads for the same id
/// are strictly serialized while different ids never wait on each other.
///
/// Only states with at least one event are cached, for the lifetime of the registry. An id without
/// history leaves no entry behind once its call returns.
pub struct EntityRegistry<E>
where
    E: EventStore,
{
    manager: AggregateManager<E>,
    entities: Mutex<HashMap<String, Entity<E>>>,
}

impl<E> EntityRegistry<E>
where
    E: EventStore,
{
    pub fn new(event_store: E) -> Self {
        Self {
            manager: AggregateManager::new(event_store),
            entities: Mutex::new(HashMap::new()),
        }
    }

    pub fn manager(&self) -> &AggregateManager<E> {
        &self.manager
    }

    /// Handles `command` on the aggregate identified by `aggregate_id`, returning once the produced
    /// events are durably persisted and applied.
    ///
    /// If the store fails the cached state is dropped, so the next access reloads it from the log.
    pub async fn ask(
        &self,
        aggregate_id: &str,
        command: <E::Aggregate as Aggregate>::Command,
    ) -> Result<(), CommandError<<E::Aggregate as Aggregate>::Error, E::Error>> {
        let entity = self.entity(aggregate_id).await;
        let result = self.ask_entity(&entity, aggregate_id, command).await;
        self.release(aggregate_id, entity).await;

        result
    }

    /// Runs a read-only `query` against the current state of `aggregate_id`.
    ///
    /// The query waits for in-flight commands on the same id, so it always observes every
    /// acknowledged command.
    pub async fn read<F, R>(&self, aggregate_id: &str, query: F) -> Result<R, E::Error>
    where
        F: FnOnce(&State<E>) -> R + Send,
    {
        let entity = self.entity(aggregate_id).await;
        let result = self.read_entity(&entity, aggregate_id, query).await;
        self.release(aggregate_id, entity).await;

        result
    }

    async fn ask_entity(
        &self,
        entity: &Entity<E>,
        aggregate_id: &str,
        command: <E::Aggregate as Aggregate>::Command,
    ) -> Result<(), CommandError<<E::Aggregate as Aggregate>::Error, E::Error>> {
        let mut slot = entity.lock().await;

        let mut aggregate_state = match slot.take() {
            Some(aggregate_state) => aggregate_state,
            None => self.recover(aggregate_id).await.map_err(CommandError::StorageUnavailable)?,
        };

        let result = self.manager.handle_command(&mut aggregate_state, command).await;

        match &result {
            Err(CommandError::StorageUnavailable(error)) => {
                tracing::warn!(aggregate_id, error = %error, "dropping cached state after store failure");
            }
            _ if *aggregate_state.sequence_number() > 0 => *slot = Some(aggregate_state),
            _ => {}
        }

        result
    }

    async fn read_entity<F, R>(&self, entity: &Entity<E>, aggregate_id: &str, query: F) -> Result<R, E::Error>
    where
        F: FnOnce(&State<E>) -> R + Send,
    {
        let mut slot = entity.lock().await;

        if let Some(aggregate_state) = slot.as_ref() {
            return Ok(query(aggregate_state.inner()));
        }

        let aggregate_state = self.recover(aggregate_id).await?;
        let output = query(aggregate_state.inner());
        if *aggregate_state.sequence_number() > 0 {
            *slot = Some(aggregate_state);
        }

        Ok(output)
    }

    async fn entity(&self, aggregate_id: &str) -> Entity<E> {
        let mut entities = self.entities.lock().await;
        Arc::clone(entities.entry(aggregate_id.to_string()).or_default())
    }

    /// Removes the entry of `aggregate_id` if it caches nothing and no other call is using it.
    async fn release(&self, aggregate_id: &str, entity: Entity<E>) {
        let mut entities = self.entities.lock().await;

        // The map holds one reference and `entity` the other. New users need the map lock.
        let unused = Arc::strong_count(&entity) == 2 && entity.try_lock().map_or(false, |slot| slot.is_none());
        if unused {
            let _ = entities.remove(aggregate_id);
        }
    }

    async fn recover(&self, aggregate_id: &str) -> Result<AggregateState<State<E>>, E::Error> {
        tracing::debug!(aggregate_id, "replaying aggregate from the event log");

        Ok(self
            .manager
            .load(aggregate_id)
            .await?
            .unwrap_or_else(|| AggregateState::with_id(aggregate_id)))
    }
}
