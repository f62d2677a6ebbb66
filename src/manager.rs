use crate::aggregate::Aggregate;
use crate::state::AggregateState;
use crate::store::{EventStore, StoreEvent};

/// Outcome of a failed command.
#[derive(thiserror::Error, Debug)]
pub enum CommandError<A, S> {
    /// The aggregate refused the command. Nothing was persisted and the state is unchanged.
    #[error(transparent)]
    Rejected(A),
    /// The event store could not be reached or refused the append. The caller may retry.
    #[error("event store unavailable: {0}")]
    StorageUnavailable(#[source] S),
}

type ManagerError<E> = CommandError<<<E as EventStore>::Aggregate as Aggregate>::Error, <E as EventStore>::Error>;

/// The AggregateManager is responsible for coupling the Aggregate with a Store, so that the events
/// can be persisted when handled, and the state can be reconstructed by loading and apply events sequentially.
///
/// The basic APIs are:
/// 1. handle_command
/// 2. load
/// 3. lock_and_load
pub struct AggregateManager<E>
where
    E: EventStore,
{
    event_store: E,
}

impl<E> AggregateManager<E>
where
    E: EventStore,
{
    /// Creates a new instance of an [`AggregateManager`].
    pub fn new(event_store: E) -> Self {
        Self { event_store }
    }

    /// Validates and handles the command onto the given state, then passes the events to the store
    /// and finally applies the persisted events to the state.
    ///
    /// The state is only updated once the store acknowledged the append. If the command is rejected
    /// the state is left as it was.
    #[tracing::instrument(
        skip_all,
        fields(aggregate = <E::Aggregate as Aggregate>::NAME, aggregate_id = %aggregate_state.id())
    )]
    pub async fn handle_command(
        &self,
        aggregate_state: &mut AggregateState<<E::Aggregate as Aggregate>::State>,
        command: <E::Aggregate as Aggregate>::Command,
    ) -> Result<(), ManagerError<E>> {
        let events: Vec<<E::Aggregate as Aggregate>::Event> =
            <E::Aggregate as Aggregate>::handle_command(aggregate_state, command).map_err(CommandError::Rejected)?;

        if events.is_empty() {
            return Ok(());
        }

        let store_events = self
            .event_store
            .persist(aggregate_state, events)
            .await
            .map_err(CommandError::StorageUnavailable)?;

        tracing::debug!(events = store_events.len(), "events persisted");
        aggregate_state.apply_store_events(store_events, <E::Aggregate as Aggregate>::apply_event);

        Ok(())
    }

    /// Loads an aggregate instance from the event store, by applying previously persisted events onto
    /// the aggregate state by order of their sequence number.
    pub async fn load(
        &self,
        aggregate_id: &str,
    ) -> Result<Option<AggregateState<<E::Aggregate as Aggregate>::State>>, E::Error> {
        let store_events: Vec<StoreEvent<<E::Aggregate as Aggregate>::Event>> =
            self.event_store.by_aggregate_id(aggregate_id).await?;

        Ok(if store_events.is_empty() {
            None
        } else {
            let mut aggregate_state = AggregateState::with_id(aggregate_id);
            aggregate_state.apply_store_events(store_events, <E::Aggregate as Aggregate>::apply_event);
            Some(aggregate_state)
        })
    }

    /// Acquires a lock on this aggregate instance, and only then loads it from the event store,
    /// by applying previously persisted events onto the aggregate state by order of their sequence number.
    ///
    /// An aggregate without events is returned as a fresh state. The lock is contained in the returned
    /// `AggregateState`, and released when this is dropped or when its events are persisted.
    pub async fn lock_and_load(
        &self,
        aggregate_id: &str,
    ) -> Result<AggregateState<<E::Aggregate as Aggregate>::State>, E::Error> {
        let guard = self.event_store.lock(aggregate_id).await?;

        let mut aggregate_state = self
            .load(aggregate_id)
            .await?
            .unwrap_or_else(|| AggregateState::with_id(aggregate_id));
        aggregate_state.set_lock(guard);

        Ok(aggregate_state)
    }

    /// Returns the internal event store
    pub fn event_store(&self) -> &E {
        &self.event_store
    }
}
