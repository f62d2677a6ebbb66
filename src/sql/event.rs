use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::event::Event;
use crate::shard::ShardTag;
use crate::store::postgres::PgStoreError;
use crate::store::StoreEvent;
use crate::types::{Offset, SequenceNumber};

/// Event representation on the event store
#[derive(sqlx::FromRow, Debug)]
pub struct DbEvent {
    pub id: Uuid,
    pub aggregate_id: String,
    pub payload: Value,
    pub occurred_on: DateTime<Utc>,
    pub sequence_number: SequenceNumber,
    pub global_offset: Offset,
    pub shard: i32,
}

impl DbEvent {
    pub fn try_into_store_event<E: Event>(self) -> Result<StoreEvent<E>, PgStoreError> {
        let shard = u16::try_from(self.shard).map_err(|_| PgStoreError::InvalidShard(self.shard))?;

        Ok(StoreEvent {
            id: self.id,
            aggregate_id: self.aggregate_id,
            payload: serde_json::from_value::<E>(self.payload)?,
            occurred_on: self.occurred_on,
            sequence_number: self.sequence_number,
            offset: self.global_offset,
            shard: ShardTag::new(shard),
        })
    }
}
