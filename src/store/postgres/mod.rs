pub use builder::*;
pub use event_store::*;
pub use offset::*;

mod builder;
mod event_store;
mod offset;

#[derive(thiserror::Error, Debug)]
pub enum PgStoreError {
    /// Sql error
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    /// Serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Another writer already appended an event with this sequence number.
    #[error("sequence number {sequence_number} already taken for aggregate {aggregate_id}")]
    SequenceConflict {
        aggregate_id: String,
        sequence_number: crate::types::SequenceNumber,
    },
    /// A stored shard tag that does not fit a [`crate::shard::ShardTag`].
    #[error("invalid shard {0} in the event log")]
    InvalidShard(i32),
}
