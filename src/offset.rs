use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::shard::ShardTag;
use crate::types::Offset;

/// Durable cursor of a stream over the event log: the offset of the last event of each shard that
/// has been fully handled.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Last committed offset for `shard` of `stream`, `None` when nothing was committed yet.
    async fn load(&self, stream: &str, shard: ShardTag) -> Result<Option<Offset>, Self::Error>;

    /// Commits `offset` for `shard` of `stream`.
    async fn save(&self, stream: &str, shard: ShardTag, offset: Offset) -> Result<(), Self::Error>;
}

/// Offsets kept in memory, shared between clones.
#[derive(Clone, Debug, Default)]
pub struct InMemoryOffsetStore {
    offsets: Arc<Mutex<HashMap<(String, ShardTag), Offset>>>,
}

impl InMemoryOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OffsetStore for InMemoryOffsetStore {
    type Error = Infallible;

    async fn load(&self, stream: &str, shard: ShardTag) -> Result<Option<Offset>, Self::Error> {
        let offsets = self.offsets.lock().await;
        Ok(offsets.get(&(stream.to_string(), shard)).copied())
    }

    async fn save(&self, stream: &str, shard: ShardTag, offset: Offset) -> Result<(), Self::Error> {
        let mut offsets = self.offsets.lock().await;
        offsets.insert((stream.to_string(), shard), offset);
        Ok(())
    }
}
