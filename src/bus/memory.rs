use std::collections::HashMap;
use std::num::NonZeroU16;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};

use crate::bus::{Delivery, EventBus, EventSource};
use crate::shard::stable_hash;

#[derive(thiserror::Error, Debug)]
pub enum InMemoryBusError {
    /// Serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("partition {0} does not exist")]
    UnknownPartition(i32),
}

/// Partitioned topic kept in memory, with committed offsets per consumer group.
///
/// Records are never removed, and a message is assigned to a partition by hashing its key.
/// Cloning the topic gives another handle on the same records.
#[derive(Clone)]
pub struct InMemoryTopic {
    inner: Arc<InnerTopic>,
}

struct InnerTopic {
    partitions: Mutex<Vec<Vec<Record>>>,
    committed: Mutex<HashMap<(String, i32), i64>>,
    published: Notify,
}

#[derive(Clone)]
struct Record {
    key: String,
    payload: Vec<u8>,
}

impl InMemoryTopic {
    pub fn new(partitions: NonZeroU16) -> Self {
        Self {
            inner: Arc::new(InnerTopic {
                partitions: Mutex::new(vec![Vec::new(); usize::from(partitions.get())]),
                committed: Mutex::new(HashMap::new()),
                published: Notify::new(),
            }),
        }
    }

    /// Starts reading as a member of `group`, from the committed offsets of the group.
    pub async fn subscribe(&self, group: &str) -> InMemorySubscription {
        let partitions = self.inner.partitions.lock().await.len();
        let committed = self.inner.committed.lock().await;

        let positions = (0..partitions)
            .map(|partition| {
                committed
                    .get(&(group.to_string(), partition as i32))
                    .copied()
                    .unwrap_or(0)
            })
            .collect();

        InMemorySubscription {
            topic: self.clone(),
            group: group.to_string(),
            positions,
            next_partition: 0,
        }
    }

    /// Total number of records, over every partition.
    pub async fn len(&self) -> usize {
        self.inner.partitions.lock().await.iter().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Payloads of one partition, in order.
    pub async fn payloads(&self, partition: i32) -> Vec<Vec<u8>> {
        let partitions = self.inner.partitions.lock().await;
        usize::try_from(partition)
            .ok()
            .and_then(|index| partitions.get(index))
            .map(|records| records.iter().map(|record| record.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Next offset `group` will read on `partition`.
    pub async fn committed(&self, group: &str, partition: i32) -> i64 {
        let committed = self.inner.committed.lock().await;
        committed.get(&(group.to_string(), partition)).copied().unwrap_or(0)
    }

    /// Partition receiving the messages published with `key`.
    pub async fn partition_for(&self, key: &str) -> i32 {
        let partitions = self.inner.partitions.lock().await.len() as u64;
        (stable_hash(key) % partitions) as i32
    }

    /// Appends a raw payload, as a producer that does not share the message type would.
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) {
        let partition = self.partition_for(key).await as usize;

        let mut partitions = self.inner.partitions.lock().await;
        partitions[partition].push(Record {
            key: key.to_string(),
            payload,
        });
        drop(partitions);

        self.inner.published.notify_waiters();
    }
}

impl Default for InMemoryTopic {
    fn default() -> Self {
        Self::new(NonZeroU16::new(3).unwrap_or(NonZeroU16::MIN))
    }
}

#[async_trait]
impl<M> EventBus<M> for InMemoryTopic
where
    M: Serialize + Sync,
{
    type Error = InMemoryBusError;

    async fn publish(&self, key: &str, message: &M) -> Result<(), Self::Error> {
        let payload: Vec<u8> = serde_json::to_vec(message)?;
        self.publish_raw(key, payload).await;
        Ok(())
    }
}

/// Reader of an [`InMemoryTopic`] for one consumer group.
pub struct InMemorySubscription {
    topic: InMemoryTopic,
    group: String,
    positions: Vec<i64>,
    next_partition: usize,
}

impl InMemorySubscription {
    async fn poll(&mut self) -> Option<Delivery> {
        let partitions = self.topic.inner.partitions.lock().await;

        for step in 0..partitions.len() {
            let partition = (self.next_partition + step) % partitions.len();
            let offset = self.positions[partition];

            if let Some(record) = partitions[partition].get(offset as usize) {
                self.positions[partition] = offset + 1;
                self.next_partition = (partition + 1) % partitions.len();

                return Some(Delivery {
                    partition: partition as i32,
                    offset,
                    key: Some(record.key.clone()),
                    payload: record.payload.clone(),
                });
            }
        }

        None
    }
}

#[async_trait]
impl EventSource for InMemorySubscription {
    type Error = InMemoryBusError;

    async fn receive(&mut self) -> Result<Delivery, Self::Error> {
        let topic = self.topic.clone();

        loop {
            let notified = topic.inner.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.poll().await {
                return Ok(delivery);
            }

            notified.await;
        }
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<(), Self::Error> {
        if delivery.partition < 0 || delivery.partition as usize >= self.positions.len() {
            return Err(InMemoryBusError::UnknownPartition(delivery.partition));
        }

        let mut committed = self.topic.inner.committed.lock().await;
        let next = committed.entry((self.group.clone(), delivery.partition)).or_insert(0);
        *next = (*next).max(delivery.offset + 1);

        Ok(())
    }
}
