use async_trait::async_trait;
use serde::Serialize;

pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

/// The responsibility of the [`EventBus`] trait is to publish a message on a specific, partitioned,
/// bus implementation.
#[async_trait]
pub trait EventBus<M>: Send + Sync
where
    M: Serialize + Sync,
{
    type Error: std::error::Error + Send + Sync + 'static;

    /// Publishes `message` on the partition chosen by `key`. Messages sharing a key keep their
    /// relative order.
    ///
    /// Resolves only once the bus acknowledged the message.
    async fn publish(&self, key: &str, message: &M) -> Result<(), Self::Error>;
}

/// A record received from an [`EventSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Subscription to a partitioned bus with at-least-once delivery.
///
/// Records that were received but not committed are delivered again to the next subscription of
/// the same group.
#[async_trait]
pub trait EventSource: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for the next record. Dropping the returned future before it completes loses nothing.
    async fn receive(&mut self) -> Result<Delivery, Self::Error>;

    /// Marks `delivery`, and every record before it on the same partition, as handled.
    async fn commit(&mut self, delivery: &Delivery) -> Result<(), Self::Error>;
}
