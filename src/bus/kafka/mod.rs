use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::Serialize;

pub use config::{KafkaEventBusConfig, KafkaEventSourceConfig, Security};
pub use error::KafkaEventBusError;
pub use source::KafkaEventSource;

use crate::bus::EventBus;

mod config;
mod error;
mod source;

/// The [`KafkaEventBus`] provides an implementation of the `EventBus` trait for publishing messages
/// using Apache Kafka as the underlying messaging system.
///
/// The message key is used as the Kafka record key, so that Kafka keeps every message of a key on
/// the same partition.
pub struct KafkaEventBus {
    producer: FutureProducer,
    topic: String,
    request_timeout: Duration,
}

impl KafkaEventBus {
    pub async fn new(config: KafkaEventBusConfig<'_>) -> Result<KafkaEventBus, KafkaEventBusError> {
        let mut client_config: ClientConfig = config.client_config.unwrap_or_default();
        client_config
            .set("metadata.broker.list", config.broker_url_list)
            .set("request.timeout.ms", config.request_timeout.to_string())
            .set("enable.idempotence", "true");

        if let Some(security) = config.security {
            security.apply(&mut client_config);
        }

        Ok(Self {
            producer: client_config.create()?,
            topic: config.topic.to_string(),
            request_timeout: Duration::from_millis(config.request_timeout),
        })
    }
}

#[async_trait]
impl<M> EventBus<M> for KafkaEventBus
where
    M: Serialize + Sync,
{
    type Error = KafkaEventBusError;

    async fn publish(&self, key: &str, message: &M) -> Result<(), Self::Error> {
        let bytes: Vec<u8> = serde_json::to_vec(message)?;

        let (partition, offset) = self
            .producer
            .send(
                FutureRecord::<str, Vec<u8>>::to(self.topic.as_str())
                    .key(key)
                    .payload(&bytes),
                self.request_timeout,
            )
            .await?;

        tracing::debug!(topic = %self.topic, partition, offset, "kafka delivery acknowledged");

        Ok(())
    }
}
