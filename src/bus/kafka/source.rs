use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message, Offset, TopicPartitionList};

use crate::bus::kafka::{KafkaEventBusError, KafkaEventSourceConfig};
use crate::bus::{Delivery, EventSource};

/// Kafka consumer committing offsets by hand, once each record is handled.
pub struct KafkaEventSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaEventSource {
    pub fn new(config: KafkaEventSourceConfig<'_>) -> Result<Self, KafkaEventBusError> {
        let mut client_config: ClientConfig = config.client_config.unwrap_or_default();
        client_config
            .set("metadata.broker.list", config.broker_url_list)
            .set("group.id", config.group_id)
            .set("session.timeout.ms", config.session_timeout.to_string())
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest");

        if let Some(security) = config.security {
            security.apply(&mut client_config);
        }

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[config.topic])?;

        Ok(Self {
            consumer,
            topic: config.topic.to_string(),
        })
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    type Error = KafkaEventBusError;

    async fn receive(&mut self) -> Result<Delivery, Self::Error> {
        let message = self.consumer.recv().await?;

        Ok(Delivery {
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|key| String::from_utf8_lossy(key).into_owned()),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<(), Self::Error> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(&self.topic, delivery.partition, Offset::Offset(delivery.offset + 1))?;
        self.consumer.commit(&offsets, CommitMode::Sync)?;

        Ok(())
    }
}
