use std::time::Duration;

use uuid::Uuid;

use ptu_usage::bus::kafka::{KafkaEventBus, KafkaEventBusConfig, KafkaEventSource, KafkaEventSourceConfig};
use ptu_usage::bus::{EventBus, EventSource};
use ptu_usage::consumption::ConsumerMessage;

fn message(consumer_id: &str, sequence_number: i32) -> ConsumerMessage {
    ConsumerMessage::ConsumptionRecorded {
        consumer_id: consumer_id.to_string(),
        timestamp: ptu_usage::ptu::parse_timestamp("2018-04-01T00:10").unwrap(),
        consumption: 123,
        sequence_number: Some(sequence_number),
    }
}

#[tokio::test]
async fn kafka_event_bus_test() {
    let kafka_broker_url: String = std::env::var("KAFKA_BROKERS_URL").unwrap();
    let topic = format!("usage-{}", Uuid::new_v4());
    let group_id = Uuid::new_v4().to_string();

    let config: KafkaEventBusConfig = KafkaEventBusConfig::builder()
        .broker_url_list(kafka_broker_url.as_str())
        .topic(topic.as_str())
        .build();

    let bus: KafkaEventBus = match KafkaEventBus::new(config).await {
        Ok(bus) => bus,
        Err(error) => panic!("{:?}", error),
    };

    bus.publish("consumer-1", &message("consumer-1", 1)).await.unwrap();
    bus.publish("consumer-1", &message("consumer-1", 2)).await.unwrap();

    let config: KafkaEventSourceConfig = KafkaEventSourceConfig::builder()
        .broker_url_list(kafka_broker_url.as_str())
        .topic(topic.as_str())
        .group_id(group_id.as_str())
        .build();
    let mut source = KafkaEventSource::new(config).unwrap();

    for expected in 1..=2 {
        let delivery = tokio::time::timeout(Duration::from_secs(30), source.receive())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(delivery.key.as_deref(), Some("consumer-1"));
        let received: ConsumerMessage = serde_json::from_slice(&delivery.payload).unwrap();
        assert_eq!(received, message("consumer-1", expected));

        source.commit(&delivery).await.unwrap();
    }
}
