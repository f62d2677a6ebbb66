use rdkafka::error::KafkaError;
use rdkafka::message::OwnedMessage;

#[derive(thiserror::Error, Debug)]
pub enum KafkaEventBusError {
    /// Serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Kafka(#[from] KafkaError),
}

impl From<(KafkaError, OwnedMessage)> for KafkaEventBusError {
    fn from((error, _): (KafkaError, OwnedMessage)) -> Self {
        Self::Kafka(error)
    }
}
