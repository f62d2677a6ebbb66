use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::consumption::ConsumerEvent;
use crate::store::StoreEvent;
use crate::types::SequenceNumber;

/// Ingestion request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Consumption {
    pub consumer_id: String,
    /// ISO-8601 local date-time.
    pub timestamp: String,
    /// Watts.
    pub consumption: u32,
}

/// Point query for the PTU containing `timestamp`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionQuery {
    pub consumer_id: String,
    pub timestamp: String,
}

/// Message published on the consumption topic, keyed by consumer id.
///
/// Types this version does not know about decode as [`ConsumerMessage::Unknown`] so that
/// subscribers can skip them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ConsumerMessage {
    #[serde(rename = "consumption-recorded", rename_all = "camelCase")]
    ConsumptionRecorded {
        consumer_id: String,
        #[serde(with = "crate::ptu::local_date_time")]
        timestamp: NaiveDateTime,
        consumption: u32,
        /// Sequence number of the event within the consumer history, used to drop redeliveries.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<SequenceNumber>,
    },
    #[serde(other)]
    Unknown,
}

impl From<&StoreEvent<ConsumerEvent>> for ConsumerMessage {
    fn from(store_event: &StoreEvent<ConsumerEvent>) -> Self {
        match &store_event.payload {
            ConsumerEvent::ConsumptionRecorded {
                consumer_id,
                timestamp,
                consumption,
            } => Self::ConsumptionRecorded {
                consumer_id: consumer_id.clone(),
                timestamp: *timestamp,
                consumption: *consumption,
                sequence_number: Some(store_event.sequence_number),
            },
        }
    }
}
