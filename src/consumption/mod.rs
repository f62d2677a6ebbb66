//! Write side: one event sourced aggregate per consumer, keeping its consumption by PTU.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use api::*;
pub use service::*;
pub use state::*;

use crate::aggregate::Aggregate;
use crate::ptu::parse_timestamp;
use crate::state::AggregateState;

mod api;
mod service;
mod state;

pub struct ConsumerAggregate;

impl Aggregate for ConsumerAggregate {
    const NAME: &'static str = "consumer";
    type State = ConsumerState;
    type Command = ConsumerCommand;
    type Event = ConsumerEvent;
    type Error = ConsumerError;

    fn handle_command(
        state: &AggregateState<Self::State>,
        command: Self::Command,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ConsumerCommand::RecordConsumption { timestamp, consumption } => {
                let timestamp = parse_timestamp(&timestamp).map_err(|_| ConsumerError::InvalidTimestamp(timestamp))?;

                Ok(vec![ConsumerEvent::ConsumptionRecorded {
                    consumer_id: state.id().to_string(),
                    timestamp,
                    consumption,
                }])
            }
        }
    }

    fn apply_event(state: Self::State, payload: Self::Event) -> Self::State {
        match payload {
            ConsumerEvent::ConsumptionRecorded {
                timestamp, consumption, ..
            } => state.record(&timestamp, consumption),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerCommand {
    /// Adds `consumption` watts to the PTU containing `timestamp`, an ISO-8601 local date-time.
    RecordConsumption { timestamp: String, consumption: u32 },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ConsumerEvent {
    ConsumptionRecorded {
        consumer_id: String,
        #[serde(with = "crate::ptu::local_date_time")]
        timestamp: NaiveDateTime,
        consumption: u32,
    },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConsumerError {
    #[error("Invalid timestamp format : {0}")]
    InvalidTimestamp(String),
}
