//! Per-consumer energy consumption, event sourced and bucketed by PTU, with a sharded projection
//! into daily usage.
//!
//! The write side is an [`Aggregate`] per consumer, driven through an [`registry::EntityRegistry`]
//! that serializes commands per consumer id. The event log is published shard by shard by a
//! [`publisher::TopicProducer`] and folded into daily counters by a [`usage::UsageProjector`].

pub use crate::aggregate::Aggregate;
pub use crate::manager::{AggregateManager, CommandError};
pub use crate::state::AggregateState;
pub use crate::store::{EventStore, StoreEvent};

pub mod aggregate;
pub mod bus;
pub mod consumption;
pub mod event;
pub mod manager;
pub mod offset;
pub mod pipeline;
pub mod ptu;
pub mod publisher;
pub mod registry;
pub mod shard;
#[cfg(feature = "postgres")]
pub mod sql;
pub mod state;
pub mod store;
pub mod types;
pub mod usage;
