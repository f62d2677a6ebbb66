//! Read side: daily usage per consumer, projected from the published consumption messages.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

pub use projector::*;
pub use service::*;

use crate::types::SequenceNumber;

#[cfg(feature = "postgres")]
pub mod postgres;
mod projector;
mod service;

/// Watts to add to the usage of a consumer on a day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageIncrement {
    pub consumer_id: String,
    pub date: NaiveDate,
    pub watts: u64,
    /// Position of the originating event in the consumer history. Increments without one are
    /// always applied.
    pub sequence_number: Option<SequenceNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    Applied,
    /// The sequence number was already applied for this consumer. Nothing changed.
    Duplicate,
}

/// Storage of the daily usage counters.
#[async_trait]
pub trait UsageRepository: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Adds the increment to its counter, unless its sequence number is not above the highest one
    /// already applied for the consumer. Checking and adding happen atomically.
    async fn increment(&self, increment: &UsageIncrement) -> Result<IncrementOutcome, Self::Error>;

    /// Watts recorded for `consumer_id` on `date`, 0 when nothing was recorded.
    async fn usage(&self, consumer_id: &str, date: NaiveDate) -> Result<u64, Self::Error>;
}

#[async_trait]
impl<R> UsageRepository for Arc<R>
where
    R: UsageRepository + ?Sized,
{
    type Error = R::Error;

    async fn increment(&self, increment: &UsageIncrement) -> Result<IncrementOutcome, Self::Error> {
        self.as_ref().increment(increment).await
    }

    async fn usage(&self, consumer_id: &str, date: NaiveDate) -> Result<u64, Self::Error> {
        self.as_ref().usage(consumer_id, date).await
    }
}

/// Usage counters kept in memory, shared between clones.
#[derive(Clone, Debug, Default)]
pub struct InMemoryUsageRepository {
    inner: Arc<Mutex<Counters>>,
}

#[derive(Debug, Default)]
struct Counters {
    usage: HashMap<(String, NaiveDate), u64>,
    watermarks: HashMap<String, SequenceNumber>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    type Error = Infallible;

    async fn increment(&self, increment: &UsageIncrement) -> Result<IncrementOutcome, Self::Error> {
        let mut counters = self.inner.lock().await;

        if let Some(sequence_number) = increment.sequence_number {
            let applied = counters.watermarks.get(&increment.consumer_id).copied();
            if matches!(applied, Some(applied) if applied >= sequence_number) {
                return Ok(IncrementOutcome::Duplicate);
            }
            counters
                .watermarks
                .insert(increment.consumer_id.clone(), sequence_number);
        }

        *counters
            .usage
            .entry((increment.consumer_id.clone(), increment.date))
            .or_insert(0) += increment.watts;

        Ok(IncrementOutcome::Applied)
    }

    async fn usage(&self, consumer_id: &str, date: NaiveDate) -> Result<u64, Self::Error> {
        let counters = self.inner.lock().await;
        Ok(counters
            .usage
            .get(&(consumer_id.to_string(), date))
            .copied()
            .unwrap_or(0))
    }
}
