use serde::{Deserialize, Serialize};

use crate::ptu::parse_date;
use crate::usage::UsageRepository;

/// Daily usage query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuery {
    pub consumer_id: String,
    /// ISO-8601 calendar date.
    pub date: String,
}

#[derive(thiserror::Error, Debug)]
pub enum UsageError {
    #[error("Invalid date format : {0}")]
    InvalidDate(String),
    #[error("usage storage unavailable: {0}")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Answers daily usage queries from the projected counters. The answer may lag behind the latest
/// ingested consumptions.
pub struct UsageService<R> {
    repository: R,
}

impl<R> UsageService<R>
where
    R: UsageRepository,
{
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Usage of the consumer on the queried day, in kilowatts.
    pub async fn query_usage(&self, query: &UsageQuery) -> Result<f64, UsageError> {
        let date = parse_date(&query.date).map_err(|_| UsageError::InvalidDate(query.date.clone()))?;

        let watts = self
            .repository
            .usage(&query.consumer_id, date)
            .await
            .map_err(|error| UsageError::StorageUnavailable(Box::new(error)))?;

        Ok(watts as f64 / 1000.0)
    }
}
