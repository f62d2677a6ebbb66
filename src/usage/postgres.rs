use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Transaction};

use crate::types::SequenceNumber;
use crate::usage::{IncrementOutcome, UsageIncrement, UsageRepository};

/// [`UsageRepository`] persisting on Postgres.
///
/// The watermark check and the counter update run in the same transaction, so a redelivered
/// increment can never be added twice.
#[derive(Clone, Debug)]
pub struct PgUsageRepository {
    pool: Pool<Postgres>,
}

impl PgUsageRepository {
    /// Creates the repository, creating its tables if missing.
    pub async fn try_new(pool: Pool<Postgres>) -> Result<Self, sqlx::Error> {
        let mut transaction: Transaction<Postgres> = pool.begin().await?;

        for migration in [
            include_str!("../sql/postgres/usage/create_usage_table.sql"),
            include_str!("../sql/postgres/usage/create_watermarks_table.sql"),
        ] {
            let _ = sqlx::query(migration).execute(&mut *transaction).await?;
        }

        transaction.commit().await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    type Error = sqlx::Error;

    async fn increment(&self, increment: &UsageIncrement) -> Result<IncrementOutcome, Self::Error> {
        let mut transaction: Transaction<Postgres> = self.pool.begin().await?;

        if let Some(sequence_number) = increment.sequence_number {
            let advanced: Option<SequenceNumber> =
                sqlx::query_scalar(include_str!("../sql/postgres/usage/advance_watermark.sql"))
                    .bind(increment.consumer_id.as_str())
                    .bind(sequence_number)
                    .fetch_optional(&mut *transaction)
                    .await?;

            if advanced.is_none() {
                transaction.rollback().await?;
                return Ok(IncrementOutcome::Duplicate);
            }
        }

        let _ = sqlx::query(include_str!("../sql/postgres/usage/increment.sql"))
            .bind(increment.consumer_id.as_str())
            .bind(increment.date)
            .bind(i64::try_from(increment.watts).unwrap_or(i64::MAX))
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(IncrementOutcome::Applied)
    }

    async fn usage(&self, consumer_id: &str, date: NaiveDate) -> Result<u64, Self::Error> {
        let watts: Option<i64> = sqlx::query_scalar(include_str!("../sql/postgres/usage/select_usage.sql"))
            .bind(consumer_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(watts.map(|watts| u64::try_from(watts).unwrap_or(0)).unwrap_or(0))
    }
}
