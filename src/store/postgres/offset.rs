use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::offset::OffsetStore;
use crate::shard::ShardTag;
use crate::types::Offset;

/// [`OffsetStore`] persisting on the `stream_offsets` Postgres table.
#[derive(Clone, Debug)]
pub struct PgOffsetStore {
    pool: Pool<Postgres>,
}

impl PgOffsetStore {
    /// Creates the store, creating the offsets table if missing.
    pub async fn try_new(pool: Pool<Postgres>) -> Result<Self, sqlx::Error> {
        let _ = sqlx::query(include_str!("../../sql/postgres/offsets/create_table.sql"))
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl OffsetStore for PgOffsetStore {
    type Error = sqlx::Error;

    async fn load(&self, stream: &str, shard: ShardTag) -> Result<Option<Offset>, Self::Error> {
        sqlx::query_scalar(include_str!("../../sql/postgres/offsets/select.sql"))
            .bind(stream)
            .bind(i32::from(shard.index()))
            .fetch_optional(&self.pool)
            .await
    }

    async fn save(&self, stream: &str, shard: ShardTag, offset: Offset) -> Result<(), Self::Error> {
        let _ = sqlx::query(include_str!("../../sql/postgres/offsets/upsert.sql"))
            .bind(stream)
            .bind(i32::from(shard.index()))
            .bind(offset)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
