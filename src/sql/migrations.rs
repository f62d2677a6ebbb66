use sqlx::postgres::PgQueryResult;
use sqlx::{Error, Pool, Postgres, Transaction};

use crate::aggregate::Aggregate;
use crate::statement;

pub struct Migrations;

impl Migrations {
    /// Creates the event table of `A` and its indexes, if missing.
    pub async fn run<A>(pool: &Pool<Postgres>) -> Result<(), Error>
    where
        A: Aggregate,
    {
        let mut transaction: Transaction<Postgres> = pool.begin().await?;

        let migrations: Vec<String> = vec![
            statement!("postgres/migrations/01_create_table.sql", A),
            statement!("postgres/migrations/02_create_index.sql", A),
            statement!("postgres/migrations/03_create_unique_constraint.sql", A),
            statement!("postgres/migrations/04_create_shard_index.sql", A),
        ];

        for migration in migrations {
            let _: PgQueryResult = sqlx::query(migration.as_str()).execute(&mut *transaction).await?;
        }

        transaction.commit().await
    }
}
