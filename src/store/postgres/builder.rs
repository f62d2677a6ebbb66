use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::aggregate::Aggregate;
use crate::shard::ShardTagger;
use crate::sql::migrations::Migrations;
use crate::sql::statements::Statements;
use crate::store::postgres::{InnerPgStore, PgStore};

/// Struct used to build a brand new [`PgStore`].
pub struct PgStoreBuilder<A>
where
    A: Aggregate,
{
    pool: Pool<Postgres>,
    statements: Statements,
    tagger: ShardTagger,
    run_migrations: bool,
    _aggregate: PhantomData<A>,
}

impl<A> PgStoreBuilder<A>
where
    A: Aggregate,
{
    /// Creates a new instance of a [`PgStoreBuilder`].
    pub fn new(pool: Pool<Postgres>) -> PgStoreBuilder<A> {
        PgStoreBuilder {
            pool,
            statements: Statements::new::<A>(),
            tagger: ShardTagger::default(),
            run_migrations: true,
            _aggregate: PhantomData,
        }
    }

    /// Set the tagger used to assign persisted events to shards. Every process writing to the same
    /// table must use the same shard count.
    pub fn with_shard_tagger(mut self, tagger: ShardTagger) -> Self {
        self.tagger = tagger;
        self
    }

    /// Calling this function the caller avoid running migrations. It is recommend to run migrations
    /// at least once per store per startup.
    pub fn without_running_migrations(mut self) -> Self {
        self.run_migrations = false;
        self
    }

    /// This function runs all the needed [`Migrations`], atomically setting up the database if
    /// `run_migrations` isn't explicitly set to false. [`Migrations`] should be run only at application
    /// startup due to avoid performance issues.
    ///
    /// Eventually returns an instance of PgStore.
    ///
    /// # Errors
    ///
    /// Will return an `Err` if there's an error running [`Migrations`].
    pub async fn try_build(self) -> Result<PgStore<A>, sqlx::Error> {
        if self.run_migrations {
            Migrations::run::<A>(&self.pool).await?;
        }

        Ok(PgStore {
            inner: Arc::new(InnerPgStore {
                pool: self.pool,
                statements: self.statements,
                tagger: self.tagger,
            }),
            _aggregate: PhantomData,
        })
    }
}
