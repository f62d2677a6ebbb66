use std::sync::Arc;
use std::time::Duration;

use sqlx::{Pool, Postgres};

use ptu_usage::bus::memory::InMemoryTopic;
use ptu_usage::consumption::{Consumption, ConsumptionService, ConsumerAggregate, ConsumerMessage};
use ptu_usage::pipeline::Pipeline;
use ptu_usage::publisher::{PublisherConfig, TopicProducer};
use ptu_usage::store::postgres::{PgOffsetStore, PgStore, PgStoreBuilder};
use ptu_usage::usage::postgres::PgUsageRepository;
use ptu_usage::usage::{ProjectorConfig, UsageProjector, UsageQuery, UsageService};

async fn start(pool: &Pool<Postgres>, store: &PgStore<ConsumerAggregate>, topic: &InMemoryTopic) -> Pipeline {
    let offsets = PgOffsetStore::try_new(pool.clone()).await.unwrap();
    let repository = PgUsageRepository::try_new(pool.clone()).await.unwrap();

    let config = PublisherConfig::builder().poll_interval(Duration::from_millis(10)).build();
    let producer: TopicProducer<_, _, _, ConsumerMessage> =
        TopicProducer::new(store.clone(), offsets, topic.clone(), config);
    let projector = UsageProjector::new(repository, ProjectorConfig::default());

    Pipeline::start(Arc::new(producer), Arc::new(projector), topic.subscribe("usage").await)
}

async fn eventually_usage(usage: &UsageService<PgUsageRepository>, expected: f64) {
    let query = UsageQuery {
        consumer_id: "consumer-1".to_string(),
        date: "2018-04-01".to_string(),
    };

    let reached = tokio::time::timeout(Duration::from_secs(10), async {
        while usage.query_usage(&query).await.unwrap() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(reached.is_ok(), "usage never reached {}", expected);
}

#[sqlx::test]
async fn offsets_and_watermarks_survive_a_restart_test(pool: Pool<Postgres>) {
    let store: PgStore<ConsumerAggregate> = PgStoreBuilder::new(pool.clone()).try_build().await.unwrap();
    let consumption = ConsumptionService::new(store.clone());
    let usage = UsageService::new(PgUsageRepository::try_new(pool.clone()).await.unwrap());
    let topic = InMemoryTopic::default();

    let record = |timestamp: &str, consumption: u32| Consumption {
        consumer_id: "consumer-1".to_string(),
        timestamp: timestamp.to_string(),
        consumption,
    };

    let pipeline = start(&pool, &store, &topic).await;
    consumption.ingest(&record("2018-04-01T00:10", 123)).await.unwrap();
    eventually_usage(&usage, 0.123).await;
    pipeline.shutdown().await.unwrap();

    consumption.ingest(&record("2018-04-01T00:20", 100)).await.unwrap();

    let pipeline = start(&pool, &store, &topic).await;
    eventually_usage(&usage, 0.223).await;
    pipeline.shutdown().await.unwrap();

    assert_eq!(topic.len().await, 2);
}
