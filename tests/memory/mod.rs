use std::sync::Arc;
use std::time::Duration;

use ptu_usage::bus::memory::InMemoryTopic;
use ptu_usage::consumption::{Consumption, ConsumptionQuery, ConsumptionService, ConsumerAggregate, ConsumerMessage};
use ptu_usage::offset::InMemoryOffsetStore;
use ptu_usage::pipeline::Pipeline;
use ptu_usage::publisher::{PublisherConfig, TopicProducer};
use ptu_usage::store::memory::InMemoryStore;
use ptu_usage::usage::{InMemoryUsageRepository, ProjectorConfig, UsageProjector, UsageQuery, UsageService};

mod restart;

type Store = InMemoryStore<ConsumerAggregate>;

pub struct Harness {
    pub store: Store,
    pub topic: InMemoryTopic,
    pub offsets: InMemoryOffsetStore,
    pub repository: InMemoryUsageRepository,
    pub consumption: ConsumptionService<Store>,
    pub usage: UsageService<InMemoryUsageRepository>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Store::default();
        let repository = InMemoryUsageRepository::new();

        Self {
            consumption: ConsumptionService::new(store.clone()),
            usage: UsageService::new(repository.clone()),
            store,
            topic: InMemoryTopic::default(),
            offsets: InMemoryOffsetStore::new(),
            repository,
        }
    }

    pub async fn start(&self) -> Pipeline {
        let config = PublisherConfig::builder().poll_interval(Duration::from_millis(5)).build();
        let producer: TopicProducer<_, _, _, ConsumerMessage> =
            TopicProducer::new(self.store.clone(), self.offsets.clone(), self.topic.clone(), config);
        let projector = UsageProjector::new(self.repository.clone(), ProjectorConfig::default());

        Pipeline::start(
            Arc::new(producer),
            Arc::new(projector),
            self.topic.subscribe("usage").await,
        )
    }

    pub async fn ingest(&self, consumer_id: &str, timestamp: &str, consumption: u32) {
        self.consumption
            .ingest(&Consumption {
                consumer_id: consumer_id.to_string(),
                timestamp: timestamp.to_string(),
                consumption,
            })
            .await
            .unwrap();
    }

    pub async fn ptu_value(&self, consumer_id: &str, timestamp: &str) -> u64 {
        self.consumption
            .query(&ConsumptionQuery {
                consumer_id: consumer_id.to_string(),
                timestamp: timestamp.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn usage(&self, consumer_id: &str, date: &str) -> f64 {
        self.usage
            .query_usage(&UsageQuery {
                consumer_id: consumer_id.to_string(),
                date: date.to_string(),
            })
            .await
            .unwrap()
    }

    /// Waits for the projection to reach `expected` kilowatts.
    pub async fn eventually_usage(&self, consumer_id: &str, date: &str, expected: f64) {
        let reached = tokio::time::timeout(Duration::from_secs(10), async {
            while self.usage(consumer_id, date).await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        assert!(
            reached.is_ok(),
            "usage of {} on {} is {} instead of {}",
            consumer_id,
            date,
            self.usage(consumer_id, date).await,
            expected
        );
    }
}

#[tokio::test]
async fn usage_follows_ingestion_test() {
    let harness = Harness::new();
    let pipeline = harness.start().await;

    harness.eventually_usage("consumer-1", "2018-04-01", 0.0).await;
    harness.ingest("consumer-1", "2018-04-01T00:10", 123).await;
    harness.eventually_usage("consumer-1", "2018-04-01", 0.123).await;
    harness.ingest("consumer-1", "2018-04-01T00:20", 100).await;
    harness.eventually_usage("consumer-1", "2018-04-01", 0.223).await;
    harness.eventually_usage("consumer-2", "2018-04-01", 0.0).await;
    harness.ingest("consumer-1", "2018-04-02T00:20", 100).await;
    harness.eventually_usage("consumer-1", "2018-04-02", 0.1).await;
    harness.eventually_usage("consumer-1", "2018-04-01", 0.223).await;

    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn point_queries_are_read_your_writes_test() {
    let harness = Harness::new();

    harness.ingest("consumer-1", "2018-04-01T00:10", 123).await;
    assert_eq!(harness.ptu_value("consumer-1", "2018-04-01T00:00").await, 123);
    harness.ingest("consumer-1", "2018-04-01T00:20", 100).await;
    assert_eq!(harness.ptu_value("consumer-1", "2018-04-01T00:00").await, 223);
    assert_eq!(harness.ptu_value("consumer-1", "2018-04-01T00:30").await, 0);
    assert_eq!(harness.ptu_value("consumer-2", "2018-04-01T00:00").await, 0);
}

#[tokio::test]
async fn many_consumers_in_parallel_test() {
    let harness = Arc::new(Harness::new());
    let pipeline = harness.start().await;

    let writers: Vec<_> = (0..8)
        .map(|house| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move {
                let consumer_id = format!("House-{}", house);
                for minute in 0..48u32 {
                    let timestamp = format!("2017-09-20T{:02}:{:02}", minute / 2, (minute % 2) * 30);
                    harness.ingest(&consumer_id, &timestamp, house + 1).await;
                }
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap();
    }

    for house in 0..8u32 {
        let consumer_id = format!("House-{}", house);
        let expected = f64::from(48 * (house + 1)) / 1000.0;
        harness.eventually_usage(&consumer_id, "2017-09-20", expected).await;
        assert_eq!(harness.ptu_value(&consumer_id, "2017-09-20T23:45").await, u64::from(house + 1));
    }

    assert_eq!(harness.store.len().await, 8 * 48);
    pipeline.shutdown().await.unwrap();
}
