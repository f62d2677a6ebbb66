use std::sync::Arc;
use std::time::Duration;

use ptu_usage::bus::EventSource;
use ptu_usage::EventStore;
use ptu_usage::consumption::ConsumerMessage;
use ptu_usage::offset::InMemoryOffsetStore;
use ptu_usage::publisher::{PublisherConfig, TopicProducer};
use ptu_usage::usage::{ProjectorConfig, UsageProjector, UsageRepository};

use super::Harness;

#[tokio::test]
async fn pipeline_restart_does_not_double_count_test() {
    let harness = Harness::new();

    let pipeline = harness.start().await;
    harness.ingest("consumer-1", "2018-04-01T00:10", 123).await;
    harness.eventually_usage("consumer-1", "2018-04-01", 0.123).await;
    pipeline.shutdown().await.unwrap();

    harness.ingest("consumer-1", "2018-04-01T00:20", 100).await;

    let pipeline = harness.start().await;
    harness.eventually_usage("consumer-1", "2018-04-01", 0.223).await;
    pipeline.shutdown().await.unwrap();

    // Every event was published exactly once.
    assert_eq!(harness.topic.len().await, 2);
}

#[tokio::test]
async fn republished_events_are_not_double_counted_test() {
    let harness = Harness::new();
    harness.ingest("consumer-1", "2018-04-01T00:10", 123).await;
    harness.ingest("consumer-1", "2018-04-01T00:20", 100).await;

    // A producer that lost its offsets publishes everything again.
    for _ in 0..2 {
        let producer: TopicProducer<_, _, _, ConsumerMessage> = TopicProducer::new(
            harness.store.clone(),
            InMemoryOffsetStore::new(),
            harness.topic.clone(),
            PublisherConfig::default(),
        );
        for shard in harness.store.shard_tagger().all_tags() {
            producer.publish_shard_batch(shard).await.unwrap();
        }
    }
    assert_eq!(harness.topic.len().await, 4);

    let projector = UsageProjector::new(harness.repository.clone(), ProjectorConfig::default());
    let mut source = harness.topic.subscribe("usage").await;
    for _ in 0..4 {
        let delivery = tokio::time::timeout(Duration::from_secs(1), source.receive())
            .await
            .unwrap()
            .unwrap();
        projector.process(&mut source, &delivery).await.unwrap();
    }

    let date = ptu_usage::ptu::parse_date("2018-04-01").unwrap();
    assert_eq!(harness.repository.usage("consumer-1", date).await.unwrap(), 223);
}

#[tokio::test]
async fn shutdown_waits_for_the_projector_test() {
    let harness = Arc::new(Harness::new());
    let pipeline = harness.start().await;

    for minute in 0..30 {
        harness
            .ingest("consumer-1", &format!("2018-04-01T01:{:02}", minute), 1)
            .await;
    }
    harness.eventually_usage("consumer-1", "2018-04-01", 0.03).await;

    pipeline.shutdown().await.unwrap();
    let committed = harness
        .topic
        .committed("usage", harness.topic.partition_for("consumer-1").await)
        .await;
    assert_eq!(committed, 30);
}
