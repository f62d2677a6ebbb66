//! Records random readings for a few houses and follows the daily usage as the pipeline projects it.
//!
//! Run with `RUST_LOG=ptu_usage=debug` to see the publication and projection loops at work.
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as TimeDelta, NaiveDate};
use rand::Rng;
use tracing_subscriber::EnvFilter;

use ptu_usage::bus::memory::InMemoryTopic;
use ptu_usage::consumption::{Consumption, ConsumptionQuery, ConsumptionService, ConsumerAggregate, ConsumerMessage};
use ptu_usage::offset::InMemoryOffsetStore;
use ptu_usage::pipeline::Pipeline;
use ptu_usage::publisher::{PublisherConfig, TopicProducer};
use ptu_usage::store::memory::InMemoryStore;
use ptu_usage::usage::{InMemoryUsageRepository, ProjectorConfig, UsageProjector, UsageQuery, UsageService};

const HOUSES: u32 = 5;
const READINGS_PER_HOUSE: u32 = 96;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let store: InMemoryStore<ConsumerAggregate> = InMemoryStore::default();
    let topic = InMemoryTopic::default();
    let repository = InMemoryUsageRepository::new();

    let consumption = ConsumptionService::new(store.clone());
    let usage = UsageService::new(repository.clone());

    let config = PublisherConfig::builder().poll_interval(Duration::from_millis(50)).build();
    let producer: TopicProducer<_, _, _, ConsumerMessage> =
        TopicProducer::new(store.clone(), InMemoryOffsetStore::new(), topic.clone(), config);
    let projector = UsageProjector::new(repository, ProjectorConfig::default());
    let pipeline = Pipeline::start(Arc::new(producer), Arc::new(projector), topic.subscribe("usage").await);

    let day = NaiveDate::from_ymd_opt(2017, 9, 20)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("valid start of day");
    let mut rng = rand::thread_rng();
    let mut expected = vec![0u64; HOUSES as usize];

    for reading in 0..READINGS_PER_HOUSE {
        let timestamp = day + TimeDelta::minutes(i64::from(reading) * 15);

        for house in 0..HOUSES {
            let watts: u32 = rng.gen_range(0..2_000);
            expected[house as usize] += u64::from(watts);

            consumption
                .ingest(&Consumption {
                    consumer_id: format!("House-{}", house),
                    timestamp: timestamp.format("%Y-%m-%dT%H:%M").to_string(),
                    consumption: watts,
                })
                .await
                .expect("reading recorded");
        }
    }

    let evening = ConsumptionQuery {
        consumer_id: "House-0".to_string(),
        timestamp: "2017-09-20T18:00".to_string(),
    };
    println!(
        "House-0 consumed {}W between 18:00 and 18:30",
        consumption.query(&evening).await.expect("point query")
    );

    for house in 0..HOUSES {
        let query = UsageQuery {
            consumer_id: format!("House-{}", house),
            date: "2017-09-20".to_string(),
        };
        let target = expected[house as usize] as f64 / 1000.0;

        loop {
            let kw = usage.query_usage(&query).await.expect("usage query");
            if kw == target {
                println!("{} used {:.3}kW on {}", query.consumer_id, kw, query.date);
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pipeline.shutdown().await.expect("pipeline stopped cleanly");
}
