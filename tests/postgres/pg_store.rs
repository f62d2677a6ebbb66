use std::num::NonZeroU16;
use std::sync::Arc;

use sqlx::{Pool, Postgres};

use ptu_usage::consumption::{ConsumerAggregate, ConsumerCommand, ConsumerEvent};
use ptu_usage::shard::ShardTagger;
use ptu_usage::store::postgres::{PgStore, PgStoreBuilder, PgStoreError};
use ptu_usage::store::{EventStore, StoreEvent};
use ptu_usage::{Aggregate, AggregateManager, AggregateState};

fn recorded(consumer_id: &str, timestamp: &str, consumption: u32) -> ConsumerEvent {
    ConsumerEvent::ConsumptionRecorded {
        consumer_id: consumer_id.to_string(),
        timestamp: ptu_usage::ptu::parse_timestamp(timestamp).unwrap(),
        consumption,
    }
}

#[sqlx::test]
async fn setup_database_test(pool: Pool<Postgres>) {
    let table_name: String = format!("{}_events", ConsumerAggregate::NAME);

    let rows = sqlx::query("SELECT table_name FROM information_schema.columns WHERE table_name = $1")
        .bind(table_name.as_str())
        .fetch_all(&pool)
        .await
        .unwrap();

    assert!(rows.is_empty());

    let store: PgStore<ConsumerAggregate> = PgStoreBuilder::new(pool.clone())
        .try_build()
        .await
        .expect("Failed to create PgStore");
    assert_eq!(store.table_name(), table_name);

    let rows = sqlx::query("SELECT indexname FROM pg_indexes WHERE tablename = $1")
        .bind(table_name.as_str())
        .fetch_all(&pool)
        .await
        .unwrap();

    // primary key, aggregate_id, aggregate_id-sequence_number, shard-global_offset
    assert_eq!(rows.len(), 4);
}

#[sqlx::test]
async fn persist_and_by_aggregate_id_test(pool: Pool<Postgres>) {
    let store: PgStore<ConsumerAggregate> = PgStoreBuilder::new(pool).try_build().await.unwrap();

    let store_events: Vec<StoreEvent<ConsumerEvent>> = store.by_aggregate_id("consumer-1").await.unwrap();
    assert!(store_events.is_empty());

    let mut state = AggregateState::with_id("consumer-1");
    let store_events: Vec<StoreEvent<ConsumerEvent>> = store
        .persist(
            &mut state,
            vec![
                recorded("consumer-1", "2018-04-01T00:10", 123),
                recorded("consumer-1", "2018-04-01T00:20", 100),
            ],
        )
        .await
        .unwrap();

    assert_eq!(store_events.len(), 2);
    assert_eq!(store_events[0].sequence_number, 1);
    assert_eq!(store_events[1].sequence_number, 2);
    assert!(store_events[0].offset < store_events[1].offset);
    assert_eq!(store_events[0].shard, store.shard_tagger().tag_for("consumer-1"));

    let loaded: Vec<StoreEvent<ConsumerEvent>> = store.by_aggregate_id("consumer-1").await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, store_events[0].id);
    assert_eq!(loaded[1].payload, recorded("consumer-1", "2018-04-01T00:20", 100));
    assert_eq!(loaded[1].offset, store_events[1].offset);
}

#[sqlx::test]
async fn stale_state_is_a_sequence_conflict_test(pool: Pool<Postgres>) {
    let store: PgStore<ConsumerAggregate> = PgStoreBuilder::new(pool).try_build().await.unwrap();

    let mut state = AggregateState::with_id("consumer-1");
    let _ = store
        .persist(&mut state, vec![recorded("consumer-1", "2018-04-01T00:10", 1)])
        .await
        .unwrap();

    // A state that never saw the first event.
    let mut stale = AggregateState::with_id("consumer-1");
    let result = store
        .persist(&mut stale, vec![recorded("consumer-1", "2018-04-01T00:10", 1)])
        .await;

    assert!(matches!(
        result,
        Err(PgStoreError::SequenceConflict { sequence_number: 1, .. })
    ));
    assert_eq!(store.by_aggregate_id("consumer-1").await.unwrap().len(), 1);
}

#[sqlx::test]
async fn by_shard_reads_in_offset_order_test(pool: Pool<Postgres>) {
    let store: PgStore<ConsumerAggregate> = PgStoreBuilder::new(pool)
        .with_shard_tagger(ShardTagger::new(NonZeroU16::new(2).unwrap()))
        .try_build()
        .await
        .unwrap();

    for house in 0..6 {
        let consumer_id = format!("House-{}", house);
        let mut state = AggregateState::with_id(consumer_id.as_str());
        let _ = store
            .persist(&mut state, vec![recorded(&consumer_id, "2017-09-20T10:00", house)])
            .await
            .unwrap();
    }

    let mut total = 0;
    for shard in store.shard_tagger().all_tags() {
        let events = store.by_shard(shard, None, 100).await.unwrap();
        assert!(events.iter().all(|event| event.shard == shard));
        assert!(events.windows(2).all(|pair| pair[0].offset < pair[1].offset));

        if let Some(first) = events.first() {
            let rest = store.by_shard(shard, Some(first.offset), 100).await.unwrap();
            assert_eq!(rest.len(), events.len() - 1);
        }

        let limited = store.by_shard(shard, None, 1).await.unwrap();
        assert!(limited.len() <= 1);

        total += events.len();
    }

    assert_eq!(total, 6);
}

#[sqlx::test]
async fn lock_serializes_concurrent_commands_test(pool: Pool<Postgres>) {
    let store: PgStore<ConsumerAggregate> = PgStoreBuilder::new(pool).try_build().await.unwrap();
    let manager = Arc::new(AggregateManager::new(store.clone()));

    // Every waiter holds a pooled connection, keep them below the pool size.
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                let mut state = manager.lock_and_load("consumer-1").await.unwrap();
                let command = ConsumerCommand::RecordConsumption {
                    timestamp: "2018-04-01T00:10".to_string(),
                    consumption: 1,
                };
                manager.handle_command(&mut state, command).await.unwrap();
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let loaded = store.by_aggregate_id("consumer-1").await.unwrap();
    let sequence_numbers: Vec<_> = loaded.iter().map(|event| event.sequence_number).collect();
    assert_eq!(sequence_numbers, (1..=4).collect::<Vec<_>>());
}
