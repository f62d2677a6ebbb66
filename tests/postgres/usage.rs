use sqlx::{Pool, Postgres};

use ptu_usage::ptu::parse_date;
use ptu_usage::usage::postgres::PgUsageRepository;
use ptu_usage::usage::{IncrementOutcome, UsageIncrement, UsageRepository};

fn increment(consumer_id: &str, date: &str, watts: u64, sequence_number: Option<i32>) -> UsageIncrement {
    UsageIncrement {
        consumer_id: consumer_id.to_string(),
        date: parse_date(date).unwrap(),
        watts,
        sequence_number,
    }
}

#[sqlx::test]
async fn increments_add_up_test(pool: Pool<Postgres>) {
    let repository = PgUsageRepository::try_new(pool).await.unwrap();
    let date = parse_date("2018-04-01").unwrap();

    assert_eq!(repository.usage("consumer-1", date).await.unwrap(), 0);

    let outcome = repository
        .increment(&increment("consumer-1", "2018-04-01", 123, Some(1)))
        .await
        .unwrap();
    assert_eq!(outcome, IncrementOutcome::Applied);
    let _ = repository
        .increment(&increment("consumer-1", "2018-04-01", 100, Some(2)))
        .await
        .unwrap();
    let _ = repository
        .increment(&increment("consumer-1", "2018-04-02", 7, Some(3)))
        .await
        .unwrap();
    let _ = repository
        .increment(&increment("consumer-2", "2018-04-01", 5, Some(1)))
        .await
        .unwrap();

    assert_eq!(repository.usage("consumer-1", date).await.unwrap(), 223);
    assert_eq!(repository.usage("consumer-2", date).await.unwrap(), 5);
    assert_eq!(
        repository.usage("consumer-1", parse_date("2018-04-02").unwrap()).await.unwrap(),
        7
    );
}

#[sqlx::test]
async fn redelivered_increments_are_duplicates_test(pool: Pool<Postgres>) {
    let repository = PgUsageRepository::try_new(pool).await.unwrap();
    let date = parse_date("2018-04-01").unwrap();

    let _ = repository
        .increment(&increment("consumer-1", "2018-04-01", 123, Some(1)))
        .await
        .unwrap();
    let _ = repository
        .increment(&increment("consumer-1", "2018-04-01", 100, Some(2)))
        .await
        .unwrap();

    for sequence_number in [1, 2] {
        let outcome = repository
            .increment(&increment("consumer-1", "2018-04-01", 100, Some(sequence_number)))
            .await
            .unwrap();
        assert_eq!(outcome, IncrementOutcome::Duplicate);
    }

    assert_eq!(repository.usage("consumer-1", date).await.unwrap(), 223);

    let outcome = repository
        .increment(&increment("consumer-1", "2018-04-01", 1, None))
        .await
        .unwrap();
    assert_eq!(outcome, IncrementOutcome::Applied);
    assert_eq!(repository.usage("consumer-1", date).await.unwrap(), 224);
}
