use sqlx::{Pool, Postgres};

use ptu_usage::offset::OffsetStore;
use ptu_usage::shard::ShardTagger;
use ptu_usage::store::postgres::PgOffsetStore;

#[sqlx::test]
async fn offsets_survive_a_new_store_test(pool: Pool<Postgres>) {
    let tags: Vec<_> = ShardTagger::default().all_tags().collect();
    let offsets = PgOffsetStore::try_new(pool.clone()).await.unwrap();

    assert_eq!(offsets.load("stream", tags[0]).await.unwrap(), None);

    offsets.save("stream", tags[0], 10).await.unwrap();
    offsets.save("stream", tags[0], 12).await.unwrap();
    offsets.save("stream", tags[1], 3).await.unwrap();
    offsets.save("other", tags[0], 99).await.unwrap();

    let reopened = PgOffsetStore::try_new(pool).await.unwrap();
    assert_eq!(reopened.load("stream", tags[0]).await.unwrap(), Some(12));
    assert_eq!(reopened.load("stream", tags[1]).await.unwrap(), Some(3));
    assert_eq!(reopened.load("stream", tags[2]).await.unwrap(), None);
    assert_eq!(reopened.load("other", tags[0]).await.unwrap(), Some(99));
}
