use crate::aggregate::Aggregate;
use crate::shard::stable_hash;

/// Queries on the event table of one aggregate type.
#[derive(Clone, Debug)]
pub struct Statements {
    table_name: String,
    lock_namespace: i32,
    select_by_aggregate_id: String,
    select_by_shard: String,
    insert: String,
    lock_shard: &'static str,
}

impl Statements {
    pub fn new<A>() -> Self
    where
        A: Aggregate,
    {
        let table_name: String = format!("{}_events", A::NAME);

        Self {
            // Upper half of the table name hash, the lower half being the shard.
            lock_namespace: (stable_hash(&table_name) >> 32) as i32,
            select_by_aggregate_id: format!(
                include_str!("postgres/statements/select_by_aggregate_id.sql"),
                table_name
            ),
            select_by_shard: format!(include_str!("postgres/statements/select_by_shard.sql"), table_name),
            insert: format!(include_str!("postgres/statements/insert.sql"), table_name),
            lock_shard: include_str!("postgres/statements/lock_shard.sql"),
            table_name,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// First key of the transaction level advisory locks taken on the shards of this table.
    pub fn lock_namespace(&self) -> i32 {
        self.lock_namespace
    }

    pub fn by_aggregate_id(&self) -> &str {
        &self.select_by_aggregate_id
    }

    pub fn by_shard(&self) -> &str {
        &self.select_by_shard
    }

    pub fn insert(&self) -> &str {
        &self.insert
    }

    pub fn lock_shard(&self) -> &str {
        self.lock_shard
    }
}
