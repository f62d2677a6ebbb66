use std::fmt::{Display, Formatter};
use std::num::NonZeroU16;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifies one slice of the event log. Every event of a given aggregate lands in the same shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardTag(u16);

impl ShardTag {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub const fn index(&self) -> u16 {
        self.0
    }
}

impl Display for ShardTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

/// Assigns aggregate ids to a fixed number of shards.
///
/// The assignment only depends on the key bytes and on the shard count, so it is stable across
/// processes and restarts. Changing the shard count reassigns keys and must not be done while
/// offsets are committed for the previous count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardTagger {
    shards: NonZeroU16,
}

impl ShardTagger {
    pub const DEFAULT_SHARDS: u16 = 4;

    pub const fn new(shards: NonZeroU16) -> Self {
        Self { shards }
    }

    pub const fn shards(&self) -> u16 {
        self.shards.get()
    }

    /// Returns the shard the given key belongs to.
    pub fn tag_for(&self, key: &str) -> ShardTag {
        let bucket = stable_hash(key) % u64::from(self.shards.get());
        // The remainder is always lower than the shard count, which fits in a u16.
        ShardTag(bucket as u16)
    }

    /// Every shard handled by this tagger, in ascending order.
    pub fn all_tags(&self) -> impl Iterator<Item = ShardTag> {
        (0..self.shards.get()).map(ShardTag)
    }
}

impl Default for ShardTagger {
    fn default() -> Self {
        Self {
            shards: NonZeroU16::new(Self::DEFAULT_SHARDS).unwrap_or(NonZeroU16::MIN),
        }
    }
}

/// First 8 bytes of the SHA-256 digest of `key`, read as a big-endian integer.
pub fn stable_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}
