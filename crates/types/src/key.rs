//! Grouping and partition keys

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

/// Compute the value stored in a batch's hash column for `key`
pub fn hash_key<K: Hash>(key: &K) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}

/// A key that carries the partition it belongs to.
///
/// Partitioned streams interleave independent timelines; every row of such a
/// stream has a key from which the partition can be read back.
pub trait PartitionedKey: Clone + Eq + Hash {
    /// The partition identifier
    type Partition: Clone + Eq + Hash + Debug;

    /// The partition this key belongs to
    fn partition(&self) -> &Self::Partition;
}

/// Key of an ungrouped partitioned stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey<P>(pub P);

impl<P: Clone + Eq + Hash + Debug> PartitionedKey for PartitionKey<P> {
    type Partition = P;

    fn partition(&self) -> &P {
        &self.0
    }
}

/// Key of a grouped partitioned stream: partition first, then the group
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompoundGroupKey<P, G> {
    pub partition: P,
    pub group: G,
}

impl<P, G> CompoundGroupKey<P, G> {
    pub fn new(partition: P, group: G) -> Self {
        Self { partition, group }
    }
}

impl<P, G> PartitionedKey for CompoundGroupKey<P, G>
where
    P: Clone + Eq + Hash + Debug,
    G: Clone + Eq + Hash,
{
    type Partition = P;

    fn partition(&self) -> &P {
        &self.partition
    }
}
