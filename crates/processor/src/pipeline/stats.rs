use serde::{Deserialize, Serialize};

/// Running counters of a single pipe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeStats {
    /// Data rows consumed
    pub rows_in: u64,

    /// Start edges emitted
    pub start_edges_out: u64,

    /// End edges emitted
    pub end_edges_out: u64,

    /// Intervals emitted or rewritten
    pub intervals_out: u64,

    /// Rows marked deleted
    pub rows_deleted: u64,

    /// Punctuations consumed
    pub punctuations: u64,

    /// Low watermarks consumed
    pub low_watermarks: u64,

    /// Output batches handed downstream
    pub batches_out: u64,

    /// Held keys evicted after their last contribution expired
    pub keys_evicted: u64,

    /// Aggregate states passed to the disposal routine
    pub states_disposed: u64,

    /// Expired change queue buckets drained
    pub buckets_drained: u64,

    /// Partitions garbage collected
    pub partitions_collected: u64,
}

impl PipeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data rows emitted of any shape
    pub fn rows_out(&self) -> u64 {
        self.start_edges_out + self.end_edges_out + self.intervals_out
    }
}
