use super::trait_::SnapshotAggregate;

use serde::{Deserialize, Serialize};

/// State for count aggregation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountState {
    count: u64,
}

impl CountState {
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Count aggregate - counts the events alive at each point in time
///
/// # Examples
///
/// ```
/// use temporal_processor::aggregation::{CountAggregate, SnapshotAggregate};
///
/// let agg = CountAggregate::<f64>::new();
/// let mut state = agg.initial_state();
/// agg.accumulate(&mut state, 0, &1.0);
/// agg.accumulate(&mut state, 5, &2.0);
/// agg.deaccumulate(&mut state, 0, &1.0);
///
/// assert_eq!(agg.compute_result(&state), 1);
/// ```
#[derive(Debug, Clone)]
pub struct CountAggregate<T> {
    _phantom: std::marker::PhantomData<fn(T)>,
}

impl<T> CountAggregate<T> {
    /// Create a new count aggregate
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Default for CountAggregate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotAggregate for CountAggregate<T> {
    type Input = T;
    type State = CountState;
    type Output = u64;

    fn initial_state(&self) -> CountState {
        CountState::default()
    }

    fn accumulate(&self, state: &mut CountState, _time: i64, _input: &T) {
        state.count += 1;
    }

    fn deaccumulate(&self, state: &mut CountState, _time: i64, _input: &T) {
        state.count -= 1;
    }

    fn difference(&self, state: &mut CountState, delta: &CountState) {
        state.count -= delta.count;
    }

    fn compute_result(&self, state: &CountState) -> u64 {
        state.count
    }
}
