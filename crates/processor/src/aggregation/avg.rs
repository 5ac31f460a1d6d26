use super::trait_::{SnapshotAggregate, ToF64};
use serde::{Deserialize, Serialize};

/// State for average aggregation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AverageState {
    sum: f64,
    count: u64,
}

impl AverageState {
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Average aggregate - mean of the values alive at each point in time
///
/// An empty state yields `0.0`; snapshot pipes never emit a result for a key
/// with no live events.
///
/// # Examples
///
/// ```
/// use temporal_processor::aggregation::{AverageAggregate, SnapshotAggregate};
///
/// let agg = AverageAggregate::<f64>::new();
/// let mut state = agg.initial_state();
/// agg.accumulate(&mut state, 0, &10.0);
/// agg.accumulate(&mut state, 0, &20.0);
/// agg.accumulate(&mut state, 0, &30.0);
///
/// assert_eq!(agg.compute_result(&state), 20.0);
/// ```
#[derive(Debug, Clone)]
pub struct AverageAggregate<T> {
    _phantom: std::marker::PhantomData<fn(T)>,
}

impl<T: ToF64> AverageAggregate<T> {
    /// Create a new average aggregate
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: ToF64> Default for AverageAggregate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ToF64> SnapshotAggregate for AverageAggregate<T> {
    type Input = T;
    type State = AverageState;
    type Output = f64;

    fn initial_state(&self) -> AverageState {
        AverageState::default()
    }

    fn accumulate(&self, state: &mut AverageState, _time: i64, input: &T) {
        state.sum += input.to_f64();
        state.count += 1;
    }

    fn deaccumulate(&self, state: &mut AverageState, _time: i64, input: &T) {
        state.sum -= input.to_f64();
        state.count -= 1;
    }

    fn difference(&self, state: &mut AverageState, delta: &AverageState) {
        state.sum -= delta.sum;
        state.count -= delta.count;
    }

    fn compute_result(&self, state: &AverageState) -> f64 {
        if state.count == 0 {
            0.0
        } else {
            state.sum / state.count as f64
        }
    }
}
