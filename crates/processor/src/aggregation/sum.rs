use super::trait_::{SnapshotAggregate, ToF64};

use serde::{Deserialize, Serialize};

/// State for sum aggregation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SumState {
    sum: f64,
}

/// Sum aggregate - sums the values of the events alive at each point in time
///
/// Retraction subtracts, so results are exact for integer-valued inputs and
/// subject to ordinary floating point error otherwise.
///
/// # Examples
///
/// ```
/// use temporal_processor::aggregation::{SnapshotAggregate, SumAggregate};
///
/// let agg = SumAggregate::<i64>::new();
/// let mut state = agg.initial_state();
/// agg.accumulate(&mut state, 0, &4);
/// agg.accumulate(&mut state, 0, &6);
///
/// assert_eq!(agg.compute_result(&state), 10.0);
/// ```
#[derive(Debug, Clone)]
pub struct SumAggregate<T> {
    _phantom: std::marker::PhantomData<fn(T)>,
}

impl<T: ToF64> SumAggregate<T> {
    /// Create a new sum aggregate
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: ToF64> Default for SumAggregate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ToF64> SnapshotAggregate for SumAggregate<T> {
    type Input = T;
    type State = SumState;
    type Output = f64;

    fn initial_state(&self) -> SumState {
        SumState::default()
    }

    fn accumulate(&self, state: &mut SumState, _time: i64, input: &T) {
        state.sum += input.to_f64();
    }

    fn deaccumulate(&self, state: &mut SumState, _time: i64, input: &T) {
        state.sum -= input.to_f64();
    }

    fn difference(&self, state: &mut SumState, delta: &SumState) {
        state.sum -= delta.sum;
    }

    fn compute_result(&self, state: &SumState) -> f64 {
        state.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_round_trip() {
        let agg = SumAggregate::<i32>::new();
        let mut state = agg.initial_state();
        agg.accumulate(&mut state, 0, &10);
        agg.accumulate(&mut state, 1, &-3);
        assert_eq!(agg.compute_result(&state), 7.0);

        agg.deaccumulate(&mut state, 0, &10);
        assert_eq!(agg.compute_result(&state), -3.0);
    }

    #[test]
    fn test_sum_difference() {
        let agg = SumAggregate::<f64>::new();
        let mut held = agg.initial_state();
        let mut delta = agg.initial_state();
        agg.accumulate(&mut held, 0, &1.5);
        agg.accumulate(&mut held, 0, &2.5);
        agg.accumulate(&mut delta, 0, &2.5);

        agg.difference(&mut held, &delta);
        assert_eq!(agg.compute_result(&held), 1.5);
    }
}
