use super::trait_::SnapshotAggregate;
use std::collections::BTreeMap;

/// Multiset state shared by the min and max aggregates
///
/// Keeping every live value (with multiplicity) is what makes retraction
/// exact: removing the current extreme exposes the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtremaState<T: Ord> {
    values: BTreeMap<T, u64>,
}

impl<T: Ord> Default for ExtremaState<T> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<T: Ord + Clone> ExtremaState<T> {
    fn insert(&mut self, value: &T, n: u64) {
        *self.values.entry(value.clone()).or_insert(0) += n;
    }

    fn remove(&mut self, value: &T, n: u64) {
        if let Some(count) = self.values.get_mut(value) {
            if *count <= n {
                self.values.remove(value);
            } else {
                *count -= n;
            }
        }
    }

    fn subtract(&mut self, delta: &ExtremaState<T>) {
        for (value, n) in &delta.values {
            self.remove(value, *n);
        }
    }

    /// Number of live values, counting multiplicity
    pub fn len(&self) -> u64 {
        self.values.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Min aggregate - smallest value alive at each point in time
///
/// # Examples
///
/// ```
/// use temporal_processor::aggregation::{MinAggregate, SnapshotAggregate};
///
/// let agg = MinAggregate::<i64>::new();
/// let mut state = agg.initial_state();
/// agg.accumulate(&mut state, 0, &30);
/// agg.accumulate(&mut state, 0, &10);
/// agg.deaccumulate(&mut state, 0, &10);
///
/// assert_eq!(agg.compute_result(&state), Some(30));
/// ```
#[derive(Debug, Clone)]
pub struct MinAggregate<T> {
    _phantom: std::marker::PhantomData<fn(T)>,
}

/// Max aggregate - largest value alive at each point in time
#[derive(Debug, Clone)]
pub struct MaxAggregate<T> {
    _phantom: std::marker::PhantomData<fn(T)>,
}

impl<T: Ord + Clone> MinAggregate<T> {
    /// Create a new min aggregate
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Ord + Clone> Default for MinAggregate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> MaxAggregate<T> {
    /// Create a new max aggregate
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Ord + Clone> Default for MaxAggregate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone + Send> SnapshotAggregate for MinAggregate<T> {
    type Input = T;
    type State = ExtremaState<T>;
    type Output = Option<T>;

    fn initial_state(&self) -> ExtremaState<T> {
        ExtremaState::default()
    }

    fn accumulate(&self, state: &mut ExtremaState<T>, _time: i64, input: &T) {
        state.insert(input, 1);
    }

    fn deaccumulate(&self, state: &mut ExtremaState<T>, _time: i64, input: &T) {
        state.remove(input, 1);
    }

    fn difference(&self, state: &mut ExtremaState<T>, delta: &ExtremaState<T>) {
        state.subtract(delta);
    }

    fn compute_result(&self, state: &ExtremaState<T>) -> Option<T> {
        state.values.keys().next().cloned()
    }
}

impl<T: Ord + Clone + Send> SnapshotAggregate for MaxAggregate<T> {
    type Input = T;
    type State = ExtremaState<T>;
    type Output = Option<T>;

    fn initial_state(&self) -> ExtremaState<T> {
        ExtremaState::default()
    }

    fn accumulate(&self, state: &mut ExtremaState<T>, _time: i64, input: &T) {
        state.insert(input, 1);
    }

    fn deaccumulate(&self, state: &mut ExtremaState<T>, _time: i64, input: &T) {
        state.remove(input, 1);
    }

    fn difference(&self, state: &mut ExtremaState<T>, delta: &ExtremaState<T>) {
        state.subtract(delta);
    }

    fn compute_result(&self, state: &ExtremaState<T>) -> Option<T> {
        state.values.keys().next_back().cloned()
    }
}
