use std::sync::Arc;

/// Disposal routine for aggregate states that hold external resources
pub type Disposer<S> = Arc<dyn Fn(S) + Send + Sync>;

/// Core trait for snapshot aggregates
///
/// A snapshot aggregate is an incremental, invertible fold over the events
/// that are alive at a point in time. The snapshot pipes rely on the algebra
/// below holding exactly:
///
/// - `deaccumulate(accumulate(s, t, x), t, x) == s`
/// - if `d` was built by accumulating a subset of the events folded into
///   `s`, then `difference(s, d)` removes exactly that subset.
///
/// Violations surface as out-of-order output errors or wrong results; they
/// are not detected otherwise.
pub trait SnapshotAggregate: Send {
    /// The type of values this aggregate accepts
    type Input;

    /// The incremental state
    type State;

    /// The type of the computed result
    type Output: Clone + Default;

    /// State of an aggregate over no events
    fn initial_state(&self) -> Self::State;

    /// Fold an event with start time `time` into `state`
    fn accumulate(&self, state: &mut Self::State, time: i64, input: &Self::Input);

    /// Remove an event with start time `time` from `state`
    fn deaccumulate(&self, state: &mut Self::State, time: i64, input: &Self::Input);

    /// Remove every contribution recorded in `delta` from `state`
    fn difference(&self, state: &mut Self::State, delta: &Self::State);

    /// Compute the result for the current state
    fn compute_result(&self, state: &Self::State) -> Self::Output;

    /// Disposal routine for states that own external resources.
    ///
    /// Queried once when a pipe is built. `None` means states are simply
    /// dropped.
    fn state_disposer(&self) -> Option<Disposer<Self::State>> {
        None
    }
}

/// Disposal routine captured from an aggregate at construction time
pub struct StateDisposal<S> {
    disposer: Option<Disposer<S>>,
}

impl<S> StateDisposal<S> {
    /// Capture the disposal capability of `aggregate`
    pub fn capture<A: SnapshotAggregate<State = S>>(aggregate: &A) -> Self {
        Self {
            disposer: aggregate.state_disposer(),
        }
    }

    /// Release a state. Each state must be passed here exactly once.
    pub fn dispose(&self, state: S) {
        match &self.disposer {
            Some(dispose) => dispose(state),
            None => drop(state),
        }
    }

    /// True when the captured routine is a real disposal routine
    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }
}

/// Helper trait for converting values to f64 for numeric aggregations
pub trait ToF64 {
    fn to_f64(&self) -> f64;
}

impl ToF64 for f64 {
    fn to_f64(&self) -> f64 {
        *self
    }
}

impl ToF64 for f32 {
    fn to_f64(&self) -> f64 {
        *self as f64
    }
}

impl ToF64 for i64 {
    fn to_f64(&self) -> f64 {
        *self as f64
    }
}

impl ToF64 for i32 {
    fn to_f64(&self) -> f64 {
        *self as f64
    }
}

impl ToF64 for u64 {
    fn to_f64(&self) -> f64 {
        *self as f64
    }
}

impl ToF64 for u32 {
    fn to_f64(&self) -> f64 {
        *self as f64
    }
}
