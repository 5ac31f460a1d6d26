use super::trait_::{Disposer, SnapshotAggregate};
use std::fmt;
use std::sync::Arc;

type InitFn<S> = Arc<dyn Fn() -> S + Send + Sync>;
type FoldFn<S, I> = Arc<dyn Fn(&mut S, i64, &I) + Send + Sync>;
type DiffFn<S> = Arc<dyn Fn(&mut S, &S) + Send + Sync>;
type ResultFn<S, O> = Arc<dyn Fn(&S) -> O + Send + Sync>;

/// Snapshot aggregate assembled from plain functions
///
/// # Examples
///
/// ```
/// use temporal_processor::aggregation::{FnAggregate, SnapshotAggregate};
///
/// let agg = FnAggregate::new(
///     || 0i64,
///     |s: &mut i64, _t, x: &i64| *s += x,
///     |s: &mut i64, _t, x: &i64| *s -= x,
///     |s: &mut i64, d: &i64| *s -= d,
///     |s: &i64| *s,
/// );
/// let mut state = agg.initial_state();
/// agg.accumulate(&mut state, 0, &7);
/// assert_eq!(agg.compute_result(&state), 7);
/// ```
pub struct FnAggregate<I, S, O> {
    initial: InitFn<S>,
    accumulate: FoldFn<S, I>,
    deaccumulate: FoldFn<S, I>,
    difference: DiffFn<S>,
    compute: ResultFn<S, O>,
    disposer: Option<Disposer<S>>,
}

impl<I, S, O> FnAggregate<I, S, O> {
    pub fn new(
        initial: impl Fn() -> S + Send + Sync + 'static,
        accumulate: impl Fn(&mut S, i64, &I) + Send + Sync + 'static,
        deaccumulate: impl Fn(&mut S, i64, &I) + Send + Sync + 'static,
        difference: impl Fn(&mut S, &S) + Send + Sync + 'static,
        compute: impl Fn(&S) -> O + Send + Sync + 'static,
    ) -> Self {
        Self {
            initial: Arc::new(initial),
            accumulate: Arc::new(accumulate),
            deaccumulate: Arc::new(deaccumulate),
            difference: Arc::new(difference),
            compute: Arc::new(compute),
            disposer: None,
        }
    }

    /// Attach a disposal routine for states owning external resources
    pub fn with_disposer(mut self, disposer: impl Fn(S) + Send + Sync + 'static) -> Self {
        self.disposer = Some(Arc::new(disposer));
        self
    }
}

impl<I, S, O> Clone for FnAggregate<I, S, O> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            accumulate: self.accumulate.clone(),
            deaccumulate: self.deaccumulate.clone(),
            difference: self.difference.clone(),
            compute: self.compute.clone(),
            disposer: self.disposer.clone(),
        }
    }
}

impl<I, S, O> fmt::Debug for FnAggregate<I, S, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAggregate")
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

impl<I, S, O: Clone + Default> SnapshotAggregate for FnAggregate<I, S, O> {
    type Input = I;
    type State = S;
    type Output = O;

    fn initial_state(&self) -> S {
        (self.initial)()
    }

    fn accumulate(&self, state: &mut S, time: i64, input: &I) {
        (self.accumulate)(state, time, input)
    }

    fn deaccumulate(&self, state: &mut S, time: i64, input: &I) {
        (self.deaccumulate)(state, time, input)
    }

    fn difference(&self, state: &mut S, delta: &S) {
        (self.difference)(state, delta)
    }

    fn compute_result(&self, state: &S) -> O {
        (self.compute)(state)
    }

    fn state_disposer(&self) -> Option<Disposer<S>> {
        self.disposer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fn_aggregate_delegates() {
        let agg = FnAggregate::new(
            Vec::<i32>::new,
            |s: &mut Vec<i32>, _t, x: &i32| s.push(*x),
            |s: &mut Vec<i32>, _t, x: &i32| {
                if let Some(pos) = s.iter().position(|v| v == x) {
                    s.remove(pos);
                }
            },
            |s: &mut Vec<i32>, d: &Vec<i32>| s.retain(|v| !d.contains(v)),
            |s: &Vec<i32>| s.len(),
        );
        let mut state = agg.initial_state();
        agg.accumulate(&mut state, 0, &1);
        agg.accumulate(&mut state, 0, &2);
        agg.deaccumulate(&mut state, 0, &1);
        assert_eq!(agg.compute_result(&state), 1);
        assert!(agg.state_disposer().is_none());
    }

    #[test]
    fn test_fn_aggregate_disposer() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let d = disposed.clone();
        let agg = FnAggregate::new(
            || 0u32,
            |_: &mut u32, _, _: &()| {},
            |_: &mut u32, _, _: &()| {},
            |_: &mut u32, _: &u32| {},
            |s: &u32| *s,
        )
        .with_disposer(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        let disposer = agg.clone().state_disposer().unwrap();
        disposer(1);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }
}
