//! Signal window contract and shared state
//!
//! A signal window collects uniformly sampled values (one sample every
//! `period_ticks`, aligned to `offset_ticks`) into windows of `window_size`
//! samples that start every `hop_size` samples, and hands each full window to
//! a [`WindowObserver`].

use super::buffer::CircularBuffer;
use super::circular::CircularArrayRange;
use crate::config::SignalWindowConfig;
use crate::error::WindowResult;

/// Window content: the samples plus a flag per sample telling real values
/// from padding
#[derive(Debug, Clone)]
pub struct BaseWindow<T> {
    items: CircularBuffer<T>,
    active: CircularBuffer<bool>,
    size: usize,
    hop: usize,
}

impl<T: Clone + Default> BaseWindow<T> {
    pub fn new(size: usize, hop: usize) -> Self {
        Self {
            items: CircularBuffer::with_size(size),
            active: CircularBuffer::with_size(size),
            size,
            hop,
        }
    }

    pub(crate) fn push(&mut self, item: T, active: bool) {
        self.items.enqueue(item);
        self.active.enqueue(active);
    }

    /// Append up to `count` inactive default-valued slots, stopping when
    /// the window is full
    pub(crate) fn pad(&mut self, count: usize) {
        for _ in 0..count.min(self.size - self.len()) {
            self.push(T::default(), false);
        }
    }

    /// Drop the oldest hop worth of samples
    pub(crate) fn drop_hop(&mut self) {
        self.items.dequeue_n(self.hop);
        self.active.dequeue_n(self.hop);
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.active.clear();
    }
}

impl<T> BaseWindow<T> {
    /// Window length in samples
    pub fn size(&self) -> usize {
        self.size
    }

    /// Hop length in samples
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Samples currently held
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.size
    }

    /// All held samples
    pub fn range(&self) -> CircularArrayRange {
        self.items.range()
    }

    /// Samples that entered with the latest hop
    pub fn added_range(&self) -> CircularArrayRange {
        self.items.last_range(self.hop.min(self.size))
    }

    /// Samples that leave with the next hop
    pub fn expiring_range(&self) -> CircularArrayRange {
        self.items.first_range(self.hop.min(self.size))
    }

    /// Backing sample array, indexed by range positions
    pub fn items(&self) -> &[T] {
        self.items.as_slice()
    }

    /// Backing activity flags, indexed by range positions
    pub fn active_flags(&self) -> &[bool] {
        self.active.as_slice()
    }

    /// Sample at logical position `index`, oldest first
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Whether the sample at logical position `index` is real
    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    pub fn has_active(&self) -> bool {
        self.active.iter().any(|a| *a)
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    /// Held samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }
}

/// Receiver of full windows
pub trait WindowObserver<T>: Send {
    /// A window filled without history from a previous window
    fn on_init(&mut self, time: i64, window: &BaseWindow<T>);

    /// A window filled and shares all but its newest hop with the previous one
    fn on_hop(&mut self, time: i64, window: &BaseWindow<T>);

    fn clone_box(&self) -> Box<dyn WindowObserver<T>>;
}

impl<T> Clone for Box<dyn WindowObserver<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Window state machine over sample times
pub trait SignalWindow<T>: Send {
    /// Position the window for a sample at `time`.
    ///
    /// Afterwards `window_start_time() <= next_sample_time() < window_end_time()`
    /// holds, with `next_sample_time() == time` whenever a sample at `time` can
    /// still be taken. Returns the number of windows emitted on the way.
    fn advance_time(&mut self, time: i64) -> WindowResult<usize>;

    /// Add the sample at `time`, which must equal `next_sample_time()`.
    ///
    /// Returns `true` if the sample completed a window.
    fn enqueue(&mut self, time: i64, item: T) -> WindowResult<bool>;

    fn window(&self) -> &BaseWindow<T>;

    fn observer(&self) -> &dyn WindowObserver<T>;

    fn window_start_time(&self) -> i64;

    fn window_end_time(&self) -> i64;

    fn next_sample_time(&self) -> i64;

    fn clone_window(&self) -> Box<dyn SignalWindow<T>>;
}

impl<T> Clone for Box<dyn SignalWindow<T>> {
    fn clone(&self) -> Self {
        self.clone_window()
    }
}

/// Window boundary arithmetic shared by the variants
///
/// Boundaries are computed exactly. A window whose end does not fit in an
/// `i64` cannot be reported, so trying to open one closes the clock instead;
/// a closed clock has `start == end == next_sample_time == i64::MAX` and takes
/// no samples.
#[derive(Debug, Clone)]
pub(crate) struct WindowClock {
    pub(crate) period: i64,
    pub(crate) offset: i64,
    pub(crate) size_ticks: i64,
    pub(crate) hop_ticks: i64,
    pub(crate) start: i64,
    pub(crate) end: i64,
    pub(crate) next_sample_time: i64,
    open: bool,
}

impl WindowClock {
    pub(crate) fn new(config: &SignalWindowConfig) -> WindowResult<Self> {
        config.validate()?;
        Ok(Self {
            period: config.period_ticks,
            offset: config.offset_ticks,
            size_ticks: config.window_size_ticks(),
            hop_ticks: config.hop_size_ticks(),
            start: i64::MIN,
            end: i64::MIN,
            next_sample_time: i64::MIN,
            open: false,
        })
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn close(&mut self) {
        self.start = i64::MAX;
        self.end = i64::MAX;
        self.next_sample_time = i64::MAX;
        self.open = false;
    }

    /// Open the window starting at `start` with nothing sampled yet.
    ///
    /// Returns `false`, closing the clock, if the window is not representable.
    fn open_at(&mut self, start: i128) -> bool {
        let end = start + self.size_ticks as i128;
        match (i64::try_from(start), i64::try_from(end)) {
            (Ok(start), Ok(end)) => {
                self.start = start;
                self.end = end;
                self.next_sample_time = start;
                self.open = true;
                true
            }
            _ => {
                self.close();
                false
            }
        }
    }

    /// Open the `k`-th window of the grid
    fn open_slot(&mut self, k: i128) -> bool {
        self.open_at(self.offset as i128 + k * self.hop_ticks as i128)
    }

    /// Hop slot index of `time`, rounded down
    fn slot_floor(&self, time: i128) -> i128 {
        (time - self.offset as i128).div_euclid(self.hop_ticks as i128)
    }

    /// Open the first window starting at or after `time`
    pub(crate) fn open_at_or_after(&mut self, time: i64) -> bool {
        let since = time as i128 - self.offset as i128;
        let k = -(-since).div_euclid(self.hop_ticks as i128);
        self.open_slot(k)
    }

    /// Open the earliest window whose end lies after `time`
    pub(crate) fn open_covering(&mut self, time: i64) -> bool {
        let k = self.slot_floor(time as i128 - self.size_ticks as i128) + 1;
        self.open_slot(k)
    }

    /// Open the window of the hop slot containing `time`; may start after
    /// `time` when hops leave gaps between windows
    pub(crate) fn open_tumbling(&mut self, time: i64) -> bool {
        let k = self.slot_floor(time as i128);
        if !self.open_slot(k) {
            return false;
        }
        time < self.end || self.open_slot(k + 1)
    }

    /// Move to the next window on the grid keeping `next_sample_time`,
    /// closing the clock if the window is not representable
    pub(crate) fn slide(&mut self) -> bool {
        let next = self.next_sample_time;
        if !self.open_at(self.start as i128 + self.hop_ticks as i128) {
            return false;
        }
        self.next_sample_time = next;
        true
    }

    /// Samples on the grid in `[from, to)`
    pub(crate) fn samples_between(&self, from: i64, to: i64) -> usize {
        if to <= from {
            0
        } else {
            ((to as i128 - from as i128) / self.period as i128) as usize
        }
    }
}
