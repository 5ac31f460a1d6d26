//! Overlapping signal windows
//!
//! With `hop_size < window_size` consecutive windows share
//! `window_size - hop_size` samples. The first window after a reset is
//! reported through [`WindowObserver::on_init`]; every following window is
//! reported through [`WindowObserver::on_hop`] so the observer can update its
//! result incrementally from the added and expiring ranges.

use super::signal::{BaseWindow, SignalWindow, WindowClock, WindowObserver};
use crate::config::SignalWindowConfig;
use crate::error::{WindowError, WindowResult};
use tracing::trace;

/// Hopping window that only emits windows with every sample present
#[derive(Clone)]
pub struct HoppingSignalWindow<T> {
    clock: WindowClock,
    window: BaseWindow<T>,
    observer: Box<dyn WindowObserver<T>>,
    history_valid: bool,
}

impl<T: Clone + Default> HoppingSignalWindow<T> {
    pub fn new(config: &SignalWindowConfig, observer: Box<dyn WindowObserver<T>>) -> WindowResult<Self> {
        Ok(Self {
            clock: WindowClock::new(config)?,
            window: BaseWindow::new(config.window_size, config.hop_size),
            observer,
            history_valid: false,
        })
    }

    /// Whether the next full window will be reported as a hop
    pub fn has_history(&self) -> bool {
        self.history_valid
    }
}

impl<T: Clone + Default + Send + 'static> SignalWindow<T> for HoppingSignalWindow<T> {
    fn advance_time(&mut self, time: i64) -> WindowResult<usize> {
        if self.clock.is_open() {
            let next = self.clock.next_sample_time;
            if time < next || (time == next && time < self.clock.end) {
                return Ok(0);
            }
            if !self.window.is_empty() {
                trace!(discarded = self.window.len(), time, "Missing sample, resetting window");
                self.window.clear();
            }
            self.history_valid = false;
        }
        self.clock.open_at_or_after(time);
        Ok(0)
    }

    fn enqueue(&mut self, time: i64, item: T) -> WindowResult<bool> {
        if time != self.clock.next_sample_time || time >= self.clock.end {
            return Err(WindowError::NotPositioned {
                time,
                next_sample_time: self.clock.next_sample_time,
            });
        }
        self.window.push(item, true);
        self.clock.next_sample_time = time + self.clock.period;
        if !self.window.is_full() {
            return Ok(false);
        }

        if self.history_valid {
            self.observer.on_hop(self.clock.end, &self.window);
        } else {
            self.observer.on_init(self.clock.end, &self.window);
        }
        self.window.drop_hop();
        self.history_valid = true;
        if !self.clock.slide() {
            trace!(end = self.clock.end, "No representable window left");
            self.window.clear();
            self.history_valid = false;
        }
        Ok(true)
    }

    fn window(&self) -> &BaseWindow<T> {
        &self.window
    }

    fn observer(&self) -> &dyn WindowObserver<T> {
        self.observer.as_ref()
    }

    fn window_start_time(&self) -> i64 {
        self.clock.start
    }

    fn window_end_time(&self) -> i64 {
        self.clock.end
    }

    fn next_sample_time(&self) -> i64 {
        self.clock.next_sample_time
    }

    fn clone_window(&self) -> Box<dyn SignalWindow<T>> {
        Box::new(self.clone())
    }
}

/// Hopping window that pads missing samples with inactive defaults
///
/// Every window holding at least one real sample is emitted. A gap longer
/// than a window skips straight to the window covering the new sample
/// instead of walking the empty windows in between.
#[derive(Clone)]
pub struct PaddedHoppingSignalWindow<T> {
    clock: WindowClock,
    window: BaseWindow<T>,
    observer: Box<dyn WindowObserver<T>>,
    history_valid: bool,
}

impl<T: Clone + Default> PaddedHoppingSignalWindow<T> {
    pub fn new(config: &SignalWindowConfig, observer: Box<dyn WindowObserver<T>>) -> WindowResult<Self> {
        Ok(Self {
            clock: WindowClock::new(config)?,
            window: BaseWindow::new(config.window_size, config.hop_size),
            observer,
            history_valid: false,
        })
    }

    pub fn has_history(&self) -> bool {
        self.history_valid
    }

    /// Report the full window and slide to the next one
    ///
    /// Returns `false` when no later window is representable; the clock is
    /// then closed and the window emptied.
    fn emit(&mut self) -> bool {
        if self.history_valid {
            self.observer.on_hop(self.clock.end, &self.window);
        } else {
            self.observer.on_init(self.clock.end, &self.window);
        }
        self.history_valid = true;
        self.window.drop_hop();
        if !self.clock.slide() {
            trace!("No representable window left");
            self.window.clear();
            self.history_valid = false;
            return false;
        }
        self.clock.next_sample_time =
            self.clock.start + self.window.len() as i64 * self.clock.period;
        true
    }
}

impl<T: Clone + Default + Send + 'static> SignalWindow<T> for PaddedHoppingSignalWindow<T> {
    fn advance_time(&mut self, time: i64) -> WindowResult<usize> {
        if !self.clock.is_open() && !self.clock.open_covering(time) {
            return Ok(0);
        }

        // Times whose covering window ends past i64::MAX close every window
        // still holding real samples and leave the clock closed
        let mut emitted = 0;
        while self.clock.is_open() && time >= self.clock.end {
            if self.window.has_active() {
                let missing = self.window.size() - self.window.len();
                self.window.pad(missing);
                emitted += 1;
                if !self.emit() {
                    break;
                }
            } else {
                trace!(time, window_start = self.clock.start, "Skipping empty windows");
                self.window.clear();
                self.history_valid = false;
                if !self.clock.open_covering(time) {
                    break;
                }
            }
        }

        if self.clock.is_open() && time > self.clock.next_sample_time {
            let missing = self.clock.samples_between(self.clock.next_sample_time, time);
            self.window.pad(missing);
            self.clock.next_sample_time = time;
        }
        Ok(emitted)
    }

    fn enqueue(&mut self, time: i64, item: T) -> WindowResult<bool> {
        if time != self.clock.next_sample_time || time >= self.clock.end {
            return Err(WindowError::NotPositioned {
                time,
                next_sample_time: self.clock.next_sample_time,
            });
        }
        self.window.push(item, true);
        self.clock.next_sample_time = time + self.clock.period;
        if !self.window.is_full() {
            return Ok(false);
        }
        // A failed slide leaves the clock closed
        let _ = self.emit();
        Ok(true)
    }

    fn window(&self) -> &BaseWindow<T> {
        &self.window
    }

    fn observer(&self) -> &dyn WindowObserver<T> {
        self.observer.as_ref()
    }

    fn window_start_time(&self) -> i64 {
        self.clock.start
    }

    fn window_end_time(&self) -> i64 {
        self.clock.end
    }

    fn next_sample_time(&self) -> i64 {
        self.clock.next_sample_time
    }

    fn clone_window(&self) -> Box<dyn SignalWindow<T>> {
        Box::new(self.clone())
    }
}
