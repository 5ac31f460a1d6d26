//! Non-overlapping signal windows
//!
//! With `hop_size >= window_size` each window starts fresh. When the hop is
//! longer than the window, samples falling between two windows are ignored.

use super::signal::{BaseWindow, SignalWindow, WindowClock, WindowObserver};
use crate::config::SignalWindowConfig;
use crate::error::{WindowError, WindowResult};
use tracing::trace;

/// Tumbling window that only emits windows with every sample present
///
/// A missing sample invalidates the window being filled; filling resumes at
/// the next window start.
#[derive(Clone)]
pub struct TumblingSignalWindow<T> {
    clock: WindowClock,
    window: BaseWindow<T>,
    observer: Box<dyn WindowObserver<T>>,
}

impl<T: Clone + Default> TumblingSignalWindow<T> {
    pub fn new(config: &SignalWindowConfig, observer: Box<dyn WindowObserver<T>>) -> WindowResult<Self> {
        Ok(Self {
            clock: WindowClock::new(config)?,
            window: BaseWindow::new(config.window_size, config.hop_size),
            observer,
        })
    }
}

impl<T: Clone + Default + Send + 'static> SignalWindow<T> for TumblingSignalWindow<T> {
    fn advance_time(&mut self, time: i64) -> WindowResult<usize> {
        if self.clock.is_open() {
            let next = self.clock.next_sample_time;
            if time < next || (time == next && time < self.clock.end) {
                return Ok(0);
            }
            if !self.window.is_empty() {
                trace!(discarded = self.window.len(), time, "Discarding incomplete window");
                self.window.clear();
            }
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

        self.observer.on_init(self.clock.end, &self.window);
        self.window.clear();
        if self.clock.slide() {
            self.clock.next_sample_time = self.clock.start;
        } else {
            trace!(time, "No representable window left");
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

/// Tumbling window that pads missing samples with inactive defaults
///
/// A window is emitted once full, or when time moves past its end while it
/// holds at least one real sample. Windows without real samples are skipped.
#[derive(Clone)]
pub struct PaddedTumblingSignalWindow<T> {
    clock: WindowClock,
    window: BaseWindow<T>,
    observer: Box<dyn WindowObserver<T>>,
}

impl<T: Clone + Default> PaddedTumblingSignalWindow<T> {
    pub fn new(config: &SignalWindowConfig, observer: Box<dyn WindowObserver<T>>) -> WindowResult<Self> {
        Ok(Self {
            clock: WindowClock::new(config)?,
            window: BaseWindow::new(config.window_size, config.hop_size),
            observer,
        })
    }

    fn pad_to(&mut self, time: i64) {
        if !self.clock.is_open() {
            return;
        }
        if time > self.clock.next_sample_time && time >= self.clock.start {
            let missing = self.clock.samples_between(self.clock.next_sample_time, time);
            self.window.pad(missing);
            self.clock.next_sample_time = time;
        }
    }
}

impl<T: Clone + Default + Send + 'static> SignalWindow<T> for PaddedTumblingSignalWindow<T> {
    fn advance_time(&mut self, time: i64) -> WindowResult<usize> {
        if !self.clock.is_open() && !self.clock.open_tumbling(time) {
            return Ok(0);
        }

        let mut emitted = 0;
        if time >= self.clock.end {
            if self.window.has_active() {
                let missing = self.window.size() - self.window.len();
                self.window.pad(missing);
                self.observer.on_init(self.clock.end, &self.window);
                emitted += 1;
            }
            self.window.clear();
            // Past the last representable window the clock stays closed
            if !self.clock.open_tumbling(time) {
                return Ok(emitted);
            }
        }
        self.pad_to(time);
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

        self.observer.on_init(self.clock.end, &self.window);
        self.window.clear();
        if self.clock.slide() {
            self.clock.next_sample_time = self.clock.start;
        } else {
            trace!(time, "No representable window left");
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
