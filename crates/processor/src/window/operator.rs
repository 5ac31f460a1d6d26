//! Driving signal windows from timestamped samples

use super::hopping::{HoppingSignalWindow, PaddedHoppingSignalWindow};
use super::signal::{BaseWindow, SignalWindow, WindowObserver};
use super::tumbling::{PaddedTumblingSignalWindow, TumblingSignalWindow};
use crate::config::SignalWindowConfig;
use crate::error::{WindowError, WindowResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Build the window variant matching `config`
///
/// `hop_size < window_size` selects a hopping window, anything else a tumbling
/// one; `padded` selects the padding variant of either.
pub fn create_signal_window<T>(
    config: &SignalWindowConfig,
    observer: Box<dyn WindowObserver<T>>,
) -> WindowResult<Box<dyn SignalWindow<T>>>
where
    T: Clone + Default + Send + 'static,
{
    config.validate()?;
    let window: Box<dyn SignalWindow<T>> = match (config.is_hopping(), config.padded) {
        (true, true) => Box::new(PaddedHoppingSignalWindow::new(config, observer)?),
        (true, false) => Box::new(HoppingSignalWindow::new(config, observer)?),
        (false, true) => Box::new(PaddedTumblingSignalWindow::new(config, observer)?),
        (false, false) => Box::new(TumblingSignalWindow::new(config, observer)?),
    };
    debug!(
        period = config.period_ticks,
        offset = config.offset_ticks,
        window_size = config.window_size,
        hop_size = config.hop_size,
        padded = config.padded,
        "Created signal window"
    );
    Ok(window)
}

/// Feeds `(time, value)` samples into a signal window
///
/// Samples must sit on the period grid and arrive in increasing time order.
/// Samples that fall outside every window (between tumbling windows with a
/// hop longer than the window, or before the first aligned window of a
/// non-padded variant) are skipped.
#[derive(Clone)]
pub struct SignalWindowOperator<T> {
    config: SignalWindowConfig,
    window: Box<dyn SignalWindow<T>>,
    last_sample_time: Option<i64>,
    samples_accepted: u64,
    samples_skipped: u64,
    windows_emitted: u64,
}

impl<T: Clone + Default + Send + 'static> SignalWindowOperator<T> {
    pub fn new(config: SignalWindowConfig, observer: Box<dyn WindowObserver<T>>) -> WindowResult<Self> {
        let window = create_signal_window(&config, observer)?;
        Ok(Self {
            config,
            window,
            last_sample_time: None,
            samples_accepted: 0,
            samples_skipped: 0,
            windows_emitted: 0,
        })
    }

    /// Process one sample
    pub fn on_sample(&mut self, time: i64, value: T) -> WindowResult<()> {
        let period = self.config.period_ticks;
        let offset = self.config.offset_ticks;
        if time.wrapping_sub(offset).rem_euclid(period) != 0 {
            return Err(WindowError::MisalignedSample { time, offset, period });
        }
        if let Some(last) = self.last_sample_time {
            if time <= last {
                return Err(WindowError::OutOfOrderSample {
                    time,
                    expected: last.saturating_add(period),
                });
            }
        }
        self.last_sample_time = Some(time);

        self.windows_emitted += self.window.advance_time(time)? as u64;
        if time < self.window.next_sample_time() || time >= self.window.window_end_time() {
            trace!(time, next = self.window.next_sample_time(), "Sample outside any window");
            self.samples_skipped += 1;
            return Ok(());
        }
        if self.window.enqueue(time, value)? {
            self.windows_emitted += 1;
        }
        self.samples_accepted += 1;
        Ok(())
    }

    /// Move time forward without a sample, closing padded windows that end
    /// at or before `time`
    ///
    /// A sample at `time` itself is still accepted afterwards.
    pub fn advance_to(&mut self, time: i64) -> WindowResult<()> {
        if self.last_sample_time.is_some_and(|last| time <= last) {
            return Ok(());
        }
        self.windows_emitted += self.window.advance_time(time)? as u64;
        Ok(())
    }

    pub fn config(&self) -> &SignalWindowConfig {
        &self.config
    }

    pub fn window(&self) -> &dyn SignalWindow<T> {
        self.window.as_ref()
    }

    pub fn samples_accepted(&self) -> u64 {
        self.samples_accepted
    }

    pub fn samples_skipped(&self) -> u64 {
        self.samples_skipped
    }

    pub fn windows_emitted(&self) -> u64 {
        self.windows_emitted
    }
}

/// How a window reached its observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowEmission {
    Init,
    Hop,
}

/// Copy of an emitted window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot<T> {
    pub time: i64,
    pub emission: WindowEmission,
    pub values: Vec<T>,
    pub active: Vec<bool>,
}

impl<T> WindowSnapshot<T> {
    /// Values of real samples only
    pub fn active_values(&self) -> impl Iterator<Item = &T> + '_ {
        self.values
            .iter()
            .zip(&self.active)
            .filter_map(|(v, a)| a.then_some(v))
    }

    pub fn inactive_count(&self) -> usize {
        self.active.iter().filter(|a| !**a).count()
    }
}

/// Observer that records every emitted window
///
/// Clones share the same record, so the recorder handed to a window can be
/// read back through any clone kept by the caller.
#[derive(Debug, Clone, Default)]
pub struct WindowRecorder<T> {
    windows: Arc<Mutex<Vec<WindowSnapshot<T>>>>,
}

impl<T: Clone> WindowRecorder<T> {
    pub fn new() -> Self {
        Self {
            windows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Windows emitted so far, oldest first
    pub fn windows(&self) -> Vec<WindowSnapshot<T>> {
        self.lock().clone()
    }

    /// Remove and return the windows emitted so far
    pub fn take(&self) -> Vec<WindowSnapshot<T>> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<WindowSnapshot<T>>> {
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, time: i64, emission: WindowEmission, window: &BaseWindow<T>) {
        let snapshot = WindowSnapshot {
            time,
            emission,
            values: window.iter().cloned().collect(),
            active: (0..window.len()).map(|i| window.is_active(i)).collect(),
        };
        self.lock().push(snapshot);
    }
}

impl<T: Clone + Send + 'static> WindowObserver<T> for WindowRecorder<T> {
    fn on_init(&mut self, time: i64, window: &BaseWindow<T>) {
        self.record(time, WindowEmission::Init, window);
    }

    fn on_hop(&mut self, time: i64, window: &BaseWindow<T>) {
        self.record(time, WindowEmission::Hop, window);
    }

    fn clone_box(&self) -> Box<dyn WindowObserver<T>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator(config: SignalWindowConfig) -> (SignalWindowOperator<i64>, WindowRecorder<i64>) {
        let recorder = WindowRecorder::<i64>::new();
        let op = SignalWindowOperator::new(config, Box::new(recorder.clone())).unwrap();
        (op, recorder)
    }

    #[test]
    fn test_tumbling_emits_full_windows() {
        let (mut op, recorder) = operator(SignalWindowConfig::tumbling(10, 3));
        for t in [0, 10, 20, 30, 40] {
            op.on_sample(t, t).unwrap();
        }
        // 50 missing: the window [30, 60) is discarded
        for t in [60, 70, 80] {
            op.on_sample(t, t).unwrap();
        }

        let windows = recorder.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].time, 30);
        assert_eq!(windows[0].values, vec![0, 10, 20]);
        assert_eq!(windows[1].time, 90);
        assert_eq!(windows[1].values, vec![60, 70, 80]);
        assert!(windows.iter().all(|w| w.emission == WindowEmission::Init));
    }

    #[test]
    fn test_tumbling_with_gaps_between_windows() {
        // 2-sample windows every 3 samples: samples at 20, 50, ... fall between windows
        let (mut op, recorder) = operator(SignalWindowConfig::hopping(10, 2, 3));
        for t in (0..90).step_by(10) {
            op.on_sample(t, t).unwrap();
        }
        let windows = recorder.windows();
        let values: Vec<Vec<i64>> = windows.iter().map(|w| w.values.clone()).collect();
        assert_eq!(values, vec![vec![0, 10], vec![30, 40], vec![60, 70]]);
        assert_eq!(op.samples_skipped(), 3);
    }

    #[test]
    fn test_hopping_init_then_hops() {
        let (mut op, recorder) = operator(SignalWindowConfig::hopping(1, 4, 2));
        for t in 0..8 {
            op.on_sample(t, t).unwrap();
        }
        let windows = recorder.take();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].emission, WindowEmission::Init);
        assert_eq!(windows[0].values, vec![0, 1, 2, 3]);
        assert_eq!(windows[1].emission, WindowEmission::Hop);
        assert_eq!(windows[1].values, vec![2, 3, 4, 5]);
        assert_eq!(windows[2].time, 8);

        // A gap resets history; 11 precedes the next aligned window start
        op.on_sample(11, 11).unwrap();
        for t in 12..16 {
            op.on_sample(t, t).unwrap();
        }
        let windows = recorder.take();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].emission, WindowEmission::Init);
        assert_eq!(windows[0].values, vec![12, 13, 14, 15]);
        assert_eq!(op.samples_skipped(), 1);
    }

    #[test]
    fn test_padded_hopping_marks_missing_samples() {
        let (mut op, recorder) = operator(SignalWindowConfig::hopping(1, 8, 2).with_padding(true));
        for t in (0..20).filter(|t| !(10..13).contains(t)) {
            op.on_sample(t, t + 100).unwrap();
        }
        let windows = recorder.windows();
        let window = windows.iter().find(|w| w.time == 14).unwrap();
        assert_eq!(window.inactive_count(), 3);
        assert_eq!(window.active, vec![true, true, true, true, false, false, false, true]);
        assert_eq!(window.values, vec![106, 107, 108, 109, 0, 0, 0, 113]);
        assert_eq!(window.emission, WindowEmission::Hop);
    }

    #[test]
    fn test_padded_hopping_skips_empty_windows() {
        let (mut op, recorder) = operator(SignalWindowConfig::hopping(1, 4, 2).with_padding(true));
        op.on_sample(0, 1).unwrap();
        op.on_sample(1, 1).unwrap();
        op.on_sample(1_000_000, 2).unwrap();
        op.on_sample(1_000_001, 2).unwrap();

        let windows = recorder.windows();
        let times: Vec<i64> = windows.iter().map(|w| w.time).collect();
        assert_eq!(times, vec![2, 4, 1_000_002]);
        assert_eq!(windows[2].emission, WindowEmission::Init);
        assert_eq!(windows[2].values, vec![0, 0, 2, 2]);
    }

    #[test]
    fn test_padded_tumbling_closes_on_gap() {
        let (mut op, recorder) = operator(SignalWindowConfig::tumbling(10, 4).with_padding(true));
        op.on_sample(0, 1).unwrap();
        op.on_sample(20, 3).unwrap();
        op.on_sample(50, 6).unwrap();
        op.advance_to(80).unwrap();

        let windows = recorder.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].time, 40);
        assert_eq!(windows[0].values, vec![1, 0, 3, 0]);
        assert_eq!(windows[0].active, vec![true, false, true, false]);
        assert_eq!(windows[1].time, 80);
        assert_eq!(windows[1].values, vec![0, 6, 0, 0]);
    }

    #[test]
    fn test_negative_offset_alignment() {
        let config = SignalWindowConfig::tumbling(10, 2).with_offset(-5);
        let (mut op, recorder) = operator(config);
        for t in [-25, -15, -5, 5] {
            op.on_sample(t, t).unwrap();
        }
        let times: Vec<i64> = recorder.windows().iter().map(|w| w.time).collect();
        assert_eq!(times, vec![-5, 15]);
    }

    #[test]
    fn test_rejects_bad_samples() {
        let (mut op, _) = operator(SignalWindowConfig::tumbling(10, 2));
        assert_eq!(
            op.on_sample(5, 0),
            Err(WindowError::MisalignedSample { time: 5, offset: 0, period: 10 })
        );
        op.on_sample(20, 0).unwrap();
        assert_eq!(
            op.on_sample(10, 0),
            Err(WindowError::OutOfOrderSample { time: 10, expected: 30 })
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let recorder = WindowRecorder::<i64>::new();
        let result = SignalWindowOperator::new(SignalWindowConfig::tumbling(10, 0), Box::new(recorder));
        assert!(matches!(result, Err(WindowError::InvalidWindowSize { size: 0 })));
    }

    #[test]
    fn test_operator_clone_is_independent() {
        let (mut op, recorder) = operator(SignalWindowConfig::tumbling(1, 2));
        op.on_sample(0, 0).unwrap();
        let mut copy = op.clone();
        copy.on_sample(1, 1).unwrap();
        assert_eq!(copy.windows_emitted(), 1);
        assert_eq!(op.windows_emitted(), 0);
        assert_eq!(op.window().window().len(), 1);
        // The recorder is shared between clones
        assert_eq!(recorder.windows().len(), 1);
    }
}
