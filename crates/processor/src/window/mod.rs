//! Signal windows over uniformly sampled streams
//!
//! A signal carries one sample every `period_ticks`, aligned to
//! `offset_ticks`. Windows hold `window_size` consecutive samples and a new
//! window starts every `hop_size` samples.
//!
//! # Window Types
//!
//! ## Tumbling Windows
//! `hop_size >= window_size`: windows do not overlap. Each full window is
//! reported with [`WindowObserver::on_init`].
//!
//! ```text
//! Samples:  0  1  2  3  4  5  6  7  8
//! Windows:  [-------][-------][-------]      (size 3, hop 3)
//! ```
//!
//! ## Hopping Windows
//! `hop_size < window_size`: consecutive windows share samples. The first
//! window after a reset is reported with `on_init`, the ones that follow with
//! [`WindowObserver::on_hop`].
//!
//! ```text
//! Samples:  0  1  2  3  4  5  6  7
//! Windows:  [----------]                      (size 4, hop 2)
//!                 [----------]
//!                       [----------]
//! ```
//!
//! ## Padded Variants
//! Non-padded windows require every sample: a missing one discards the window
//! being filled. Padded windows put an inactive default value in each missing
//! slot and still emit every window that holds at least one real sample.
//!
//! # Storage
//!
//! Window content lives in a [`CircularBuffer`], a power-of-two ring. Spans of
//! the ring are handed out as [`CircularArrayRange`]s, which split a wrapping
//! span into two contiguous index segments.
//!
//! # Example Usage
//!
//! ```rust
//! use temporal_processor::config::SignalWindowConfig;
//! use temporal_processor::window::{SignalWindowOperator, WindowRecorder};
//!
//! let recorder = WindowRecorder::<f64>::new();
//! let config = SignalWindowConfig::hopping(10, 4, 2);
//! let mut operator = SignalWindowOperator::new(config, Box::new(recorder.clone())).unwrap();
//!
//! for t in (0..80).step_by(10) {
//!     operator.on_sample(t, t as f64).unwrap();
//! }
//!
//! let windows = recorder.windows();
//! assert_eq!(windows.len(), 3);
//! assert_eq!(windows[0].values, vec![0.0, 10.0, 20.0, 30.0]);
//! ```

pub mod buffer;
pub mod circular;
mod hopping;
mod operator;
mod signal;
mod tumbling;

pub use buffer::CircularBuffer;
pub use circular::{ArrayRange, CircularArrayIter, CircularArrayRange};
pub use hopping::{HoppingSignalWindow, PaddedHoppingSignalWindow};
pub use operator::{
    create_signal_window, SignalWindowOperator, WindowEmission, WindowRecorder, WindowSnapshot,
};
pub use signal::{BaseWindow, SignalWindow, WindowObserver};
pub use tumbling::{PaddedTumblingSignalWindow, TumblingSignalWindow};
