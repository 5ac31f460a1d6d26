//! Moving averages over a sampled sensor signal with dropouts
//!
//! Compares a strict hopping window, which resets on every missing sample,
//! with its padded variant, which fills the gaps and keeps emitting.
//!
//! Run with: cargo run --package temporal-processor --example signal_window_demo

use anyhow::Result;
use temporal_processor::config::SignalWindowConfig;
use temporal_processor::window::{SignalWindowOperator, WindowRecorder};
use tracing::{info, Level};

/// Sampling period of the sensor in ticks
const PERIOD: i64 = 10;

fn reading(t: i64) -> f64 {
    20.0 + ((t / PERIOD) % 7) as f64 * 0.5
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    // Samples at 50..=70 and 130 never arrive
    let dropped = [50, 60, 70, 130];

    for padded in [false, true] {
        let config = SignalWindowConfig::hopping(PERIOD, 4, 2).with_padding(padded);
        let recorder = WindowRecorder::<f64>::new();
        let mut op = SignalWindowOperator::new(config, Box::new(recorder.clone()))?;

        for t in (0..=200).step_by(PERIOD as usize) {
            if !dropped.contains(&t) {
                op.on_sample(t, reading(t))?;
            }
        }
        op.advance_to(300)?;

        println!(
            "=== {} hopping window: 4 samples, hop 2 ===",
            if padded { "Padded" } else { "Strict" }
        );
        for window in recorder.take() {
            let real: Vec<f64> = window.active_values().copied().collect();
            let mean = real.iter().sum::<f64>() / real.len().max(1) as f64;
            println!(
                "  ends {:>4}  {:?}  mean {:.2} over {} of {} samples",
                window.time,
                window.emission,
                mean,
                real.len(),
                window.values.len()
            );
        }

        info!(
            padded,
            accepted = op.samples_accepted(),
            skipped = op.samples_skipped(),
            windows = op.windows_emitted(),
            "Signal finished"
        );
    }
    Ok(())
}
