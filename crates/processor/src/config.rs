//! Configuration types for the stream processor
//!
//! This module provides configuration structures for the pipes and the
//! signal windows. Configurations are plain serde structures and can be
//! loaded from JSON.

use crate::error::{ProcessorError, Result, WindowError, WindowResult};
use serde::{Deserialize, Serialize};

/// Main processor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Pipe configuration
    #[serde(default)]
    pub pipe: PipeConfig,

    /// Signal window configuration
    #[serde(default)]
    pub signal: SignalWindowConfig,
}

impl ProcessorConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ProcessorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.pipe.validate()?;
        self.signal.validate().map_err(|e| ProcessorError::Configuration {
            source: Box::new(e),
        })?;
        Ok(())
    }
}

/// Configuration shared by the snapshot and lifetime pipes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeConfig {
    /// Output batch size; a full output batch is flushed immediately
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of recycled per-key ECQ buckets kept for reuse
    #[serde(default = "default_bucket_pool_size")]
    pub bucket_pool_size: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            bucket_pool_size: default_bucket_pool_size(),
        }
    }
}

impl PipeConfig {
    /// Create a configuration with the given output batch size
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Default::default()
        }
    }

    /// Validate pipe configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ProcessorError::Configuration {
                source: "batch_size must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

/// Signal window configuration
///
/// Samples arrive on the grid `offset_ticks + k * period_ticks`. A window
/// spans `window_size` samples and a new window starts every `hop_size`
/// samples. Windows with `hop_size < window_size` overlap (hopping), others
/// do not (tumbling).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalWindowConfig {
    /// Sampling period in ticks
    pub period_ticks: i64,

    /// Offset of the sampling and window grid in ticks
    #[serde(default)]
    pub offset_ticks: i64,

    /// Window length in samples
    pub window_size: usize,

    /// Hop length in samples
    pub hop_size: usize,

    /// Materialize missing samples with a default value
    #[serde(default)]
    pub padded: bool,
}

impl Default for SignalWindowConfig {
    fn default() -> Self {
        Self {
            period_ticks: 1,
            offset_ticks: 0,
            window_size: 1,
            hop_size: 1,
            padded: false,
        }
    }
}

impl SignalWindowConfig {
    /// Create a tumbling window configuration
    pub fn tumbling(period_ticks: i64, window_size: usize) -> Self {
        Self {
            period_ticks,
            offset_ticks: 0,
            window_size,
            hop_size: window_size,
            padded: false,
        }
    }

    /// Create a hopping window configuration
    pub fn hopping(period_ticks: i64, window_size: usize, hop_size: usize) -> Self {
        Self {
            period_ticks,
            offset_ticks: 0,
            window_size,
            hop_size,
            padded: false,
        }
    }

    /// Set the grid offset
    pub fn with_offset(mut self, offset_ticks: i64) -> Self {
        self.offset_ticks = offset_ticks;
        self
    }

    /// Enable or disable padding of missing samples
    pub fn with_padding(mut self, padded: bool) -> Self {
        self.padded = padded;
        self
    }

    /// True when consecutive windows overlap
    pub fn is_hopping(&self) -> bool {
        self.hop_size < self.window_size
    }

    /// Window length in ticks
    pub fn window_size_ticks(&self) -> i64 {
        self.window_size as i64 * self.period_ticks
    }

    /// Hop length in ticks
    pub fn hop_size_ticks(&self) -> i64 {
        self.hop_size as i64 * self.period_ticks
    }

    /// Validate signal window configuration
    pub fn validate(&self) -> WindowResult<()> {
        if self.period_ticks <= 0 {
            return Err(WindowError::InvalidPeriod {
                period: self.period_ticks,
            });
        }
        if self.window_size == 0 {
            return Err(WindowError::InvalidWindowSize {
                size: self.window_size,
            });
        }
        if self.hop_size == 0 {
            return Err(WindowError::InvalidHopSize { hop: self.hop_size });
        }
        Ok(())
    }
}

fn default_batch_size() -> usize {
    80_000
}

fn default_bucket_pool_size() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipe.batch_size, 80_000);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = PipeConfig::with_batch_size(0);
        assert!(matches!(
            config.validate(),
            Err(ProcessorError::Configuration { .. })
        ));
    }

    #[test]
    fn test_signal_config_validation() {
        assert!(SignalWindowConfig::tumbling(10, 4).validate().is_ok());
        assert_eq!(
            SignalWindowConfig::tumbling(0, 4).validate(),
            Err(WindowError::InvalidPeriod { period: 0 })
        );
        assert_eq!(
            SignalWindowConfig::hopping(10, 4, 0).validate(),
            Err(WindowError::InvalidHopSize { hop: 0 })
        );
    }

    #[test]
    fn test_signal_config_ticks() {
        let config = SignalWindowConfig::hopping(10, 8, 2).with_offset(5);
        assert!(config.is_hopping());
        assert_eq!(config.window_size_ticks(), 80);
        assert_eq!(config.hop_size_ticks(), 20);
        assert!(!SignalWindowConfig::tumbling(10, 8).is_hopping());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "pipe": { "batch_size": 16 },
            "signal": { "period_ticks": 10, "window_size": 4, "hop_size": 2, "padded": true }
        }"#;
        let config = ProcessorConfig::from_json_str(json).unwrap();
        assert_eq!(config.pipe.batch_size, 16);
        assert_eq!(config.pipe.bucket_pool_size, 64);
        assert!(config.signal.padded);
        assert_eq!(config.signal.offset_ticks, 0);
    }

    #[test]
    fn test_from_json_invalid() {
        let json = r#"{ "signal": { "period_ticks": 10, "window_size": 0, "hop_size": 2 } }"#;
        assert!(ProcessorConfig::from_json_str(json).is_err());
    }
}
