//! Engine configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::MAX_BLOCK_SIZE;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Samples per second the host renders at.
    pub sample_rate: f32,
    /// Largest block rendered in one pass. Longer callbacks are chunked.
    pub max_block_size: usize,
    /// Slots in the control → render command ring.
    pub command_capacity: usize,
    /// Slots in the render → control notification ring.
    pub notification_capacity: usize,
    /// Upper bound on MIDI drain passes per block (transpose chains).
    pub max_dispatch_passes: usize,
    /// Tempo the transport starts at.
    pub default_bpm: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            max_block_size: MAX_BLOCK_SIZE,
            command_capacity: 1024,
            notification_capacity: 1024,
            max_dispatch_passes: 8,
            default_bpm: 120.0,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_max_block_size(mut self, frames: usize) -> Self {
        self.max_block_size = frames;
        self
    }

    /// Parse a TOML document. Missing fields keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sample_rate.is_finite() || self.sample_rate < 1_000.0 {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: format!("{} Hz is not a usable rate", self.sample_rate),
            });
        }
        if self.max_block_size == 0 || self.max_block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::Invalid {
                field: "max_block_size",
                reason: format!("must be within 1..={MAX_BLOCK_SIZE}"),
            });
        }
        if self.command_capacity == 0 || self.notification_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "command_capacity",
                reason: "ring buffers need at least one slot".into(),
            });
        }
        if self.max_dispatch_passes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_dispatch_passes",
                reason: "at least one drain pass is required".into(),
            });
        }
        if !(20.0..=300.0).contains(&self.default_bpm) {
            return Err(ConfigError::Invalid {
                field: "default_bpm",
                reason: format!("{} is outside 20..=300", self.default_bpm),
            });
        }
        Ok(())
    }
}
