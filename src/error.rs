//! Error types shared across the engine.
//!
//! None of these ever escape the render callback: the engine converts them
//! into notifications and silence. They surface directly only from
//! configuration loading and from the units themselves.

use thiserror::Error;

use crate::graph::NodeKind;

/// A native unit failed while processing one block.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("{kind} unit failed: {reason}")]
    Processing { kind: NodeKind, reason: String },

    #[error("block of {len} frames exceeds the unit's capacity of {max}")]
    InvalidBlock { len: usize, max: usize },
}

/// The module handed to the engine cannot drive the graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BootstrapError {
    #[error("native module `{module}` has no {kind} constructor")]
    MissingConstructor { module: String, kind: NodeKind },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[cfg(feature = "serde")]
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}
