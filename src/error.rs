//! Error types for the pitchshift crate.
//!
//! Errors are confined to configuration and control entry points. The
//! real-time `process()` path never returns an error; anomalies there degrade
//! to silence or a safe algorithmic fallback instead.

use std::fmt;

/// Errors that can occur while configuring the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Sample rate handed to `prepare()` was zero, negative, or non-finite.
    InvalidSampleRate(f32),
    /// Maximum block size handed to `prepare()` was zero.
    InvalidBlockSize(usize),
    /// A normalized parameter value was non-finite.
    InvalidParameterValue {
        /// Parameter index the value was destined for.
        index: usize,
        /// The offending value.
        value: f32,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidSampleRate(rate) => {
                write!(f, "invalid sample rate: {} Hz", rate)
            }
            EngineError::InvalidBlockSize(size) => {
                write!(f, "invalid maximum block size: {}", size)
            }
            EngineError::InvalidParameterValue { index, value } => {
                write!(
                    f,
                    "invalid value {} for parameter index {}",
                    value, index
                )
            }
        }
    }
}

impl std::error::Error for EngineError {}
