//! Error type shared by every module of the crate
//!
//! All fallible operations return [`Result`]. Errors are surfaced to the
//! caller of the offending operation and never leave partially updated state
//! behind.

use std::time::Duration;
use thiserror::Error;

use crate::session::SessionState;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, VnaError>;

/// Errors raised by sweep planning, calibration and session control
#[derive(Error, Debug)]
pub enum VnaError {
    #[error("Operation '{operation}' is not allowed in the {state} state")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Frequency {freq} MHz is outside the hardware range [{min}, {max}] MHz")]
    FreqOutOfBounds { freq: f64, min: f64, max: f64 },

    #[error("{requested} points requested but the hardware supports at most {max}")]
    TooManyPoints { requested: usize, max: usize },

    #[error("Bad calibration: {0}")]
    BadCalibration(String),

    #[error("Calibration standards are singular at frequency index {index}")]
    SingularCalibration { index: usize },

    #[error("Invalid attenuation setting: {0} dB (expected 0..=31)")]
    BadAttenuation(u8),

    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("No response from the unit within {0:?}")]
    Timeout(Duration),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl VnaError {
    /// True for every error that signals a missing, mismatched or unsolvable
    /// calibration.
    pub fn is_calibration_error(&self) -> bool {
        matches!(
            self,
            VnaError::BadCalibration(_) | VnaError::SingularCalibration { .. }
        )
    }
}
