//! Numerical and hardware constants
//!
//! Provides the tolerance values used by the calibration algebra and the
//! fixed properties of the synthesizer and transport defaults.

use std::time::Duration;

/// Tolerance for detecting near-zero values in division and singularity checks.
/// Used to prevent division by zero and detect ill-conditioned standards.
pub const NEAR_ZERO: f64 = 1e-15;

/// Frequency resolution, in MHz, of the band above the highest band boundary.
///
/// This is the 100 MHz reference divided by 2^13. Every band below a boundary
/// runs the synthesizer through one more divide-by-two stage, so its step is
/// half that of the band above it.
pub const FREQ_RESOLUTION_MHZ: f64 = 100.0 / 8192.0;

/// Largest shift, in MHz, that `fix_sweep_limits` may apply to the stop
/// frequency to obtain an equally spaced sweep.
pub const MAX_LIMIT_SHIFT_MHZ: f64 = 0.1;

/// Maximum number of band boundaries a unit can report.
pub const MAX_BAND_BOUNDARIES: usize = 8;

/// Highest attenuation setting, in dB.
pub const MAX_ATTENUATION_DB: u8 = 31;

/// Number of complex vectors in a full two-port error model.
pub const NUM_ERROR_TERMS: usize = 12;

/// Default time to wait for the unit to reply before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(150);
