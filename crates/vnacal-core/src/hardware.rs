//! Hardware description and acquisition settings
//!
//! [`HardwareDetails`] is downloaded from the unit during initialization and
//! describes what it can generate. [`HopRate`] and [`Attenuation`] are the
//! two acquisition settings programmed alongside the sweep.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_ATTENUATION_DB, MAX_BAND_BOUNDARIES};
use crate::error::{Result, VnaError};

/// Capabilities of a specific unit
///
/// Frequencies and band boundaries are in MHz. Before initialization every
/// field is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardwareDetails {
    /// Minimum frequency the unit can measure
    pub min_frequency: u32,
    /// Maximum frequency the unit can measure
    pub max_frequency: u32,
    /// Maximum number of points in a single acquisition
    pub max_points: usize,
    pub serial_number: u32,
    /// Synthesizer band boundaries, highest frequency first
    pub band_boundaries: [u32; MAX_BAND_BOUNDARIES],
    /// Number of valid entries in `band_boundaries`
    pub band_boundary_count: usize,
}

impl HardwareDetails {
    /// The reported band boundaries, highest first
    pub fn boundaries(&self) -> &[u32] {
        &self.band_boundaries[..self.band_boundary_count.min(MAX_BAND_BOUNDARIES)]
    }

    #[inline]
    pub fn min_mhz(&self) -> f64 {
        f64::from(self.min_frequency)
    }

    #[inline]
    pub fn max_mhz(&self) -> f64 {
        f64::from(self.max_frequency)
    }

    /// True once real details have been downloaded from a unit
    pub fn is_populated(&self) -> bool {
        *self != HardwareDetails::default()
    }
}

/// Frequency hopping rate, i.e. time spent sampling each point
///
/// Faster rates trade dynamic range for sweep speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HopRate {
    #[serde(rename = "45K")]
    Hop45K,
    #[serde(rename = "30K")]
    Hop30K,
    #[serde(rename = "15K")]
    Hop15K,
    #[serde(rename = "7K")]
    Hop7K,
    #[serde(rename = "3K")]
    Hop3K,
    #[serde(rename = "2K")]
    Hop2K,
    #[serde(rename = "1K")]
    Hop1K,
    #[serde(rename = "550")]
    Hop550,
    #[serde(rename = "312")]
    Hop312,
    #[serde(rename = "156")]
    Hop156,
    #[serde(rename = "78")]
    Hop78,
    #[serde(rename = "39")]
    Hop39,
    #[serde(rename = "20")]
    Hop20,
}

impl HopRate {
    /// Every supported rate, fastest first
    pub const ALL: [HopRate; 13] = [
        HopRate::Hop45K,
        HopRate::Hop30K,
        HopRate::Hop15K,
        HopRate::Hop7K,
        HopRate::Hop3K,
        HopRate::Hop2K,
        HopRate::Hop1K,
        HopRate::Hop550,
        HopRate::Hop312,
        HopRate::Hop156,
        HopRate::Hop78,
        HopRate::Hop39,
        HopRate::Hop20,
    ];

    /// Nominal sampling rate in points per second
    pub fn points_per_second(&self) -> u32 {
        match self {
            HopRate::Hop45K => 45_000,
            HopRate::Hop30K => 30_000,
            HopRate::Hop15K => 15_000,
            HopRate::Hop7K => 7_000,
            HopRate::Hop3K => 3_000,
            HopRate::Hop2K => 2_000,
            HopRate::Hop1K => 1_000,
            HopRate::Hop550 => 550,
            HopRate::Hop312 => 312,
            HopRate::Hop156 => 156,
            HopRate::Hop78 => 78,
            HopRate::Hop39 => 39,
            HopRate::Hop20 => 20,
        }
    }
}

/// Source attenuation in 1 dB steps from 0 to 31 dB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attenuation(u8);

impl Attenuation {
    pub const MIN: Attenuation = Attenuation(0);
    pub const MAX: Attenuation = Attenuation(MAX_ATTENUATION_DB);

    /// Create an attenuation setting, rejecting values above 31 dB
    pub fn new(db: u8) -> Result<Self> {
        if db > MAX_ATTENUATION_DB {
            return Err(VnaError::BadAttenuation(db));
        }
        Ok(Self(db))
    }

    #[inline]
    pub fn db(&self) -> u8 {
        self.0
    }

    /// Linear amplitude factor applied to the source signal
    pub fn amplitude(&self) -> f64 {
        10f64.powf(-f64::from(self.0) / 20.0)
    }

    /// Every legal setting, 0 dB first
    pub fn all() -> impl Iterator<Item = Attenuation> {
        (0..=MAX_ATTENUATION_DB).map(Attenuation)
    }
}

impl TryFrom<u8> for Attenuation {
    type Error = VnaError;

    fn try_from(db: u8) -> Result<Self> {
        Attenuation::new(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_details_are_zero() {
        let details = HardwareDetails::default();
        assert_eq!(details.min_frequency, 0);
        assert_eq!(details.max_frequency, 0);
        assert_eq!(details.max_points, 0);
        assert_eq!(details.serial_number, 0);
        assert_eq!(details.band_boundaries, [0; 8]);
        assert!(details.boundaries().is_empty());
        assert!(!details.is_populated());
    }

    #[test]
    fn test_boundaries_respect_count() {
        let details = HardwareDetails {
            min_frequency: 375,
            max_frequency: 6050,
            max_points: 4001,
            serial_number: 401,
            band_boundaries: [3000, 1500, 750, 0, 0, 0, 0, 0],
            band_boundary_count: 3,
        };
        assert_eq!(details.boundaries(), &[3000, 1500, 750]);
        assert!(details.is_populated());
    }

    #[test]
    fn test_attenuation_range() {
        assert_eq!(Attenuation::new(0).map(|a| a.db()).ok(), Some(0));
        assert_eq!(Attenuation::new(31).map(|a| a.db()).ok(), Some(31));
        assert!(matches!(
            Attenuation::new(32),
            Err(VnaError::BadAttenuation(32))
        ));
        assert_eq!(Attenuation::all().count(), 32);
    }

    #[test]
    fn test_attenuation_amplitude() {
        assert_relative_eq!(Attenuation::MIN.amplitude(), 1.0);
        let a20 = Attenuation::new(20).unwrap();
        assert_relative_eq!(a20.amplitude(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_hop_rates_are_ordered() {
        let rates: Vec<u32> = HopRate::ALL.iter().map(|h| h.points_per_second()).collect();
        assert!(rates.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(rates[0], 45_000);
        assert_eq!(rates[12], 20);
    }
}
