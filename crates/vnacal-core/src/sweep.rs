//! Frequency sweep planning
//!
//! The synthesizer cannot generate arbitrary frequencies. Each band between
//! two of the unit's band boundaries has its own step size, so a requested
//! frequency has to be snapped to the nearest multiple of that step before
//! it can be programmed. [`SweepPlanner`] does this snapping and validates
//! requests against the unit's [`HardwareDetails`].

use std::time::Duration;

use log::debug;

use crate::constants::{FREQ_RESOLUTION_MHZ, MAX_LIMIT_SHIFT_MHZ};
use crate::error::{Result, VnaError};
use crate::frequency::Frequency;
use crate::hardware::{Attenuation, HardwareDetails, HopRate};

/// One synthesizer band
#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    lo: f64,
    hi: f64,
    /// The top band includes the maximum frequency; every other band stops
    /// just short of the boundary above it.
    hi_inclusive: bool,
    step: f64,
}

impl Band {
    fn contains(&self, freq: f64) -> bool {
        freq >= self.lo && (freq < self.hi || (self.hi_inclusive && freq == self.hi))
    }
}

/// Pure sweep computations for one unit
#[derive(Debug, Clone)]
pub struct SweepPlanner {
    hardware: HardwareDetails,
}

impl SweepPlanner {
    pub fn new(hardware: HardwareDetails) -> Self {
        Self { hardware }
    }

    #[inline]
    pub fn hardware(&self) -> &HardwareDetails {
        &self.hardware
    }

    fn check_bounds(&self, freq: f64) -> Result<()> {
        let (min, max) = (self.hardware.min_mhz(), self.hardware.max_mhz());
        if !freq.is_finite() || freq < min || freq > max {
            return Err(VnaError::FreqOutOfBounds { freq, min, max });
        }
        Ok(())
    }

    fn check_points(&self, points: usize) -> Result<()> {
        if points > self.hardware.max_points {
            return Err(VnaError::TooManyPoints {
                requested: points,
                max: self.hardware.max_points,
            });
        }
        Ok(())
    }

    /// Locate the band holding `freq`. Boundaries are reported highest
    /// first; every boundary above `freq` adds a divide-by-two stage.
    fn band(&self, freq: f64) -> Band {
        let mut lo = self.hardware.min_mhz();
        let mut hi = self.hardware.max_mhz();
        let mut hi_inclusive = true;
        let mut divisions = 0i32;

        for &boundary in self.hardware.boundaries() {
            let boundary = f64::from(boundary);
            if freq >= boundary {
                lo = lo.max(boundary);
                break;
            }
            if boundary < hi {
                hi = boundary;
                hi_inclusive = false;
            }
            divisions += 1;
        }

        Band {
            lo,
            hi,
            hi_inclusive,
            step: FREQ_RESOLUTION_MHZ / 2f64.powi(divisions),
        }
    }

    /// Snap an in-bounds frequency onto its band's grid without leaving the band
    fn snap(&self, freq: f64) -> f64 {
        let band = self.band(freq);
        let ratio = freq / band.step;
        let mut k = ratio.round();
        if k * band.step < band.lo {
            k = ratio.ceil();
        }
        if !band.contains(k * band.step) && k * band.step > band.lo {
            k = ratio.floor();
        }
        k * band.step
    }

    /// Adjust a frequency, in MHz, to the nearest one the hardware can generate
    pub fn nearest_legal_frequency(&self, freq: f64) -> Result<f64> {
        self.check_bounds(freq)?;
        Ok(self.snap(freq))
    }

    /// Adjust the limits of an `points`-point linear sweep onto legal frequencies
    ///
    /// When both limits share a band and the stop frequency only has to move
    /// a little, it is moved so that every point lands exactly on the grid
    /// with identical spacing. Otherwise each limit is snapped on its own.
    pub fn fix_sweep_limits(&self, start: f64, stop: f64, points: usize) -> Result<(f64, f64)> {
        self.check_points(points)?;
        self.check_bounds(start)?;
        self.check_bounds(stop)?;
        if start > stop {
            return Err(VnaError::InvalidSweep(format!(
                "start frequency {start} MHz is above stop frequency {stop} MHz"
            )));
        }

        let adj_start = self.snap(start);
        let adj_stop = self.snap(stop);
        if points <= 1 || start == stop {
            return Ok((adj_start, adj_stop));
        }

        let band = self.band(adj_start);
        if band == self.band(adj_stop) {
            let intervals = (points - 1) as f64;
            let spacing_steps = ((adj_stop - adj_start) / intervals / band.step).round();
            let even_stop = adj_start + spacing_steps * band.step * intervals;
            if (even_stop - stop).abs() <= MAX_LIMIT_SHIFT_MHZ
                && even_stop >= adj_start
                && band.contains(even_stop)
            {
                debug!(
                    "Equally spaced sweep: {} points every {} MHz",
                    points,
                    spacing_steps * band.step
                );
                return Ok((adj_start, even_stop));
            }
        }

        Ok((adj_start, adj_stop))
    }

    /// Generate `points` linearly spaced legal frequencies between the
    /// adjusted limits. Each point is snapped individually.
    pub fn generate_linear_sweep(&self, start: f64, stop: f64, points: usize) -> Result<Frequency> {
        let (adj_start, adj_stop) = self.fix_sweep_limits(start, stop, points)?;

        let f = match points {
            0 => Vec::new(),
            1 => vec![adj_start],
            n => {
                let intervals = (n - 1) as f64;
                let span = adj_stop - adj_start;
                (0..n)
                    .map(|i| {
                        if i == n - 1 {
                            adj_stop
                        } else {
                            self.snap(adj_start + span * i as f64 / intervals)
                        }
                    })
                    .collect()
            }
        };

        Ok(Frequency::from_mhz(f))
    }

    /// Snap an explicit list of frequencies. Order and duplicates are kept.
    pub fn set_explicit_frequencies(&self, freqs: &[f64]) -> Result<Frequency> {
        self.check_points(freqs.len())?;
        let f = freqs
            .iter()
            .map(|&freq| self.nearest_legal_frequency(freq))
            .collect::<Result<Vec<_>>>()?;
        Ok(Frequency::from_mhz(f))
    }
}

/// Everything the transport needs to arm an acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub frequencies: Frequency,
    pub hop_rate: HopRate,
    pub attenuation: Attenuation,
}

impl SweepConfig {
    /// Expected duration of one sweep at the configured hop rate
    pub fn sweep_duration(&self) -> Duration {
        let pps = f64::from(self.hop_rate.points_per_second());
        Duration::from_secs_f64(self.frequencies.npoints() as f64 / pps)
    }
}
