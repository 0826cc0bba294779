//! Calibration standards bookkeeping
//!
//! A full two-port calibration needs seven physical standards. They may be
//! measured in any order; measuring one again replaces the earlier data.

use std::fmt;

use log::debug;
use num_complex::Complex64;

use crate::error::{Result, VnaError};
use crate::frequency::Frequency;
use crate::measurement::RawAcquisition;

use super::solt::solve_terms;
use super::terms::CalibrationTermSet;

/// One of the seven calibration measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CalibrationStep {
    P1Open,
    P1Short,
    P1Load,
    P2Open,
    P2Short,
    P2Load,
    Thru,
}

impl CalibrationStep {
    pub const ALL: [CalibrationStep; 7] = [
        CalibrationStep::P1Open,
        CalibrationStep::P1Short,
        CalibrationStep::P1Load,
        CalibrationStep::P2Open,
        CalibrationStep::P2Short,
        CalibrationStep::P2Load,
        CalibrationStep::Thru,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CalibrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalibrationStep::P1Open => "P1_OPEN",
            CalibrationStep::P1Short => "P1_SHORT",
            CalibrationStep::P1Load => "P1_LOAD",
            CalibrationStep::P2Open => "P2_OPEN",
            CalibrationStep::P2Short => "P2_SHORT",
            CalibrationStep::P2Load => "P2_LOAD",
            CalibrationStep::Thru => "THRU",
        };
        f.write_str(name)
    }
}

/// Assumed reflection coefficients of the one-port standards
///
/// The thru is always taken as an ideal zero-length connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardModels {
    pub open: Complex64,
    pub short: Complex64,
    pub load: Complex64,
}

impl Default for StandardModels {
    fn default() -> Self {
        Self {
            open: Complex64::new(1.0, 0.0),
            short: Complex64::new(-1.0, 0.0),
            load: Complex64::new(0.0, 0.0),
        }
    }
}

/// Raw standard measurements recorded against one frequency list
#[derive(Debug, Clone, Default)]
pub struct StandardSet {
    frequency: Frequency,
    recorded: [Option<RawAcquisition>; 7],
    open_phase: Option<Vec<f64>>,
}

impl StandardSet {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            ..Default::default()
        }
    }

    /// Frequencies the recorded standards belong to
    #[inline]
    pub fn frequency(&self) -> &Frequency {
        &self.frequency
    }

    /// Record one standard. Re-recording a step overwrites it.
    pub fn accumulate_standard(&mut self, step: CalibrationStep, raw: RawAcquisition) -> Result<()> {
        if raw.len() != self.frequency.npoints() {
            return Err(VnaError::BadCalibration(format!(
                "{} has {} points but the calibration sweep has {}",
                step,
                raw.len(),
                self.frequency.npoints()
            )));
        }
        if self.recorded[step.index()].replace(raw).is_some() {
            debug!("Replaced calibration standard {}", step);
        } else {
            debug!("Recorded calibration standard {}", step);
        }
        Ok(())
    }

    /// Whether `step` has been recorded
    #[inline]
    pub fn has(&self, step: CalibrationStep) -> bool {
        self.recorded[step.index()].is_some()
    }

    /// Recorded data for `step`
    pub fn get(&self, step: CalibrationStep) -> Option<&RawAcquisition> {
        self.recorded[step.index()].as_ref()
    }

    /// Steps still to be measured
    pub fn missing(&self) -> Vec<CalibrationStep> {
        CalibrationStep::ALL
            .into_iter()
            .filter(|&s| !self.has(s))
            .collect()
    }

    /// True exactly when all seven standards are recorded
    pub fn is_complete(&self) -> bool {
        self.recorded.iter().all(Option::is_some)
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.recorded.iter().all(Option::is_none)
    }

    /// Drop all recorded data and bind to a new frequency list
    pub fn reset(&mut self, frequency: Frequency) {
        *self = Self::new(frequency);
    }

    /// Set per-frequency phase offsets, in radians, for the open standard
    ///
    /// The offsets replace any earlier ones. `None` resets them to zero.
    pub fn set_open_phase_correction(&mut self, phases: Option<Vec<f64>>) -> Result<()> {
        if !(self.has(CalibrationStep::P1Open) || self.has(CalibrationStep::P2Open)) {
            return Err(VnaError::BadCalibration(
                "no open standard has been measured".into(),
            ));
        }
        if let Some(p) = &phases {
            if p.len() != self.frequency.npoints() {
                return Err(VnaError::BadCalibration(format!(
                    "{} phase corrections for {} frequencies",
                    p.len(),
                    self.frequency.npoints()
                )));
            }
        }
        self.open_phase = phases;
        Ok(())
    }

    /// Open phase offset at frequency index `f`
    #[inline]
    pub fn open_phase(&self, f: usize) -> f64 {
        self.open_phase.as_ref().map_or(0.0, |p| p[f])
    }

    /// Derive the 12 error terms from the recorded standards
    pub fn solve(&self, models: &StandardModels) -> Result<CalibrationTermSet> {
        if !self.is_complete() {
            let missing: Vec<String> = self.missing().iter().map(|s| s.to_string()).collect();
            return Err(VnaError::BadCalibration(format!(
                "missing standards: {}",
                missing.join(", ")
            )));
        }
        solve_terms(self, models)
    }
}
