//! Calibration store owned by a session
//!
//! Holds the active term set on its own frequency list together with the
//! standards being accumulated for the current sweep.

use log::{debug, warn};
use ndarray::Array1;
use num_complex::Complex64;

use crate::constants::NUM_ERROR_TERMS;
use crate::error::{Result, VnaError};
use crate::frequency::Frequency;
use crate::measurement::RawAcquisition;

use super::standards::{CalibrationStep, StandardModels, StandardSet};
use super::terms::CalibrationTermSet;

#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    terms: Option<CalibrationTermSet>,
    standards: StandardSet,
    models: StandardModels,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop terms and standards
    pub fn clear(&mut self) {
        let freq = self.standards.frequency().clone();
        self.terms = None;
        self.standards.reset(freq);
        debug!("Calibration cleared");
    }

    /// Bind the standards to a new sweep
    ///
    /// Recorded standards belong to the old frequencies and are discarded.
    /// Terms are kept; they are interpolated onto the sweep when used.
    pub fn rebind(&mut self, sweep: &Frequency) {
        if self.standards.frequency() == sweep {
            return;
        }
        if !self.standards.is_empty() {
            warn!(
                "Sweep changed, discarding {} recorded calibration standards",
                CalibrationStep::ALL.len() - self.standards.missing().len()
            );
        }
        self.standards.reset(sweep.clone());
    }

    /// Record one standard and solve once all seven are present
    ///
    /// Returns true when this call produced a new term set. A failed solve
    /// leaves both the standards and the terms as they were.
    pub fn accumulate(&mut self, step: CalibrationStep, raw: RawAcquisition) -> Result<bool> {
        let mut next = self.standards.clone();
        next.accumulate_standard(step, raw)?;

        if !next.is_complete() {
            self.standards = next;
            return Ok(false);
        }

        let terms = next.solve(&self.models)?;
        debug!("All standards recorded, installing solved calibration");
        self.standards = next;
        self.terms = Some(terms);
        Ok(true)
    }

    #[inline]
    pub fn have_standard(&self, step: CalibrationStep) -> bool {
        self.standards.has(step)
    }

    pub fn standards(&self) -> &StandardSet {
        &self.standards
    }

    /// Set open phase offsets and re-solve if all standards are present
    pub fn set_open_phase_correction(&mut self, phases: Option<Vec<f64>>) -> Result<()> {
        let mut next = self.standards.clone();
        next.set_open_phase_correction(phases)?;
        if next.is_complete() {
            self.terms = Some(next.solve(&self.models)?);
        }
        self.standards = next;
        Ok(())
    }

    /// Replace the terms wholesale
    ///
    /// The frequencies must be finite and strictly ascending so the terms
    /// can be interpolated onto any sweep.
    pub fn install(&mut self, terms: CalibrationTermSet) -> Result<()> {
        if !terms.is_consistent() {
            return Err(VnaError::BadCalibration(
                "calibration terms are incomplete".into(),
            ));
        }
        if !terms.frequency.is_strictly_ascending() {
            return Err(VnaError::BadCalibration(
                "calibration frequencies must be finite and strictly ascending".into(),
            ));
        }
        debug!("Installed calibration at {} frequencies", terms.nfreq());
        self.terms = Some(terms);
        Ok(())
    }

    /// Import a flat frequency list and 12 vectors in export order
    pub fn import(&mut self, freqs: &[f64], vectors: [Array1<Complex64>; NUM_ERROR_TERMS]) -> Result<()> {
        let terms = CalibrationTermSet::from_vectors(Frequency::from_mhz(freqs.to_vec()), vectors)?;
        self.install(terms)
    }

    /// Copy of the active terms
    pub fn export(&self) -> Result<CalibrationTermSet> {
        self.terms
            .clone()
            .ok_or_else(|| VnaError::BadCalibration("calibration is incomplete".into()))
    }

    /// True when a term set is installed
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.terms.is_some()
    }

    /// Frequencies the installed terms were solved or imported at
    pub fn calibration_frequencies(&self) -> &[f64] {
        self.terms.as_ref().map_or(&[][..], |t| t.frequency.f())
    }

    /// Terms evaluated on `sweep`
    pub fn terms_for(&self, sweep: &Frequency) -> Result<CalibrationTermSet> {
        let terms = self
            .terms
            .as_ref()
            .ok_or_else(|| VnaError::BadCalibration("calibration is incomplete".into()))?;
        if &terms.frequency == sweep {
            Ok(terms.clone())
        } else {
            terms.interpolate(sweep)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::terms::ErrorTerms;
    use crate::measurement::TwoPortPoint;
    use approx::assert_relative_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn raw(p: TwoPortPoint, n: usize) -> RawAcquisition {
        RawAcquisition::from_points(&vec![p; n], Array1::from_elem(n, c(1.0, 0.0))).unwrap()
    }

    fn standard(step: CalibrationStep) -> TwoPortPoint {
        let (open, short, load) = (c(1.0, 0.0), c(-1.0, 0.0), c(0.0, 0.0));
        match step {
            CalibrationStep::P1Open => TwoPortPoint::reflect(open, load),
            CalibrationStep::P1Short => TwoPortPoint::reflect(short, load),
            CalibrationStep::P1Load => TwoPortPoint::reflect(load, load),
            CalibrationStep::P2Open => TwoPortPoint::reflect(load, open),
            CalibrationStep::P2Short => TwoPortPoint::reflect(load, short),
            CalibrationStep::P2Load => TwoPortPoint::reflect(load, load),
            CalibrationStep::Thru => TwoPortPoint::thru(),
        }
    }

    #[test]
    fn test_uncalibrated_store() {
        let store = CalibrationStore::new();
        assert!(!store.is_complete());
        assert!(store.calibration_frequencies().is_empty());
        assert!(matches!(store.export(), Err(VnaError::BadCalibration(_))));
        let sweep = Frequency::from_mhz(vec![500.0]);
        assert!(matches!(store.terms_for(&sweep), Err(VnaError::BadCalibration(_))));
    }

    #[test]
    fn test_accumulate_solves_on_seventh_standard() {
        let sweep = Frequency::from_mhz(vec![500.0, 600.0, 700.0]);
        let mut store = CalibrationStore::new();
        store.rebind(&sweep);

        for (i, step) in CalibrationStep::ALL.iter().enumerate() {
            let solved = store.accumulate(*step, raw(standard(*step), 3)).unwrap();
            assert_eq!(solved, i == 6);
            assert!(store.have_standard(*step));
        }
        assert!(store.is_complete());
        assert_eq!(store.calibration_frequencies(), sweep.f());

        let terms = store.export().unwrap();
        let ideal = ErrorTerms::ideal().to_array();
        for (got, want) in terms.point(1).to_array().iter().zip(ideal.iter()) {
            assert_relative_eq!(got.re, want.re, epsilon = 1e-12);
            assert_relative_eq!(got.im, want.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_singular_solve_leaves_state_untouched() {
        let sweep = Frequency::from_mhz(vec![500.0]);
        let mut store = CalibrationStore::new();
        store.rebind(&sweep);
        for step in &CalibrationStep::ALL[..6] {
            store.accumulate(*step, raw(standard(*step), 1)).unwrap();
        }
        // A thru that transmits nothing cannot be solved
        let dead = TwoPortPoint::reflect(c(0.0, 0.0), c(0.0, 0.0));
        let res = store.accumulate(CalibrationStep::Thru, raw(dead, 1));
        assert!(matches!(res, Err(VnaError::SingularCalibration { index: 0 })));
        assert!(!store.have_standard(CalibrationStep::Thru));
        assert!(!store.is_complete());
    }

    #[test]
    fn test_rebind_discards_standards_keeps_terms() {
        let sweep = Frequency::from_mhz(vec![500.0, 600.0]);
        let mut store = CalibrationStore::new();
        store.rebind(&sweep);
        for step in CalibrationStep::ALL {
            store.accumulate(step, raw(standard(step), 2)).unwrap();
        }

        store.rebind(&Frequency::from_mhz(vec![550.0]));
        assert!(store.standards().is_empty());
        assert!(store.is_complete());

        let interp = store.terms_for(&Frequency::from_mhz(vec![550.0])).unwrap();
        assert_eq!(interp.nfreq(), 1);
        assert_relative_eq!(interp.e10e01[0].re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_import_checks_lengths() {
        let mut store = CalibrationStore::new();
        let good: [Array1<Complex64>; NUM_ERROR_TERMS] =
            std::array::from_fn(|k| Array1::from_elem(2, c(k as f64, 0.5)));
        store.import(&[1000.0, 2000.0], good).unwrap();
        assert!(store.is_complete());
        assert_eq!(store.calibration_frequencies(), &[1000.0, 2000.0]);

        let mut bad: [Array1<Complex64>; NUM_ERROR_TERMS] =
            std::array::from_fn(|_| Array1::from_elem(2, c(1.0, 0.0)));
        bad[4] = Array1::from_elem(3, c(1.0, 0.0));
        let res = store.import(&[1000.0, 2000.0], bad);
        assert!(matches!(res, Err(VnaError::BadCalibration(_))));
        // Previous terms survive
        assert_eq!(store.export().unwrap().e30[1], c(3.0, 0.5));
    }

    #[test]
    fn test_install_rejects_unordered_frequencies() {
        let mut store = CalibrationStore::new();
        let v = |n: usize| -> [Array1<Complex64>; NUM_ERROR_TERMS] {
            std::array::from_fn(|k| Array1::from_elem(n, c(k as f64 + 1.0, 0.0)))
        };
        store.import(&[1000.0, 2000.0, 3000.0], v(3)).unwrap();

        for freqs in [
            [3000.0, 1000.0, 2000.0],
            [1000.0, 1000.0, 2000.0],
            [1000.0, f64::NAN, 3000.0],
            [1000.0, 2000.0, f64::INFINITY],
        ] {
            let res = store.import(&freqs, v(3));
            assert!(matches!(res, Err(VnaError::BadCalibration(_))));
        }
        assert_eq!(store.calibration_frequencies(), &[1000.0, 2000.0, 3000.0]);
    }

    #[test]
    fn test_solved_terms_follow_sweep_order() {
        // A sweep may be unordered; its own solve is used without interpolation
        let sweep = Frequency::from_mhz(vec![700.0, 500.0, 500.0]);
        let mut store = CalibrationStore::new();
        store.rebind(&sweep);
        for step in CalibrationStep::ALL {
            store.accumulate(step, raw(standard(step), 3)).unwrap();
        }
        assert_eq!(store.calibration_frequencies(), sweep.f());
        assert_eq!(store.terms_for(&sweep).unwrap().nfreq(), 3);
    }

    #[test]
    fn test_clear() {
        let mut store = CalibrationStore::new();
        let v: [Array1<Complex64>; NUM_ERROR_TERMS] =
            std::array::from_fn(|_| Array1::from_elem(1, c(1.0, 0.0)));
        store.import(&[1000.0], v).unwrap();
        store.clear();
        assert!(!store.is_complete());
    }
}
