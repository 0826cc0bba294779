//! Measurement records
//!
//! Multi-vector results carry named fields rather than positional tuples so
//! a path can never be read from the wrong slot.

use ndarray::Array1;
use num_complex::Complex64;

use crate::error::{Result, VnaError};
use crate::frequency::Frequency;

/// S-parameters of a two-port at a single frequency
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TwoPortPoint {
    pub s11: Complex64,
    pub s21: Complex64,
    pub s12: Complex64,
    pub s22: Complex64,
}

impl TwoPortPoint {
    pub fn new(s11: Complex64, s21: Complex64, s12: Complex64, s22: Complex64) -> Self {
        Self { s11, s21, s12, s22 }
    }

    /// Determinant S11*S22 - S21*S12
    #[inline]
    pub fn det(&self) -> Complex64 {
        self.s11 * self.s22 - self.s21 * self.s12
    }

    /// Ideal zero-length thru
    pub fn thru() -> Self {
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        Self::new(zero, one, one, zero)
    }

    /// Two uncoupled one-port terminations
    pub fn reflect(port1: Complex64, port2: Complex64) -> Self {
        let zero = Complex64::new(0.0, 0.0);
        Self::new(port1, zero, zero, port2)
    }

    /// Matched, reciprocal attenuator with the given loss in dB
    pub fn attenuator(loss_db: f64) -> Self {
        let t = Complex64::new(10f64.powf(-loss_db / 20.0), 0.0);
        let zero = Complex64::new(0.0, 0.0);
        Self::new(zero, t, t, zero)
    }

    pub fn is_finite(&self) -> bool {
        [self.s11, self.s21, self.s12, self.s22]
            .iter()
            .all(|s| s.re.is_finite() && s.im.is_finite())
    }
}

/// Uncalibrated receiver data for one sweep
///
/// `t1r1` is transmit port 1 / receive port 1 and so on. Each path holds the
/// ratio of received to incident wave, one entry per swept frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAcquisition {
    pub t1r1: Array1<Complex64>,
    pub t1r2: Array1<Complex64>,
    pub t2r1: Array1<Complex64>,
    pub t2r2: Array1<Complex64>,
    /// Reference receiver
    pub reference: Array1<Complex64>,
}

impl RawAcquisition {
    /// Build from the five paths, rejecting vectors of unequal length
    pub fn new(
        t1r1: Array1<Complex64>,
        t1r2: Array1<Complex64>,
        t2r1: Array1<Complex64>,
        t2r2: Array1<Complex64>,
        reference: Array1<Complex64>,
    ) -> Result<Self> {
        let n = t1r1.len();
        if [t1r2.len(), t2r1.len(), t2r2.len(), reference.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(VnaError::TransportFailure(
                "raw acquisition paths have different lengths".into(),
            ));
        }
        Ok(Self {
            t1r1,
            t1r2,
            t2r1,
            t2r2,
            reference,
        })
    }

    /// Build from per-frequency measured points and a reference vector
    pub fn from_points(points: &[TwoPortPoint], reference: Array1<Complex64>) -> Result<Self> {
        Self::new(
            points.iter().map(|p| p.s11).collect(),
            points.iter().map(|p| p.s21).collect(),
            points.iter().map(|p| p.s12).collect(),
            points.iter().map(|p| p.s22).collect(),
            reference,
        )
    }

    /// Number of frequency points
    #[inline]
    pub fn len(&self) -> usize {
        self.t1r1.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.t1r1.is_empty()
    }

    /// Measured (uncorrected) S-parameters at frequency index `f`
    #[inline]
    pub fn point(&self, f: usize) -> TwoPortPoint {
        TwoPortPoint::new(self.t1r1[f], self.t1r2[f], self.t2r1[f], self.t2r2[f])
    }
}

/// Error-corrected two-port S-parameters for one sweep
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedMeasurement {
    pub frequency: Frequency,
    pub s11: Array1<Complex64>,
    pub s21: Array1<Complex64>,
    pub s12: Array1<Complex64>,
    pub s22: Array1<Complex64>,
}

impl CorrectedMeasurement {
    /// Number of frequency points
    #[inline]
    pub fn len(&self) -> usize {
        self.s11.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.s11.is_empty()
    }

    #[inline]
    pub fn point(&self, f: usize) -> TwoPortPoint {
        TwoPortPoint::new(self.s11[f], self.s21[f], self.s12[f], self.s22[f])
    }

    /// True when every entry of every parameter is finite
    pub fn is_finite(&self) -> bool {
        (0..self.len()).all(|f| self.point(f).is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_acquisition_rejects_ragged_paths() {
        let three = Array1::from_elem(3, Complex64::new(1.0, 0.0));
        let two = Array1::from_elem(2, Complex64::new(1.0, 0.0));
        let res = RawAcquisition::new(
            three.clone(),
            three.clone(),
            two,
            three.clone(),
            three,
        );
        assert!(matches!(res, Err(VnaError::TransportFailure(_))));
    }

    #[test]
    fn test_raw_acquisition_point_order() {
        let points = vec![TwoPortPoint::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(2.0, 0.0),
            Complex64::new(3.0, 0.0),
            Complex64::new(4.0, 0.0),
        )];
        let raw =
            RawAcquisition::from_points(&points, Array1::from_elem(1, Complex64::new(1.0, 0.0)))
                .unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.t1r2[0], Complex64::new(2.0, 0.0));
        assert_eq!(raw.t2r1[0], Complex64::new(3.0, 0.0));
        assert_eq!(raw.point(0), points[0]);
    }

    #[test]
    fn test_standard_two_ports() {
        let thru = TwoPortPoint::thru();
        assert_eq!(thru.det(), Complex64::new(-1.0, 0.0));
        let att = TwoPortPoint::attenuator(20.0);
        assert!((att.s21.re - 0.1).abs() < 1e-12);
        assert!(att.is_finite());
    }
}
