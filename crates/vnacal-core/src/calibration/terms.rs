//! Twelve-term error model
//!
//! [`ErrorTerms`] holds the model at one frequency, [`CalibrationTermSet`]
//! holds one complex vector per term over a list of calibration frequencies.
//!
//! | field      | term | meaning                         |
//! |------------|------|---------------------------------|
//! | `e00`      | EDF  | forward directivity             |
//! | `e11`      | ESF  | forward source match            |
//! | `e10e01`   | ERF  | forward reflection tracking     |
//! | `e30`      | EXF  | forward isolation               |
//! | `e22`      | ELF  | forward load match              |
//! | `e10e32`   | ETF  | forward transmission tracking   |
//! | `ep33`     | EDR  | reverse directivity             |
//! | `ep22`     | ESR  | reverse source match            |
//! | `ep12ep32` | ERR  | reverse reflection tracking     |
//! | `ep03`     | EXR  | reverse isolation               |
//! | `ep11`     | ELR  | reverse load match              |
//! | `ep23ep01` | ETR  | reverse transmission tracking   |

use ndarray::Array1;
use num_complex::Complex64;

use crate::constants::{NEAR_ZERO, NUM_ERROR_TERMS};
use crate::error::{Result, VnaError};
use crate::frequency::Frequency;
use crate::measurement::TwoPortPoint;

/// Term names in export order
pub const TERM_NAMES: [&str; NUM_ERROR_TERMS] = [
    "e00", "e11", "e10e01", "e30", "e22", "e10e32", "ep33", "ep22", "ep12ep32", "ep03", "ep11",
    "ep23ep01",
];

/// Twelve-term error model at a single frequency
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorTerms {
    pub e00: Complex64,
    pub e11: Complex64,
    pub e10e01: Complex64,
    pub e30: Complex64,
    pub e22: Complex64,
    pub e10e32: Complex64,
    pub ep33: Complex64,
    pub ep22: Complex64,
    pub ep12ep32: Complex64,
    pub ep03: Complex64,
    pub ep11: Complex64,
    pub ep23ep01: Complex64,
}

impl ErrorTerms {
    /// Error model of a perfect instrument
    pub fn ideal() -> Self {
        let one = Complex64::new(1.0, 0.0);
        Self {
            e10e01: one,
            e10e32: one,
            ep12ep32: one,
            ep23ep01: one,
            ..Default::default()
        }
    }

    /// Terms in export order
    pub fn to_array(&self) -> [Complex64; NUM_ERROR_TERMS] {
        [
            self.e00,
            self.e11,
            self.e10e01,
            self.e30,
            self.e22,
            self.e10e32,
            self.ep33,
            self.ep22,
            self.ep12ep32,
            self.ep03,
            self.ep11,
            self.ep23ep01,
        ]
    }

    pub fn from_array(t: [Complex64; NUM_ERROR_TERMS]) -> Self {
        Self {
            e00: t[0],
            e11: t[1],
            e10e01: t[2],
            e30: t[3],
            e22: t[4],
            e10e32: t[5],
            ep33: t[6],
            ep22: t[7],
            ep12ep32: t[8],
            ep03: t[9],
            ep11: t[10],
            ep23ep01: t[11],
        }
    }

    /// What an instrument with these errors reports for a device `dut`
    pub fn distort(&self, dut: &TwoPortPoint) -> TwoPortPoint {
        let one = Complex64::new(1.0, 0.0);
        let ds = dut.det();

        let den_f = one - self.e11 * dut.s11 - self.e22 * dut.s22 + self.e11 * self.e22 * ds;
        let den_r = one - self.ep22 * dut.s22 - self.ep11 * dut.s11 + self.ep22 * self.ep11 * ds;

        TwoPortPoint {
            s11: self.e00 + self.e10e01 * (dut.s11 - self.e22 * ds) / den_f,
            s21: self.e30 + self.e10e32 * dut.s21 / den_f,
            s12: self.ep03 + self.ep23ep01 * dut.s12 / den_r,
            s22: self.ep33 + self.ep12ep32 * (dut.s22 - self.ep11 * ds) / den_r,
        }
    }

    /// Remove these errors from a measured point
    ///
    /// Returns `None` when the terms cannot be inverted at this point.
    pub fn correct(&self, measured: &TwoPortPoint) -> Option<TwoPortPoint> {
        let one = Complex64::new(1.0, 0.0);
        if [self.e10e01, self.e10e32, self.ep23ep01, self.ep12ep32]
            .iter()
            .any(|t| t.norm() <= NEAR_ZERO)
        {
            return None;
        }

        let n11 = (measured.s11 - self.e00) / self.e10e01;
        let n21 = (measured.s21 - self.e30) / self.e10e32;
        let n12 = (measured.s12 - self.ep03) / self.ep23ep01;
        let n22 = (measured.s22 - self.ep33) / self.ep12ep32;

        let den = (one + n11 * self.e11) * (one + n22 * self.ep22) - n21 * n12 * self.e22 * self.ep11;
        if den.norm() <= NEAR_ZERO {
            return None;
        }

        Some(TwoPortPoint {
            s11: (n11 * (one + n22 * self.ep22) - self.e22 * n21 * n12) / den,
            s21: n21 * (one + n22 * (self.ep22 - self.e22)) / den,
            s12: n12 * (one + n11 * (self.e11 - self.ep11)) / den,
            s22: (n22 * (one + n11 * self.e11) - self.ep11 * n21 * n12) / den,
        })
    }
}

/// Full two-port error model over a list of calibration frequencies
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTermSet {
    pub frequency: Frequency,
    pub e00: Array1<Complex64>,
    pub e11: Array1<Complex64>,
    pub e10e01: Array1<Complex64>,
    pub e30: Array1<Complex64>,
    pub e22: Array1<Complex64>,
    pub e10e32: Array1<Complex64>,
    pub ep33: Array1<Complex64>,
    pub ep22: Array1<Complex64>,
    pub ep12ep32: Array1<Complex64>,
    pub ep03: Array1<Complex64>,
    pub ep11: Array1<Complex64>,
    pub ep23ep01: Array1<Complex64>,
}

impl CalibrationTermSet {
    /// Build from a frequency list and the 12 vectors in export order
    ///
    /// Every vector must have one entry per frequency and the list must not
    /// be empty.
    pub fn from_vectors(
        frequency: Frequency,
        terms: [Array1<Complex64>; NUM_ERROR_TERMS],
    ) -> Result<Self> {
        let n = frequency.npoints();
        if n == 0 {
            return Err(VnaError::BadCalibration(
                "calibration has no frequencies".into(),
            ));
        }
        if let Some((name, t)) = TERM_NAMES.iter().zip(terms.iter()).find(|(_, t)| t.len() != n) {
            return Err(VnaError::BadCalibration(format!(
                "term {} has {} entries, expected {}",
                name,
                t.len(),
                n
            )));
        }

        let [e00, e11, e10e01, e30, e22, e10e32, ep33, ep22, ep12ep32, ep03, ep11, ep23ep01] =
            terms;
        Ok(Self {
            frequency,
            e00,
            e11,
            e10e01,
            e30,
            e22,
            e10e32,
            ep33,
            ep22,
            ep12ep32,
            ep03,
            ep11,
            ep23ep01,
        })
    }

    /// Build from per-frequency error models
    pub fn from_points(frequency: Frequency, points: &[ErrorTerms]) -> Result<Self> {
        let terms: [Array1<Complex64>; NUM_ERROR_TERMS] = std::array::from_fn(|k| {
            points.iter().map(|p| p.to_array()[k]).collect::<Array1<_>>()
        });
        Self::from_vectors(frequency, terms)
    }

    /// The 12 vectors in export order
    pub fn to_vectors(&self) -> [Array1<Complex64>; NUM_ERROR_TERMS] {
        [
            self.e00.clone(),
            self.e11.clone(),
            self.e10e01.clone(),
            self.e30.clone(),
            self.e22.clone(),
            self.e10e32.clone(),
            self.ep33.clone(),
            self.ep22.clone(),
            self.ep12ep32.clone(),
            self.ep03.clone(),
            self.ep11.clone(),
            self.ep23ep01.clone(),
        ]
    }

    fn vectors(&self) -> [&Array1<Complex64>; NUM_ERROR_TERMS] {
        [
            &self.e00,
            &self.e11,
            &self.e10e01,
            &self.e30,
            &self.e22,
            &self.e10e32,
            &self.ep33,
            &self.ep22,
            &self.ep12ep32,
            &self.ep03,
            &self.ep11,
            &self.ep23ep01,
        ]
    }

    /// Number of calibration frequencies
    #[inline]
    pub fn nfreq(&self) -> usize {
        self.frequency.npoints()
    }

    /// True when every vector has one entry per calibration frequency
    pub fn is_consistent(&self) -> bool {
        let n = self.nfreq();
        n > 0 && self.vectors().iter().all(|t| t.len() == n)
    }

    /// Error model at calibration frequency index `f`
    pub fn point(&self, f: usize) -> ErrorTerms {
        ErrorTerms::from_array(self.vectors().map(|t| t[f]))
    }

    /// Interpolate the terms onto another frequency list
    ///
    /// Uses linear interpolation in the complex domain. Points outside the
    /// calibrated range are extrapolated from the two nearest points.
    pub fn interpolate(&self, new_freq: &Frequency) -> Result<Self> {
        let old_f = self.frequency.f();
        let terms = self
            .vectors()
            .map(|t| {
                new_freq
                    .f()
                    .iter()
                    .map(|&nf| interpolate_complex(old_f, t, nf))
                    .collect::<Array1<_>>()
            });
        Self::from_vectors(new_freq.clone(), terms)
    }
}

/// Linear interpolation for a single complex vector
fn interpolate_complex(f_old: &[f64], s: &Array1<Complex64>, f_new: f64) -> Complex64 {
    let n = f_old.len();

    if n == 0 {
        return Complex64::new(0.0, 0.0);
    }

    if n == 1 {
        return s[0];
    }

    if f_new <= f_old[0] {
        let df = f_old[1] - f_old[0];
        if df.abs() <= NEAR_ZERO {
            return s[0];
        }
        let slope = (s[1] - s[0]) / df;
        return s[0] + slope * (f_new - f_old[0]);
    }

    if f_new >= f_old[n - 1] {
        let df = f_old[n - 1] - f_old[n - 2];
        if df.abs() <= NEAR_ZERO {
            return s[n - 1];
        }
        let slope = (s[n - 1] - s[n - 2]) / df;
        return s[n - 1] + slope * (f_new - f_old[n - 1]);
    }

    let idx = match f_old.partition_point(|&f| f < f_new) {
        0 => 0,
        i if i >= n => n - 2,
        i => i - 1,
    };

    let df = f_old[idx + 1] - f_old[idx];
    if df.abs() <= NEAR_ZERO {
        return s[idx];
    }
    let t = (f_new - f_old[idx]) / df;
    s[idx] * (1.0 - t) + s[idx + 1] * t
}
