use log::debug;
use ndarray::Array1;
use num_complex::Complex64;

use crate::constants::NEAR_ZERO;
use crate::error::{Result, VnaError};
use crate::measurement::{CorrectedMeasurement, RawAcquisition, TwoPortPoint};

use super::standards::{CalibrationStep, StandardModels, StandardSet};
use super::terms::{CalibrationTermSet, ErrorTerms};

/// Three-term error model of one port
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnePortTerms {
    /// Directivity
    pub directivity: Complex64,
    /// Source match
    pub source_match: Complex64,
    /// Reflection tracking
    pub tracking: Complex64,
}

/// 1-Port SOL (Short-Open-Load) solution at a single frequency
///
/// `measured` and `actual` hold the short, open and load reflection
/// coefficients in that order. Returns `None` for degenerate standards.
pub fn solve_one_port(measured: [Complex64; 3], actual: [Complex64; 3]) -> Option<OnePortTerms> {
    let one = Complex64::new(1.0, 0.0);
    let [sm, om, lm] = measured;
    let [si, oi, li] = actual;

    // Solve system of 3 linear equations for e00, de, e11
    // Sm = e00 - Si*de + Sm*Si*e11
    // with de = e00*e11 - e10*e01
    //
    // [ 1  -Si  Sm*Si ] [ e00 ]   [ Sm ]
    // [ 1  -Oi  Om*Oi ] [ de  ] = [ Om ]
    // [ 1  -Li  Lm*Li ] [ e11 ]   [ Lm ]
    let a = nalgebra::Matrix3::new(one, -si, sm * si, one, -oi, om * oi, one, -li, lm * li);
    let b = nalgebra::Vector3::new(sm, om, lm);

    let x = a.qr().solve(&b)?;
    let (e00, de, e11) = (x[0], x[1], x[2]);
    let tracking = e00 * e11 - de;

    let finite = [e00, e11, tracking]
        .iter()
        .all(|v| v.re.is_finite() && v.im.is_finite());
    if !finite || tracking.norm() <= NEAR_ZERO {
        return None;
    }

    Some(OnePortTerms {
        directivity: e00,
        source_match: e11,
        tracking,
    })
}

/// Calculate all 12 error terms from a complete set of standards
///
/// Each frequency is solved on its own: a three-term one-port calibration
/// per port from open/short/load, isolation from the leakage seen during the
/// two load measurements, and load match plus transmission tracking per
/// direction from the thru.
pub(crate) fn solve_terms(
    standards: &StandardSet,
    models: &StandardModels,
) -> Result<CalibrationTermSet> {
    let get = |step: CalibrationStep| {
        standards
            .get(step)
            .ok_or_else(|| VnaError::BadCalibration(format!("missing standard {step}")))
    };
    let p1_open = get(CalibrationStep::P1Open)?;
    let p1_short = get(CalibrationStep::P1Short)?;
    let p1_load = get(CalibrationStep::P1Load)?;
    let p2_open = get(CalibrationStep::P2Open)?;
    let p2_short = get(CalibrationStep::P2Short)?;
    let p2_load = get(CalibrationStep::P2Load)?;
    let thru = get(CalibrationStep::Thru)?;

    let nfreq = standards.frequency().npoints();
    let mut points = Vec::with_capacity(nfreq);

    for f in 0..nfreq {
        let open = models.open * Complex64::from_polar(1.0, standards.open_phase(f));
        let actual = [models.short, open, models.load];

        // 1. Solve 3-term for Port 1 (EDF, ESF, ERF)
        let fwd = solve_one_port([p1_short.t1r1[f], p1_open.t1r1[f], p1_load.t1r1[f]], actual)
            .ok_or(VnaError::SingularCalibration { index: f })?;

        // 2. Solve 3-term for Port 2 (EDR, ESR, ERR)
        let rev = solve_one_port([p2_short.t2r2[f], p2_open.t2r2[f], p2_load.t2r2[f]], actual)
            .ok_or(VnaError::SingularCalibration { index: f })?;

        // 3. Isolation (EXF, EXR) from leakage with loads attached
        let e30 = (p1_load.t1r2[f] + p2_load.t1r2[f]) * 0.5;
        let ep03 = (p1_load.t2r1[f] + p2_load.t2r1[f]) * 0.5;

        // 4. Load match (ELF, ELR) and tracking (ETF, ETR) from the thru
        let m = thru.point(f);
        let terms = thru_terms(&fwd, &rev, e30, ep03, &m)
            .ok_or(VnaError::SingularCalibration { index: f })?;
        points.push(terms);
    }

    debug!("Solved 12-term calibration at {} frequencies", nfreq);
    CalibrationTermSet::from_points(standards.frequency().clone(), &points)
}

fn thru_terms(
    fwd: &OnePortTerms,
    rev: &OnePortTerms,
    e30: Complex64,
    ep03: Complex64,
    m: &TwoPortPoint,
) -> Option<ErrorTerms> {
    let one = Complex64::new(1.0, 0.0);

    // ELF = (S11m - EDF) / (ERF + ESF*(S11m - EDF))
    let d11 = m.s11 - fwd.directivity;
    let den_f = fwd.tracking + fwd.source_match * d11;
    // ELR = (S22m - EDR) / (ERR + ESR*(S22m - EDR))
    let d22 = m.s22 - rev.directivity;
    let den_r = rev.tracking + rev.source_match * d22;
    if den_f.norm() <= NEAR_ZERO || den_r.norm() <= NEAR_ZERO {
        return None;
    }
    let e22 = d11 / den_f;
    let ep11 = d22 / den_r;

    // ETF = (S21m - EXF) * (1 - ESF*ELF), ideal thru S21 = 1
    let e10e32 = (m.s21 - e30) * (one - fwd.source_match * e22);
    let ep23ep01 = (m.s12 - ep03) * (one - rev.source_match * ep11);
    if e10e32.norm() <= NEAR_ZERO || ep23ep01.norm() <= NEAR_ZERO {
        return None;
    }

    Some(ErrorTerms {
        e00: fwd.directivity,
        e11: fwd.source_match,
        e10e01: fwd.tracking,
        e30,
        e22,
        e10e32,
        ep33: rev.directivity,
        ep22: rev.source_match,
        ep12ep32: rev.tracking,
        ep03,
        ep11,
        ep23ep01,
    })
}

/// Apply 12-term calibration to a raw acquisition
///
/// The terms must be consistent and cover exactly as many frequencies as the
/// acquisition. Fails with `SingularCalibration` at the first point where the
/// error model cannot be inverted.
pub fn apply(raw: &RawAcquisition, terms: &CalibrationTermSet) -> Result<CorrectedMeasurement> {
    if !terms.is_consistent() {
        return Err(VnaError::BadCalibration(
            "calibration terms are incomplete".into(),
        ));
    }
    let nfreq = raw.len();
    if nfreq != terms.nfreq() {
        return Err(VnaError::BadCalibration(format!(
            "calibration covers {} frequencies but the acquisition has {}",
            terms.nfreq(),
            nfreq
        )));
    }

    let mut s11 = Array1::<Complex64>::zeros(nfreq);
    let mut s21 = Array1::<Complex64>::zeros(nfreq);
    let mut s12 = Array1::<Complex64>::zeros(nfreq);
    let mut s22 = Array1::<Complex64>::zeros(nfreq);

    for f in 0..nfreq {
        let s = terms
            .point(f)
            .correct(&raw.point(f))
            .ok_or(VnaError::SingularCalibration { index: f })?;
        s11[f] = s.s11;
        s21[f] = s.s21;
        s12[f] = s.s12;
        s22[f] = s.s22;
    }

    Ok(CorrectedMeasurement {
        frequency: terms.frequency.clone(),
        s11,
        s21,
        s12,
        s22,
    })
}
