//! Hardware-free transport
//!
//! Behaves like a unit with a fixed, smooth, frequency-dependent 12-term
//! error model. Whatever device is attached is seen through that model, so
//! a calibration performed against the simulator recovers the model and
//! corrected measurements reproduce the attached device.
//!
//! Every acquisition adds a little receiver noise from a seeded generator.
//! Two sweeps of the same device therefore never match exactly, but a given
//! seed always replays the same sequence.

use std::f64::consts::PI;
use std::time::Duration;

use log::{debug, info};
use ndarray::Array1;
use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::calibration::{CalibrationStep, CalibrationTermSet, ErrorTerms};
use crate::constants::DEFAULT_TIMEOUT;
use crate::error::{Result, VnaError};
use crate::frequency::Frequency;
use crate::hardware::HardwareDetails;
use crate::measurement::{RawAcquisition, TwoPortPoint};
use crate::sweep::SweepConfig;

use super::InstrumentTransport;

/// Points in the factory calibration stored on a simulated unit
const FACTORY_CAL_POINTS: usize = 801;

/// Peak receiver noise added to each ratio component
pub const DEFAULT_NOISE_LEVEL: f64 = 1e-6;

/// Simulated unit
#[derive(Debug, Clone)]
pub struct SimulatedInstrument {
    hardware: HardwareDetails,
    connection: Option<(String, u16)>,
    timeout: Duration,
    armed: Option<SweepConfig>,
    dut: TwoPortPoint,
    responsive: bool,
    has_factory_cal: bool,
    acquisitions: u64,
    noise_level: f64,
    rng: ChaCha8Rng,
}

impl Default for SimulatedInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedInstrument {
    /// A 375-6050 MHz unit with a thru attached
    pub fn new() -> Self {
        Self::with_hardware(HardwareDetails {
            min_frequency: 375,
            max_frequency: 6050,
            max_points: 4001,
            serial_number: 401,
            band_boundaries: [3000, 1500, 750, 0, 0, 0, 0, 0],
            band_boundary_count: 3,
        })
    }

    pub fn with_hardware(hardware: HardwareDetails) -> Self {
        let seed = u64::from(hardware.serial_number);
        Self {
            hardware,
            connection: None,
            timeout: DEFAULT_TIMEOUT,
            armed: None,
            dut: TwoPortPoint::thru(),
            responsive: true,
            has_factory_cal: false,
            acquisitions: 0,
            noise_level: DEFAULT_NOISE_LEVEL,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Replace the receiver noise level and reseed the generator
    ///
    /// A level of zero gives exact, repeatable acquisitions.
    pub fn with_noise(mut self, level: f64, seed: u64) -> Self {
        self.noise_level = level.abs();
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn noise_level(&self) -> f64 {
        self.noise_level
    }

    /// Store a factory calibration of the unit's own error model
    pub fn with_factory_calibration(mut self) -> Self {
        self.has_factory_cal = true;
        self
    }

    /// Attach a device under test
    pub fn attach(&mut self, dut: TwoPortPoint) {
        self.dut = dut;
    }

    /// Attach the physical standard used by a calibration step
    pub fn attach_standard(&mut self, step: CalibrationStep) {
        let (open, short, load) = (
            Complex64::new(1.0, 0.0),
            Complex64::new(-1.0, 0.0),
            Complex64::new(0.0, 0.0),
        );
        self.dut = match step {
            CalibrationStep::P1Open => TwoPortPoint::reflect(open, load),
            CalibrationStep::P1Short => TwoPortPoint::reflect(short, load),
            CalibrationStep::P1Load => TwoPortPoint::reflect(load, load),
            CalibrationStep::P2Open => TwoPortPoint::reflect(load, open),
            CalibrationStep::P2Short => TwoPortPoint::reflect(load, short),
            CalibrationStep::P2Load => TwoPortPoint::reflect(load, load),
            CalibrationStep::Thru => TwoPortPoint::thru(),
        };
    }

    /// Make the unit stop (or resume) answering
    pub fn set_responsive(&mut self, responsive: bool) {
        self.responsive = responsive;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of sweeps acquired so far
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions
    }

    /// Sweep currently programmed
    pub fn armed_config(&self) -> Option<&SweepConfig> {
        self.armed.as_ref()
    }

    /// The simulated error model at `freq` MHz
    pub fn error_terms(freq: f64) -> ErrorTerms {
        let x = freq / 1000.0;
        let p = |mag: f64, phase: f64| Complex64::from_polar(mag, phase);
        ErrorTerms {
            e00: p(0.02 + 0.005 * x, -1.3 * x),
            e11: p(0.08 + 0.01 * x, 0.9 * x),
            e10e01: p(0.95 - 0.03 * x, -2.1 * x),
            e30: p(1e-4, 0.4 * x),
            e22: p(0.06, -0.7 * x),
            e10e32: p(0.9 - 0.04 * x, -2.4 * x),
            ep33: p(0.025, 1.1 * x),
            ep22: p(0.07 + 0.01 * x, -0.8 * x),
            ep12ep32: p(0.93 - 0.03 * x, -2.2 * x),
            ep03: p(1.2e-4, -0.5 * x),
            ep11: p(0.05, 0.6 * x),
            ep23ep01: p(0.88 - 0.04 * x, -2.5 * x),
        }
    }

    /// The simulated error model sampled on `freq`
    pub fn model_calibration(freq: &Frequency) -> Result<CalibrationTermSet> {
        let points: Vec<ErrorTerms> = freq.f().iter().map(|&f| Self::error_terms(f)).collect();
        CalibrationTermSet::from_points(freq.clone(), &points)
    }

    fn check_connected(&self) -> Result<()> {
        if self.connection.is_none() {
            return Err(VnaError::TransportFailure("not connected".into()));
        }
        Ok(())
    }

    fn check_responsive(&self, wait: Duration) -> Result<()> {
        if !self.responsive {
            return Err(VnaError::Timeout(wait));
        }
        Ok(())
    }
}

impl InstrumentTransport for SimulatedInstrument {
    fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        self.check_responsive(self.timeout)?;
        info!("Simulated unit {} connected at {}:{}", self.hardware.serial_number, address, port);
        self.connection = Some((address.to_string(), port));
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!("Simulated unit disconnected");
        }
        self.armed = None;
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn hardware_details(&mut self) -> Result<HardwareDetails> {
        self.check_connected()?;
        self.check_responsive(self.timeout)?;
        Ok(self.hardware)
    }

    fn arm(&mut self, config: &SweepConfig) -> Result<()> {
        self.check_connected()?;
        self.check_responsive(self.timeout)?;
        debug!(
            "Simulated unit armed: {} points, {:?}, {} dB",
            config.frequencies.npoints(),
            config.hop_rate,
            config.attenuation.db()
        );
        self.armed = Some(config.clone());
        Ok(())
    }

    fn idle(&mut self) -> Result<()> {
        self.check_connected()?;
        self.armed = None;
        Ok(())
    }

    fn raw_measure(&mut self) -> Result<RawAcquisition> {
        self.check_connected()?;
        let config = self
            .armed
            .as_ref()
            .ok_or_else(|| VnaError::TransportFailure("acquisition not armed".into()))?;
        self.check_responsive(config.sweep_duration() + self.timeout)?;

        let amplitude = config.attenuation.amplitude();
        let freqs = config.frequencies.f();
        let level = self.noise_level;
        let rng = &mut self.rng;
        let mut noise = || {
            if level == 0.0 {
                return Complex64::new(0.0, 0.0);
            }
            Complex64::new(rng.gen_range(-level..=level), rng.gen_range(-level..=level))
        };
        let points: Vec<TwoPortPoint> = freqs
            .iter()
            .map(|&f| {
                let p = Self::error_terms(f).distort(&self.dut);
                TwoPortPoint::new(
                    p.s11 + noise(),
                    p.s21 + noise(),
                    p.s12 + noise(),
                    p.s22 + noise(),
                )
            })
            .collect();
        let reference: Array1<Complex64> = freqs
            .iter()
            .map(|&f| Complex64::from_polar(amplitude, -2.0 * PI * f / 1000.0))
            .collect();

        let raw = RawAcquisition::from_points(&points, reference)?;
        self.acquisitions += 1;
        Ok(raw)
    }

    fn ping(&mut self, address: &str, port: u16) -> Result<()> {
        self.check_responsive(self.timeout)?;
        debug!("Simulated unit answered ping at {}:{}", address, port);
        Ok(())
    }

    fn factory_calibration(&mut self) -> Result<Option<CalibrationTermSet>> {
        self.check_connected()?;
        if !self.has_factory_cal {
            return Ok(None);
        }
        let (min, max) = (self.hardware.min_mhz(), self.hardware.max_mhz());
        let step = (max - min) / (FACTORY_CAL_POINTS - 1) as f64;
        let freq = Frequency::from_mhz(
            (0..FACTORY_CAL_POINTS)
                .map(|i| min + step * i as f64)
                .collect(),
        );
        Self::model_calibration(&freq).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{Attenuation, HopRate};
    use approx::assert_relative_eq;

    fn config(atten: u8) -> SweepConfig {
        SweepConfig {
            frequencies: Frequency::from_mhz(vec![500.0, 1000.0, 5000.0]),
            hop_rate: HopRate::Hop45K,
            attenuation: Attenuation::new(atten).unwrap(),
        }
    }

    #[test]
    fn test_requires_connection_and_arming() {
        let mut sim = SimulatedInstrument::new();
        assert!(matches!(sim.hardware_details(), Err(VnaError::TransportFailure(_))));
        sim.connect("127.0.0.1", 1026).unwrap();
        assert_eq!(sim.hardware_details().unwrap().serial_number, 401);
        assert!(matches!(sim.raw_measure(), Err(VnaError::TransportFailure(_))));
        sim.arm(&config(0)).unwrap();
        assert_eq!(sim.raw_measure().unwrap().len(), 3);
        assert_eq!(sim.acquisitions(), 1);
    }

    #[test]
    fn test_unresponsive_unit_times_out() {
        let mut sim = SimulatedInstrument::new();
        sim.connect("127.0.0.1", 1026).unwrap();
        sim.arm(&config(0)).unwrap();
        sim.set_timeout(Duration::from_millis(50));
        sim.set_responsive(false);
        assert!(matches!(sim.raw_measure(), Err(VnaError::Timeout(_))));
        assert!(matches!(sim.ping("127.0.0.1", 1026), Err(VnaError::Timeout(_))));
    }

    #[test]
    fn test_reference_scales_with_attenuation() {
        let mut sim = SimulatedInstrument::new().with_noise(0.0, 0);
        sim.connect("127.0.0.1", 1026).unwrap();
        sim.arm(&config(0)).unwrap();
        let full = sim.raw_measure().unwrap();
        sim.arm(&config(20)).unwrap();
        let attenuated = sim.raw_measure().unwrap();
        assert_relative_eq!(full.reference[1].norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(attenuated.reference[1].norm(), 0.1, epsilon = 1e-12);
        // Ratios do not depend on the source level
        assert_eq!(full.t1r1, attenuated.t1r1);
    }

    #[test]
    fn test_load_shows_isolation() {
        let mut sim = SimulatedInstrument::new().with_noise(0.0, 0);
        sim.connect("127.0.0.1", 1026).unwrap();
        sim.arm(&config(0)).unwrap();
        sim.attach_standard(CalibrationStep::P1Load);
        let raw = sim.raw_measure().unwrap();
        let model = SimulatedInstrument::error_terms(1000.0);
        assert_relative_eq!(raw.t1r1[1].re, model.e00.re, epsilon = 1e-15);
        assert_relative_eq!(raw.t1r2[1].im, model.e30.im, epsilon = 1e-15);
        assert_relative_eq!(raw.t2r1[1].re, model.ep03.re, epsilon = 1e-15);
    }

    #[test]
    fn test_repeated_sweeps_differ_by_receiver_noise() {
        let mut sim = SimulatedInstrument::new();
        assert_eq!(sim.noise_level(), DEFAULT_NOISE_LEVEL);
        sim.connect("127.0.0.1", 1026).unwrap();
        sim.arm(&config(0)).unwrap();
        let first = sim.raw_measure().unwrap();
        let second = sim.raw_measure().unwrap();
        assert_ne!(first.t1r1, second.t1r1);

        let model = SimulatedInstrument::error_terms(1000.0).distort(&TwoPortPoint::thru());
        let bound = 2.0 * DEFAULT_NOISE_LEVEL;
        for raw in [&first, &second] {
            assert!((raw.t1r1[1] - model.s11).norm() <= bound);
            assert!((raw.t1r2[1] - model.s21).norm() <= bound);
            assert!((raw.t2r1[1] - model.s12).norm() <= bound);
            assert!((raw.t2r2[1] - model.s22).norm() <= bound);
        }
    }

    #[test]
    fn test_same_seed_replays_noise() {
        let acquire = |seed: u64| {
            let mut sim = SimulatedInstrument::new().with_noise(1e-3, seed);
            sim.connect("127.0.0.1", 1026).unwrap();
            sim.arm(&config(0)).unwrap();
            sim.raw_measure().unwrap()
        };
        assert_eq!(acquire(7).t2r2, acquire(7).t2r2);
        assert_ne!(acquire(7).t2r2, acquire(8).t2r2);
    }

    #[test]
    fn test_factory_calibration() {
        let mut sim = SimulatedInstrument::new();
        sim.connect("127.0.0.1", 1026).unwrap();
        assert!(sim.factory_calibration().unwrap().is_none());

        let mut sim = SimulatedInstrument::new().with_factory_calibration();
        sim.connect("127.0.0.1", 1026).unwrap();
        let cal = sim.factory_calibration().unwrap().unwrap();
        assert_eq!(cal.nfreq(), FACTORY_CAL_POINTS);
        assert_relative_eq!(cal.frequency.start(), 375.0);
        assert_relative_eq!(cal.frequency.stop(), 6050.0, epsilon = 1e-9);
    }
}
