//! Instrument session
//!
//! A [`Session`] owns one transport and walks the state machine
//!
//! ```text
//! UNINITIALIZED --initialize()--> STOPPED --start()--> STARTED
//!                                 STOPPED <--stop()--- STARTED
//! ```
//!
//! Hop rate, attenuation and the sweep can only change while STOPPED.
//! Acquisitions need STARTED. Setting the address or port drops the session
//! back to UNINITIALIZED, which also invalidates any calibration.
//!
//! Sessions are not internally synchronized. Share one between threads by
//! wrapping it in a `Mutex`.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use ndarray::Array1;
use num_complex::Complex64;

use crate::calibration::{
    apply, CalibrationFile, CalibrationStep, CalibrationStore, CalibrationTermSet,
};
use crate::constants::{DEFAULT_TIMEOUT, NUM_ERROR_TERMS};
use crate::error::{Result, VnaError};
use crate::frequency::Frequency;
use crate::hardware::{Attenuation, HardwareDetails, HopRate};
use crate::measurement::{CorrectedMeasurement, RawAcquisition};
use crate::sweep::{SweepConfig, SweepPlanner};
use crate::transport::InstrumentTransport;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Stopped,
    Started,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "UNINITIALIZED",
            SessionState::Stopped => "STOPPED",
            SessionState::Started => "STARTED",
        };
        f.write_str(name)
    }
}

const INITIALIZED: &[SessionState] = &[SessionState::Stopped, SessionState::Started];

/// Client-side control of one unit
pub struct Session<T: InstrumentTransport> {
    transport: T,
    state: SessionState,
    address: Option<String>,
    port: Option<u16>,
    timeout: Duration,
    hardware: HardwareDetails,
    hop_rate: Option<HopRate>,
    attenuation: Option<Attenuation>,
    frequencies: Frequency,
    calibration: CalibrationStore,
}

impl<T: InstrumentTransport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("serial_number", &self.hardware.serial_number)
            .field("hop_rate", &self.hop_rate)
            .field("attenuation", &self.attenuation)
            .field("points", &self.frequencies.npoints())
            .field("calibrated", &self.calibration.is_complete())
            .finish()
    }
}

impl<T: InstrumentTransport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::Uninitialized,
            address: None,
            port: None,
            timeout: DEFAULT_TIMEOUT,
            hardware: HardwareDetails::default(),
            hop_rate: None,
            attenuation: None,
            frequencies: Frequency::default(),
            calibration: CalibrationStore::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn require(&self, operation: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(VnaError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn endpoint(&self) -> Result<(String, u16)> {
        let address = self.address.clone().ok_or(VnaError::MissingConfig("address"))?;
        let port = self.port.ok_or(VnaError::MissingConfig("port"))?;
        Ok((address, port))
    }

    /// Forget the unit: disconnect, zero the hardware details and drop the
    /// calibration, which belonged to that unit.
    fn uninitialize(&mut self) {
        self.transport.disconnect();
        if self.state != SessionState::Uninitialized {
            info!("Session {} -> {}", self.state, SessionState::Uninitialized);
        }
        self.state = SessionState::Uninitialized;
        self.hardware = HardwareDetails::default();
        self.calibration.clear();
    }

    // ---- Connection -------------------------------------------------------

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Set the unit's IP address. Legal while not started.
    pub fn set_address(&mut self, address: impl Into<String>) -> Result<()> {
        self.require(
            "set_address",
            &[SessionState::Uninitialized, SessionState::Stopped],
        )?;
        let address = address.into();
        debug!("Address set to {}", address);
        self.address = Some(address);
        self.uninitialize();
        Ok(())
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Set the unit's TCP port. Legal while not started.
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        self.require("set_port", &[SessionState::Uninitialized, SessionState::Stopped])?;
        debug!("Port set to {}", port);
        self.port = Some(port);
        self.uninitialize();
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change how long blocking calls wait for the unit. Legal in any state.
    pub fn set_timeout(&mut self, timeout: Duration) {
        debug!("Timeout set to {:?}", timeout);
        self.timeout = timeout;
        self.transport.set_timeout(timeout);
    }

    /// Check that a unit answers at the configured address and port
    pub fn ping(&mut self) -> Result<()> {
        let (address, port) = self.endpoint()?;
        self.transport.ping(&address, port)
    }

    /// Connect and download the hardware details
    ///
    /// Any earlier calibration and sweep are dropped since they may belong
    /// to a different unit.
    pub fn initialize(&mut self) -> Result<()> {
        self.require(
            "initialize",
            &[SessionState::Uninitialized, SessionState::Stopped],
        )?;
        let (address, port) = self.endpoint()?;
        self.uninitialize();

        self.transport.set_timeout(self.timeout);
        let hardware = self
            .transport
            .connect(&address, port)
            .and_then(|_| self.transport.hardware_details());
        let hardware = match hardware {
            Ok(h) => h,
            Err(e) => {
                warn!("Initialization of {}:{} failed: {}", address, port, e);
                self.transport.disconnect();
                return Err(e);
            }
        };

        info!(
            "Session {} -> {} (unit {}, {}-{} MHz, {} points max)",
            self.state,
            SessionState::Stopped,
            hardware.serial_number,
            hardware.min_frequency,
            hardware.max_frequency,
            hardware.max_points
        );
        self.hardware = hardware;
        self.frequencies = Frequency::default();
        self.calibration.rebind(&self.frequencies);
        self.state = SessionState::Stopped;
        Ok(())
    }

    /// Details of the connected unit, all zero until initialized
    pub fn hardware_details(&self) -> HardwareDetails {
        self.hardware
    }

    /// Arm acquisition with the current settings
    pub fn start(&mut self) -> Result<()> {
        self.require("start", &[SessionState::Stopped])?;
        let config = SweepConfig {
            hop_rate: self.hop_rate.ok_or(VnaError::MissingConfig("hop rate"))?,
            attenuation: self
                .attenuation
                .ok_or(VnaError::MissingConfig("attenuation"))?,
            frequencies: self.frequencies.clone(),
        };
        if config.frequencies.is_empty() {
            return Err(VnaError::MissingConfig("frequencies"));
        }
        self.transport.arm(&config)?;
        info!("Session {} -> {}", self.state, SessionState::Started);
        self.state = SessionState::Started;
        Ok(())
    }

    /// Return the unit to idle
    pub fn stop(&mut self) -> Result<()> {
        self.require("stop", &[SessionState::Started])?;
        self.transport.idle()?;
        info!("Session {} -> {}", self.state, SessionState::Stopped);
        self.state = SessionState::Stopped;
        Ok(())
    }

    /// Disconnect and return to UNINITIALIZED
    pub fn close(&mut self) {
        self.uninitialize();
    }

    // ---- Acquisition settings ---------------------------------------------

    pub fn hop_rate(&self) -> Option<HopRate> {
        self.hop_rate
    }

    pub fn set_hop_rate(&mut self, hop_rate: HopRate) -> Result<()> {
        self.require("set_hop_rate", &[SessionState::Stopped])?;
        debug!("Hop rate set to {:?}", hop_rate);
        self.hop_rate = Some(hop_rate);
        Ok(())
    }

    pub fn attenuation(&self) -> Option<Attenuation> {
        self.attenuation
    }

    pub fn set_attenuation(&mut self, attenuation: Attenuation) -> Result<()> {
        self.require("set_attenuation", &[SessionState::Stopped])?;
        debug!("Attenuation set to {} dB", attenuation.db());
        self.attenuation = Some(attenuation);
        Ok(())
    }

    /// The active sweep
    pub fn frequencies(&self) -> &Frequency {
        &self.frequencies
    }

    fn planner(&self, operation: &'static str) -> Result<SweepPlanner> {
        self.require(operation, INITIALIZED)?;
        Ok(SweepPlanner::new(self.hardware))
    }

    fn install_sweep(&mut self, frequencies: Frequency) {
        debug!(
            "Sweep set to {} points ({} - {} MHz)",
            frequencies.npoints(),
            frequencies.start(),
            frequencies.stop()
        );
        self.calibration.rebind(&frequencies);
        self.frequencies = frequencies;
    }

    /// Sweep the given frequencies, each snapped to a legal one
    pub fn set_frequencies(&mut self, freqs: &[f64]) -> Result<()> {
        self.require("set_frequencies", &[SessionState::Stopped])?;
        let frequencies = self.planner("set_frequencies")?.set_explicit_frequencies(freqs)?;
        self.install_sweep(frequencies);
        Ok(())
    }

    /// Sweep `points` points spread linearly between `start` and `stop`
    pub fn set_linear_sweep(&mut self, start: f64, stop: f64, points: usize) -> Result<()> {
        self.require("set_linear_sweep", &[SessionState::Stopped])?;
        let frequencies = self
            .planner("set_linear_sweep")?
            .generate_linear_sweep(start, stop, points)?;
        self.install_sweep(frequencies);
        Ok(())
    }

    /// Set hop rate, attenuation and a linear sweep in one call
    ///
    /// Nothing changes unless every setting is accepted.
    pub fn set_config(
        &mut self,
        hop_rate: HopRate,
        attenuation: Attenuation,
        start: f64,
        stop: f64,
        points: usize,
    ) -> Result<()> {
        self.require("set_config", &[SessionState::Stopped])?;
        let frequencies = self
            .planner("set_config")?
            .generate_linear_sweep(start, stop, points)?;
        self.hop_rate = Some(hop_rate);
        self.attenuation = Some(attenuation);
        self.install_sweep(frequencies);
        debug!("Configured {:?} at {} dB", hop_rate, attenuation.db());
        Ok(())
    }

    /// Legal limits for a linear sweep on this unit
    pub fn fix_sweep_limits(&self, start: f64, stop: f64, points: usize) -> Result<(f64, f64)> {
        self.planner("fix_sweep_limits")?
            .fix_sweep_limits(start, stop, points)
    }

    /// Closest frequency this unit can generate
    pub fn nearest_legal_frequency(&self, freq: f64) -> Result<f64> {
        self.planner("nearest_legal_frequency")?
            .nearest_legal_frequency(freq)
    }

    /// Linear sweep on this unit's grid, without making it active
    pub fn generate_linear_sweep(&self, start: f64, stop: f64, points: usize) -> Result<Frequency> {
        self.planner("generate_linear_sweep")?
            .generate_linear_sweep(start, stop, points)
    }

    // ---- Measurement ------------------------------------------------------

    /// Acquire one sweep of uncorrected receiver data
    pub fn measure_uncalibrated(&mut self) -> Result<RawAcquisition> {
        self.require("measure_uncalibrated", &[SessionState::Started])?;
        let raw = self.transport.raw_measure()?;
        if raw.len() != self.frequencies.npoints() {
            return Err(VnaError::TransportFailure(format!(
                "unit returned {} points for a {} point sweep",
                raw.len(),
                self.frequencies.npoints()
            )));
        }
        Ok(raw)
    }

    /// Acquire one sweep and correct it with the active calibration
    pub fn measure_calibrated(&mut self) -> Result<CorrectedMeasurement> {
        self.require("measure_calibrated", &[SessionState::Started])?;
        let terms = self.calibration.terms_for(&self.frequencies)?;
        let raw = self.measure_uncalibrated()?;
        apply(&raw, &terms)
    }

    // ---- Calibration ------------------------------------------------------

    /// Measure the standard currently attached for `step`
    ///
    /// Terms are solved as soon as all seven standards are present. An
    /// installed calibration on other frequencies must be cleared first.
    pub fn measure_calibration_step(&mut self, step: CalibrationStep) -> Result<()> {
        self.require("measure_calibration_step", &[SessionState::Started])?;
        if self.calibration.is_complete()
            && self.calibration.calibration_frequencies() != self.frequencies.f()
        {
            warn!("Calibration step {} refused, installed calibration is on another sweep", step);
            return Err(VnaError::BadCalibration(
                "calibration does not match the current sweep, clear it before recalibrating".into(),
            ));
        }
        let raw = self.measure_uncalibrated()?;
        if self.calibration.accumulate(step, raw)? {
            info!("Calibration complete at {} frequencies", self.frequencies.npoints());
        }
        Ok(())
    }

    /// Whether `step` has been measured on the current sweep
    pub fn have_standard(&self, step: CalibrationStep) -> bool {
        self.calibration.have_standard(step)
    }

    pub fn is_calibration_complete(&self) -> bool {
        self.calibration.is_complete()
    }

    /// Frequencies of the active calibration, empty when uncalibrated
    pub fn calibration_frequencies(&self) -> &[f64] {
        self.calibration.calibration_frequencies()
    }

    pub fn clear_calibration(&mut self) {
        self.calibration.clear();
    }

    /// Rotate the open standard by per-frequency phases, in radians
    pub fn set_open_phase_correction(&mut self, phases: Option<Vec<f64>>) -> Result<()> {
        self.require("set_open_phase_correction", INITIALIZED)?;
        self.calibration.set_open_phase_correction(phases)
    }

    /// Copy of the active calibration terms
    pub fn export_calibration(&self) -> Result<CalibrationTermSet> {
        self.calibration.export()
    }

    /// Replace the active calibration
    ///
    /// The terms may sit on any finite, strictly ascending frequency list;
    /// they are interpolated onto the sweep for each calibrated measurement.
    pub fn import_calibration(&mut self, terms: CalibrationTermSet) -> Result<()> {
        self.require("import_calibration", INITIALIZED)?;
        self.calibration.install(terms)
    }

    /// Replace the active calibration from a frequency list and 12 vectors
    /// in export order
    pub fn import_calibration_vectors(
        &mut self,
        freqs: &[f64],
        vectors: [Array1<Complex64>; NUM_ERROR_TERMS],
    ) -> Result<()> {
        self.require("import_calibration", INITIALIZED)?;
        self.calibration.import(freqs, vectors)
    }

    /// Write the active calibration to a file
    pub fn save_calibration<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = CalibrationFile::new(self.calibration.export()?);
        if self.hardware.is_populated() {
            file.comments
                .push(format!("serial number {}", self.hardware.serial_number));
        }
        file.write(path)
    }

    /// Read and activate a calibration file
    pub fn load_calibration<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.require("load_calibration", INITIALIZED)?;
        let file = CalibrationFile::from_file(path)?;
        self.calibration.install(file.terms)
    }

    /// Whether the unit carries a factory calibration
    pub fn has_factory_calibration(&mut self) -> Result<bool> {
        self.require("has_factory_calibration", INITIALIZED)?;
        Ok(self.transport.factory_calibration()?.is_some())
    }

    /// Activate the unit's factory calibration
    pub fn import_factory_calibration(&mut self) -> Result<()> {
        self.require("import_factory_calibration", INITIALIZED)?;
        let terms = self
            .transport
            .factory_calibration()?
            .ok_or_else(|| VnaError::BadCalibration("unit has no factory calibration".into()))?;
        info!("Imported factory calibration ({} frequencies)", terms.nfreq());
        self.calibration.install(terms)
    }

    // ---- Transport access -------------------------------------------------

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: InstrumentTransport> Drop for Session<T> {
    fn drop(&mut self) {
        self.transport.disconnect();
    }
}
