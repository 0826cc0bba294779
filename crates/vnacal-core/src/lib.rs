//! vnacal-core: two-port VNA session control and SOLT calibration
//!
//! ## Modules
//!
//! - `frequency` - Frequency lists and units
//! - `hardware` - Unit capabilities, hop rate and attenuation
//! - `sweep` - Snapping sweeps onto the synthesizer's frequency grid
//! - `measurement` - Raw and corrected measurement records
//! - `calibration` - 12-term SOLT calibration: solving, applying, storing
//! - `transport` - The instrument connection trait and a simulator
//! - `session` - The session state machine
//! - `config` - TOML session configuration

pub mod calibration;
pub mod config;
pub mod constants;
pub mod error;
pub mod frequency;
pub mod hardware;
pub mod measurement;
pub mod session;
pub mod sweep;
pub mod transport;

pub use calibration::{CalibrationStep, CalibrationTermSet};
pub use config::SessionConfig;
pub use error::{Result, VnaError};
pub use frequency::Frequency;
pub use hardware::{Attenuation, HardwareDetails, HopRate};
pub use measurement::{CorrectedMeasurement, RawAcquisition, TwoPortPoint};
pub use session::{Session, SessionState};
pub use sweep::{SweepConfig, SweepPlanner};
pub use transport::{InstrumentTransport, SimulatedInstrument};
