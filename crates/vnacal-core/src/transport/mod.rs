//! Instrument transport
//!
//! The session drives a unit exclusively through [`InstrumentTransport`].
//! Calls block until the unit answers or the configured timeout expires.

use std::time::Duration;

use crate::calibration::CalibrationTermSet;
use crate::error::Result;
use crate::hardware::HardwareDetails;
use crate::measurement::RawAcquisition;
use crate::sweep::SweepConfig;

pub mod simulator;

pub use simulator::SimulatedInstrument;

/// Connection to one unit
pub trait InstrumentTransport: Send {
    /// Open the connection
    fn connect(&mut self, address: &str, port: u16) -> Result<()>;

    /// Close the connection. Closing twice is harmless.
    fn disconnect(&mut self);

    /// Time to wait for a reply before failing with `Timeout`
    fn set_timeout(&mut self, timeout: Duration);

    /// Download the unit's capabilities
    fn hardware_details(&mut self) -> Result<HardwareDetails>;

    /// Program the sweep and settings and arm acquisition
    fn arm(&mut self, config: &SweepConfig) -> Result<()>;

    /// Return the unit to idle
    fn idle(&mut self) -> Result<()>;

    /// Acquire one sweep of raw receiver data
    fn raw_measure(&mut self) -> Result<RawAcquisition>;

    /// Check that a unit answers at `address`/`port`
    fn ping(&mut self, address: &str, port: u16) -> Result<()>;

    /// Calibration stored on the unit, if any
    fn factory_calibration(&mut self) -> Result<Option<CalibrationTermSet>> {
        Ok(None)
    }
}

impl<T: InstrumentTransport + ?Sized> InstrumentTransport for Box<T> {
    fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        (**self).connect(address, port)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }

    fn hardware_details(&mut self) -> Result<HardwareDetails> {
        (**self).hardware_details()
    }

    fn arm(&mut self, config: &SweepConfig) -> Result<()> {
        (**self).arm(config)
    }

    fn idle(&mut self) -> Result<()> {
        (**self).idle()
    }

    fn raw_measure(&mut self) -> Result<RawAcquisition> {
        (**self).raw_measure()
    }

    fn ping(&mut self, address: &str, port: u16) -> Result<()> {
        (**self).ping(address, port)
    }

    fn factory_calibration(&mut self) -> Result<Option<CalibrationTermSet>> {
        (**self).factory_calibration()
    }
}
