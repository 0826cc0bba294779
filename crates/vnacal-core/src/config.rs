//! Session configuration from TOML
//!
//! ```toml
//! address = "192.168.1.50"
//! port = 1026
//! timeout_ms = 2000
//! hop_rate = "15K"
//! attenuation_db = 10
//!
//! [sweep]
//! start = 375.0
//! stop = 6050.0
//! points = 401
//! ```
//!
//! Only `address` and `port` are required.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TIMEOUT;
use crate::error::Result;
use crate::hardware::{Attenuation, HopRate};
use crate::session::Session;
use crate::transport::InstrumentTransport;

/// Everything needed to bring a session up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub address: String,
    pub port: u16,
    /// Reply timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub hop_rate: Option<HopRate>,
    #[serde(default)]
    pub attenuation_db: Option<u8>,
    #[serde(default)]
    pub sweep: Option<LinearSweep>,
}

/// Linear sweep limits in MHz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSweep {
    pub start: f64,
    pub stop: f64,
    pub points: usize,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

impl SessionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Attenuation setting, validated
    pub fn attenuation(&self) -> Result<Option<Attenuation>> {
        self.attenuation_db.map(Attenuation::new).transpose()
    }
}

impl<T: InstrumentTransport> Session<T> {
    /// Take address, port and timeout from `config`
    pub fn apply_connection(&mut self, config: &SessionConfig) -> Result<()> {
        self.set_address(config.address.clone())?;
        self.set_port(config.port)?;
        self.set_timeout(config.timeout());
        Ok(())
    }

    /// Take hop rate, attenuation and sweep from `config`
    ///
    /// Does nothing unless all three are present.
    pub fn apply_measurement(&mut self, config: &SessionConfig) -> Result<()> {
        let attenuation = config.attenuation()?;
        match (config.hop_rate, attenuation, config.sweep) {
            (Some(hop_rate), Some(attenuation), Some(sweep)) => {
                self.set_config(hop_rate, attenuation, sweep.start, sweep.stop, sweep.points)
            }
            _ => {
                debug!("Measurement settings incomplete in configuration, skipped");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VnaError;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = SessionConfig::from_toml_str("address = \"127.0.0.1\"\nport = 1026\n").unwrap();
        assert_eq!(cfg.timeout(), Duration::from_millis(150));
        assert!(cfg.hop_rate.is_none());
        assert!(cfg.sweep.is_none());
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            address = "192.168.1.50"
            port = 1026
            timeout_ms = 2500
            hop_rate = "15K"
            attenuation_db = 10

            [sweep]
            start = 375.0
            stop = 6050.0
            points = 401
        "#;
        let cfg = SessionConfig::from_toml_str(text).unwrap();
        assert_eq!(cfg.hop_rate, Some(HopRate::Hop15K));
        assert_eq!(cfg.attenuation().unwrap().map(|a| a.db()), Some(10));
        assert_eq!(cfg.sweep.map(|s| s.points), Some(401));
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            SessionConfig::from_toml_str("address = \"x\"\nport = 1\nhop_rate = \"99K\"\n"),
            Err(VnaError::Config(_))
        ));
        let cfg =
            SessionConfig::from_toml_str("address = \"x\"\nport = 1\nattenuation_db = 40\n").unwrap();
        assert!(matches!(cfg.attenuation(), Err(VnaError::BadAttenuation(40))));
    }
}
