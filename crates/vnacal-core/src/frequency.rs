//! Frequency module - ordered list of swept frequencies
//!
//! Frequencies are held in MHz, the unit the hardware reports and accepts.
//! [`FrequencyUnit`] converts to and from other units for file I/O.

/// Frequency unit enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyUnit {
    Hz,
    KHz,
    #[default]
    MHz,
    GHz,
}

impl FrequencyUnit {
    /// Get the multiplier to convert to Hz
    pub fn multiplier(&self) -> f64 {
        match self {
            FrequencyUnit::Hz => 1.0,
            FrequencyUnit::KHz => 1e3,
            FrequencyUnit::MHz => 1e6,
            FrequencyUnit::GHz => 1e9,
        }
    }

    /// Factor converting a value in this unit to MHz
    pub fn to_mhz(&self) -> f64 {
        self.multiplier() / FrequencyUnit::MHz.multiplier()
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hz" => Some(FrequencyUnit::Hz),
            "khz" => Some(FrequencyUnit::KHz),
            "mhz" => Some(FrequencyUnit::MHz),
            "ghz" => Some(FrequencyUnit::GHz),
            _ => None,
        }
    }

    /// Upper-case token used in file option lines
    pub fn as_token(&self) -> &'static str {
        match self {
            FrequencyUnit::Hz => "HZ",
            FrequencyUnit::KHz => "KHZ",
            FrequencyUnit::MHz => "MHZ",
            FrequencyUnit::GHz => "GHZ",
        }
    }
}

/// An ordered list of frequency points, in MHz
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frequency {
    f: Vec<f64>,
}

impl Frequency {
    /// Create from a frequency vector already expressed in MHz
    pub fn from_mhz(f: Vec<f64>) -> Self {
        Self { f }
    }

    /// Create from a frequency vector in an arbitrary unit
    pub fn from_f(f: Vec<f64>, unit: FrequencyUnit) -> Self {
        let scale = unit.to_mhz();
        Self {
            f: f.iter().map(|&x| x * scale).collect(),
        }
    }

    /// Get frequency vector in MHz
    #[inline]
    pub fn f(&self) -> &[f64] {
        &self.f
    }

    /// Get frequency vector in the requested unit
    pub fn f_scaled(&self, unit: FrequencyUnit) -> Vec<f64> {
        let scale = unit.to_mhz();
        self.f.iter().map(|&x| x / scale).collect()
    }

    /// Get the number of frequency points
    #[inline]
    pub fn npoints(&self) -> usize {
        self.f.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.f.is_empty()
    }

    /// Get the start frequency in MHz
    #[inline]
    pub fn start(&self) -> f64 {
        *self.f.first().unwrap_or(&0.0)
    }

    /// Get the stop frequency in MHz
    #[inline]
    pub fn stop(&self) -> f64 {
        *self.f.last().unwrap_or(&0.0)
    }

    /// Get the frequency span in MHz
    #[inline]
    pub fn span(&self) -> f64 {
        self.stop() - self.start()
    }

    /// True when no point is smaller than its predecessor
    pub fn is_non_decreasing(&self) -> bool {
        self.f.windows(2).all(|w| w[0] <= w[1])
    }

    /// True when every point is finite and larger than its predecessor
    pub fn is_strictly_ascending(&self) -> bool {
        self.f.iter().all(|f| f.is_finite()) && self.f.windows(2).all(|w| w[0] < w[1])
    }

    /// Consume into the underlying vector
    pub fn into_inner(self) -> Vec<f64> {
        self.f
    }
}
