//! Run configuration for connectivity estimation.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ConnectivityMeasure, WindowType};

/// Default FFT length
pub const DEFAULT_NFFT: usize = 512;

/// Parameters shared by every trial of one connectivity run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Requested FFT length; raised to the signal length when shorter
    pub nfft: usize,
    /// Window family for taper generation
    pub window_type: WindowType,
    /// Normalization applied to the accumulated spectra
    pub measure: ConnectivityMeasure,
    /// Sampling frequency in Hz, used to label frequency bins
    pub sampling_frequency: Option<f64>,
    /// Worker pool size (`None` uses one thread per core)
    pub num_threads: Option<usize>,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            nfft: DEFAULT_NFFT,
            window_type: WindowType::Hanning,
            measure: ConnectivityMeasure::Coherence,
            sampling_frequency: None,
            num_threads: None,
        }
    }
}

impl ConnectivityConfig {
    /// Set the requested FFT length
    #[must_use]
    pub fn with_nfft(mut self, nfft: usize) -> Self {
        self.nfft = nfft;
        self
    }

    /// Set the window family
    #[must_use]
    pub fn with_window(mut self, window_type: WindowType) -> Self {
        self.window_type = window_type;
        self
    }

    /// Set the connectivity measure
    #[must_use]
    pub fn with_measure(mut self, measure: ConnectivityMeasure) -> Self {
        self.measure = measure;
        self
    }

    /// Set the sampling frequency in Hz
    #[must_use]
    pub fn with_sampling_frequency(mut self, hz: f64) -> Self {
        self.sampling_frequency = Some(hz);
        self
    }

    /// Set the worker pool size
    #[must_use]
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Check the parameters that do not depend on trial data.
    ///
    /// DPSS bandwidth limits depend on the signal length and are checked
    /// during taper generation.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nfft == 0 {
            return Err(ConfigError::InvalidFftLength { nfft: self.nfft });
        }
        if let Some(hz) = self.sampling_frequency {
            if !hz.is_finite() || hz <= 0.0 {
                return Err(ConfigError::InvalidSamplingFrequency { hz });
            }
        }
        if self.num_threads == Some(0) {
            return Err(ConfigError::InvalidThreadCount);
        }
        if let WindowType::Dpss { half_bandwidth, num_tapers } = self.window_type {
            if !half_bandwidth.is_finite() || half_bandwidth <= 0.0 {
                return Err(ConfigError::InvalidBandwidth { half_bandwidth, signal_length: 0 });
            }
            if num_tapers == Some(0) {
                return Err(ConfigError::InvalidTaperCount { requested: 0, max: 0 });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ConnectivityConfig::default();
        assert_eq!(config.nfft, 512);
        assert_eq!(config.measure, ConnectivityMeasure::Coherence);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_nfft_rejected() {
        let config = ConnectivityConfig::default().with_nfft(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidFftLength { nfft: 0 }));
    }

    #[test]
    fn test_invalid_sampling_frequency() {
        let config = ConnectivityConfig::default().with_sampling_frequency(-250.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSamplingFrequency { .. })));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = ConnectivityConfig::default().with_threads(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidThreadCount));
    }

    #[test]
    fn test_dpss_bandwidth_rejected() {
        let config = ConnectivityConfig::default().with_window(WindowType::dpss(0.0));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBandwidth { .. })));
    }
}
