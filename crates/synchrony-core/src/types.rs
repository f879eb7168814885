//! Core data types for spectral connectivity
//!
//! This module defines the input trial matrix, the window families used for
//! taper generation, the connectivity measures, and the half-spectrum
//! frequency axis shared by every stage of a run.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ShapeError};

// ============================================================================
// Trial
// ============================================================================

/// One multichannel epoch: a real-valued `channels × samples` matrix.
///
/// Samples are stored row-major, one contiguous row per channel. A trial is
/// immutable once built; the pipeline only ever reads it.
#[derive(Clone, Debug, PartialEq)]
pub struct Trial {
    n_channels: usize,
    n_samples: usize,
    data: Vec<f64>,
}

impl Trial {
    /// Create a trial from a row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::DataLength`] if `data.len() != n_channels * n_samples`.
    pub fn new(n_channels: usize, n_samples: usize, data: Vec<f64>) -> Result<Self, ShapeError> {
        let expected = n_channels * n_samples;
        if data.len() != expected {
            return Err(ShapeError::DataLength { expected, got: data.len() });
        }
        Ok(Self { n_channels, n_samples, data })
    }

    /// Create a trial from one vector per channel.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::RaggedRows`] if the rows differ in length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, ShapeError> {
        let n_samples = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * n_samples);

        for (row, samples) in rows.iter().enumerate() {
            let samples = samples.as_ref();
            if samples.len() != n_samples {
                return Err(ShapeError::RaggedRows { row, expected: n_samples, got: samples.len() });
            }
            data.extend_from_slice(samples);
        }

        Ok(Self { n_channels: rows.len(), n_samples, data })
    }

    /// Number of channels (rows)
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Number of samples per channel (columns)
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= n_channels()`.
    #[inline]
    pub fn row(&self, channel: usize) -> &[f64] {
        let start = channel * self.n_samples;
        &self.data[start..start + self.n_samples]
    }

    /// Iterate over channel rows in order
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        // chunks_exact(0) panics, and a zero-sample trial has no data anyway
        self.data.chunks_exact(self.n_samples.max(1)).take(self.n_channels)
    }

    /// Row-major view of all samples
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

// ============================================================================
// Window Families
// ============================================================================

/// Default DPSS time-half-bandwidth product
pub const DEFAULT_HALF_BANDWIDTH: f64 = 4.0;

/// Window family used to generate the taper set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    /// Single symmetric Hann taper with unit energy
    Hanning,
    /// Single rectangular taper of height `1/L`
    Ones,
    /// Discrete prolate spheroidal (Slepian) sequences
    Dpss {
        /// Time-half-bandwidth product NW
        half_bandwidth: f64,
        /// Number of tapers (defaults to `floor(2NW) - 1`)
        num_tapers: Option<usize>,
    },
}

impl WindowType {
    /// DPSS tapers with the given time-half-bandwidth and default taper count
    #[must_use]
    pub const fn dpss(half_bandwidth: f64) -> Self {
        Self::Dpss { half_bandwidth, num_tapers: None }
    }

    /// Canonical identifier of this window family
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hanning => "hanning",
            Self::Ones => "ones",
            Self::Dpss { .. } => "dpss",
        }
    }
}

impl Default for WindowType {
    fn default() -> Self {
        Self::Hanning
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dpss { half_bandwidth, num_tapers: Some(k) } => {
                write!(f, "dpss(NW={half_bandwidth}, K={k})")
            }
            Self::Dpss { half_bandwidth, num_tapers: None } => {
                write!(f, "dpss(NW={half_bandwidth})")
            }
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for WindowType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hanning" | "hann" => Ok(Self::Hanning),
            "ones" | "boxcar" => Ok(Self::Ones),
            "dpss" | "slepian" => Ok(Self::dpss(DEFAULT_HALF_BANDWIDTH)),
            _ => Err(ConfigError::UnknownWindowType { name: s.to_string() }),
        }
    }
}

// ============================================================================
// Connectivity Measures
// ============================================================================

/// Normalization applied to the accumulated cross-spectra.
///
/// All three share the complex quotient `CSD / sqrt(PSD_i · PSD_j)` and differ
/// only in how it is turned into edge weights.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityMeasure {
    /// Complex coherency; yields per-pair complex rows, not a network
    Coherency,
    /// Coherence magnitude `|coherency|`
    #[default]
    Coherence,
    /// Imaginary part of coherency
    ImagCoherence,
}

impl ConnectivityMeasure {
    /// Canonical identifier of this measure
    pub const fn name(self) -> &'static str {
        match self {
            Self::Coherency => "coherency",
            Self::Coherence => "coherence",
            Self::ImagCoherence => "imag_coherence",
        }
    }

    /// Whether this measure materializes a network directly
    pub const fn produces_network(self) -> bool {
        !matches!(self, Self::Coherency)
    }
}

impl fmt::Display for ConnectivityMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConnectivityMeasure {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coherency" | "cohy" => Ok(Self::Coherency),
            "coherence" | "coh" | "real" => Ok(Self::Coherence),
            "imag_coherence" | "imagcoh" | "imag" => Ok(Self::ImagCoherence),
            _ => Err(ConfigError::UnknownMeasure { name: s.to_string() }),
        }
    }
}

// ============================================================================
// Frequency Axis
// ============================================================================

/// FFT length actually used for a signal: never shorter than the signal.
#[inline]
pub const fn effective_nfft(nfft: usize, signal_length: usize) -> usize {
    if nfft < signal_length {
        signal_length
    } else {
        nfft
    }
}

/// Number of half-spectrum bins, `floor(nfft / 2) + 1`.
#[inline]
pub const fn frequency_bin_count(nfft: usize) -> usize {
    nfft / 2 + 1
}

/// Center frequency of every half-spectrum bin, `k · fs / nfft`.
pub fn bin_frequencies(nfft: usize, sampling_frequency: f64) -> Vec<f64> {
    let resolution = sampling_frequency / nfft as f64;
    (0..frequency_bin_count(nfft)).map(|k| k as f64 * resolution).collect()
}

// ============================================================================
// Tests
// ============================================================================
