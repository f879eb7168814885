//! Error types for the Synchrony connectivity pipeline
//!
//! These errors work in `no_std` environments. Every variant carries the
//! values needed to diagnose the failure without access to the input data.

use alloc::string::String;
use core::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Errors
// ============================================================================

/// Invalid run configuration, detected before any trial is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    /// Window family identifier is not supported
    UnknownWindowType {
        /// The identifier that was supplied
        name: String,
    },
    /// Connectivity measure identifier is not supported
    UnknownMeasure {
        /// The identifier that was supplied
        name: String,
    },
    /// FFT length must be positive
    InvalidFftLength {
        /// Requested FFT length
        nfft: usize,
    },
    /// Trials carry no channels
    NoChannels,
    /// Trials carry no samples
    NoSamples,
    /// Requested taper count cannot be produced for this signal length
    InvalidTaperCount {
        /// Requested number of tapers
        requested: usize,
        /// Largest number of tapers available
        max: usize,
    },
    /// DPSS time-half-bandwidth product out of range
    InvalidBandwidth {
        /// Requested time-half-bandwidth product (NW)
        half_bandwidth: f64,
        /// Signal length the tapers are generated for
        signal_length: usize,
    },
    /// Window family cannot be built for this few samples
    WindowTooShort {
        /// Signal length the window was requested for
        signal_length: usize,
        /// Shortest supported signal length
        min: usize,
    },
    /// Sampling frequency must be finite and positive
    InvalidSamplingFrequency {
        /// Requested sampling frequency in Hz
        hz: f64,
    },
    /// Worker pool size must be at least one
    InvalidThreadCount,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownWindowType { name } => write!(f, "Unknown window type: {name:?}"),
            Self::UnknownMeasure { name } => write!(f, "Unknown connectivity measure: {name:?}"),
            Self::InvalidFftLength { nfft } => {
                write!(f, "Invalid FFT length {nfft}: must be positive")
            }
            Self::NoChannels => write!(f, "Trials contain no channels"),
            Self::NoSamples => write!(f, "Trials contain no samples"),
            Self::InvalidTaperCount { requested, max } => {
                write!(f, "Invalid taper count {requested}: must be between 1 and {max}")
            }
            Self::InvalidBandwidth { half_bandwidth, signal_length } => {
                write!(
                    f,
                    "Invalid DPSS half-bandwidth {half_bandwidth} for signal length {signal_length}"
                )
            }
            Self::WindowTooShort { signal_length, min } => {
                write!(f, "Window needs at least {min} samples, got {signal_length}")
            }
            Self::InvalidSamplingFrequency { hz } => {
                write!(f, "Invalid sampling frequency: {hz} Hz")
            }
            Self::InvalidThreadCount => write!(f, "Worker pool needs at least one thread"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

// ============================================================================
// Shape Errors
// ============================================================================

/// Trial dimensions disagree with each other or with their backing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeError {
    /// Rows of a single trial have different lengths
    RaggedRows {
        /// Offending row
        row: usize,
        /// Length of the first row
        expected: usize,
        /// Length of the offending row
        got: usize,
    },
    /// Trial channel count differs from the first trial
    ChannelMismatch {
        /// Offending trial position
        trial: usize,
        /// Channel count of the first trial
        expected: usize,
        /// Channel count of the offending trial
        got: usize,
    },
    /// Trial sample count differs from the first trial
    SampleMismatch {
        /// Offending trial position
        trial: usize,
        /// Sample count of the first trial
        expected: usize,
        /// Sample count of the offending trial
        got: usize,
    },
    /// Flat buffer length does not equal channels × samples
    DataLength {
        /// channels × samples
        expected: usize,
        /// Buffer length supplied
        got: usize,
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaggedRows { row, expected, got } => {
                write!(f, "Ragged trial: row {row} has {got} samples, expected {expected}")
            }
            Self::ChannelMismatch { trial, expected, got } => {
                write!(f, "Trial {trial} has {got} channels, expected {expected}")
            }
            Self::SampleMismatch { trial, expected, got } => {
                write!(f, "Trial {trial} has {got} samples, expected {expected}")
            }
            Self::DataLength { expected, got } => {
                write!(f, "Trial buffer holds {got} values, expected {expected}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ShapeError {}

// ============================================================================
// Network Errors
// ============================================================================

/// Invalid edge insertion or query on a connectivity network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NetworkError {
    /// Edge endpoint does not name a node of this network
    NodeOutOfRange {
        /// Requested node
        node: usize,
        /// Number of nodes in the network
        node_count: usize,
    },
    /// An edge for this unordered pair already exists
    DuplicateEdge {
        /// Lower endpoint
        start: usize,
        /// Upper endpoint
        end: usize,
    },
    /// Edge weight vector length differs from the network's bin count
    BinCountMismatch {
        /// Bin count of the network
        expected: usize,
        /// Length of the rejected weight vector
        got: usize,
    },
    /// Bin range is empty or extends past the last bin
    InvalidFrequencyRange {
        /// First bin (inclusive)
        low: usize,
        /// Last bin (exclusive)
        high: usize,
        /// Bin count of the network
        bin_count: usize,
    },
    /// Frequencies in Hz need a sampling frequency on the network
    MissingSamplingFrequency,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeOutOfRange { node, node_count } => {
                write!(f, "Node {node} out of range for network with {node_count} nodes")
            }
            Self::DuplicateEdge { start, end } => {
                write!(f, "Edge ({start}, {end}) already exists")
            }
            Self::BinCountMismatch { expected, got } => {
                write!(f, "Edge has {got} frequency bins, network expects {expected}")
            }
            Self::InvalidFrequencyRange { low, high, bin_count } => {
                write!(f, "Invalid bin range [{low}, {high}) for {bin_count} bins")
            }
            Self::MissingSamplingFrequency => {
                write!(f, "Network has no sampling frequency for Hz-based ranges")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NetworkError {}

// ============================================================================
// Tests
// ============================================================================
