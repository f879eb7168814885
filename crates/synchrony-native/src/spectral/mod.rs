//! Multitaper spectral estimation
//!
//! - [`tapers`]: Hann, rectangular, and DPSS taper sets with weights
//! - [`trial`]: Per-trial PSD/CSD computation and memoization
//! - [`accumulator`]: Lock-guarded cross-trial sums
//! - [`matrix`]: Row-major storage for spectra

pub mod accumulator;
pub mod matrix;
pub mod tapers;
pub mod trial;

pub use accumulator::{AccumulatedSpectra, SpectralAccumulator};
pub use matrix::SpectralMatrix;
pub use tapers::TaperSet;
pub use trial::{TrialData, TrialProcessor, TrialSpectra};
