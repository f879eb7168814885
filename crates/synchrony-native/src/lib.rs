//! Synchrony Native - Multitaper coherence connectivity on the host
//!
//! This crate turns a set of equally shaped multichannel trials into a
//! frequency-resolved connectivity graph:
//! - Taper generation (Hann, rectangular, DPSS)
//! - Per-trial PSD and CSD, computed in parallel and memoized
//! - Cross-trial accumulation under a single lock
//! - Coherency, coherence, or imaginary coherence per channel pair
//!
//! # Modules
//!
//! - [`spectral`]: Tapers, per-trial spectra, accumulation
//! - [`connectivity`]: Settings, normalization, graph building, pipeline driver
//! - [`error`]: Pipeline error type
//!
//! # Example
//!
//! ```rust
//! use synchrony_core::{ConnectivityConfig, Trial};
//! use synchrony_native::{ConnectivityEngine, ConnectivitySettings};
//!
//! let rows: Vec<Vec<f64>> = (0..2)
//!     .map(|ch| (0..64).map(|n| (n as f64 * 0.3 + ch as f64).sin()).collect())
//!     .collect();
//! let mut settings = ConnectivitySettings::new(ConnectivityConfig::default().with_nfft(64));
//! settings.append_trial(Trial::from_rows(&rows).unwrap());
//!
//! let mut engine = ConnectivityEngine::new(settings).unwrap();
//! let network = engine.calculate().unwrap().into_network().unwrap();
//! assert_eq!(network.edge_count(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod connectivity;
pub mod error;
pub mod spectral;

// Re-export key types
pub use connectivity::{
    CoherencyMatrix, ConnectivityEngine, ConnectivityOutput, ConnectivitySettings, RunSummary,
};
pub use error::{ConnectivityError, ConnectivityResult};
pub use spectral::{TaperSet, TrialData, TrialProcessor, TrialSpectra};
