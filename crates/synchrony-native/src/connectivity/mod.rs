//! Connectivity estimation
//!
//! - [`settings`]: Configuration plus the trial collection
//! - [`coherency`]: Coherency, coherence, and imaginary coherence transforms
//! - [`builder`]: Lock-guarded graph construction
//! - [`engine`]: Two-phase parallel pipeline driver

pub mod builder;
pub mod coherency;
pub mod engine;
pub mod settings;

pub use builder::NetworkBuilder;
pub use coherency::CoherencyMatrix;
pub use engine::{ConnectivityEngine, ConnectivityOutput, RunSummary};
pub use settings::ConnectivitySettings;
