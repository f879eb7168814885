//! Synchrony Core - `no_std` data model for spectral connectivity
//!
//! This crate provides the types shared by every consumer of the Synchrony
//! connectivity pipeline. It needs only `alloc`, so the same trial and network
//! types can be used on the host and in constrained environments.
//!
//! # Modules
//!
//! - [`types`]: Trials, window families, connectivity measures, frequency axis
//! - [`config`]: Run configuration (FFT length, window, measure, threads)
//! - [`pairs`]: Triangular channel-pair linearization
//! - [`network`]: Connectivity graph (nodes, edges, adjacency queries)
//! - [`error`]: Configuration, shape, and graph error types
//!
//! # Features
//!
//! - `std`: Enable standard library support (`std::error::Error` impls)
//!
//! # Example
//!
//! ```rust
//! use synchrony_core::pairs::PairIndex;
//!
//! // Three channels give six unordered pairs, self-pairs included
//! let pairs = PairIndex::new(3);
//! assert_eq!(pairs.len(), 6);
//! assert_eq!(pairs.index(1, 2), Some(4));
//! assert_eq!(pairs.pair(4), Some((1, 2)));
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod error;
pub mod network;
pub mod pairs;
pub mod types;

// Re-export commonly used types at crate root
pub use config::ConnectivityConfig;
pub use error::{ConfigError, NetworkError, ShapeError};
pub use network::{Network, NetworkEdge, NetworkNode};
pub use pairs::PairIndex;
pub use types::{ConnectivityMeasure, Trial, WindowType};
