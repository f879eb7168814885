//! Concurrent graph construction
//!
//! Pair tasks normalize without locking, then hand their edge to the
//! [`NetworkBuilder`], which appends it and links both endpoint nodes under
//! one lock. No reader can observe an edge attached to only one node.

use parking_lot::Mutex;
use rayon::prelude::*;

use synchrony_core::network::{Network, NetworkEdge};
use synchrony_core::pairs::PairIndex;

use crate::error::ConnectivityResult;
use crate::spectral::AccumulatedSpectra;

use super::coherency::{coherency_row, edge_weights};

/// A [`Network`] under construction, shared by pair tasks.
#[derive(Debug)]
pub struct NetworkBuilder {
    network: Mutex<Network>,
}

impl NetworkBuilder {
    /// Start from an empty network
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self { network: Mutex::new(network) }
    }

    /// Append an edge and link it to its endpoints in one critical section.
    ///
    /// # Errors
    ///
    /// Fails on out-of-range endpoints, a wrong bin count, or a duplicate pair.
    pub fn attach(&self, edge: NetworkEdge) -> ConnectivityResult<usize> {
        Ok(self.network.lock().append_edge(edge)?)
    }

    /// Normalize every pair of `spectra` in parallel and attach the edges.
    ///
    /// Must run on the worker pool that should execute the pair tasks.
    /// Measures without a scalar transform attach nothing.
    ///
    /// # Errors
    ///
    /// Returns the first attach failure.
    pub fn attach_all(&self, spectra: &AccumulatedSpectra) -> ConnectivityResult<()> {
        let pairs = PairIndex::new(spectra.n_channels());
        let measure = self.network.lock().measure();
        let psd = spectra.psd_sum();

        pairs.iter().collect::<Vec<_>>().into_par_iter().enumerate().try_for_each(|(idx, (i, j))| {
            let coherency = coherency_row(spectra.csd_sum().row(idx), psd.row(i), psd.row(j));
            match edge_weights(measure, &coherency) {
                Some(weights) => self.attach(NetworkEdge::new(i, j, weights)).map(|_| ()),
                None => Ok(()),
            }
        })
    }

    /// Number of edges attached so far
    pub fn edge_count(&self) -> usize {
        self.network.lock().edge_count()
    }

    /// Release the network with edges in pair order
    pub fn finish(self) -> Network {
        let mut network = self.network.into_inner();
        network.canonicalize();
        network
    }
}
