//! Connectivity network
//!
//! A [`Network`] has one node per channel and at most one edge per unordered
//! channel pair. Each edge carries one weight per half-spectrum frequency bin.
//!
//! # Ownership
//!
//! The network's edge list is the only owner of edge data. Nodes keep the
//! indices of their incident edges, and a slot table keyed by
//! [`PairIndex`] maps each pair to its edge, which is what rules out
//! duplicates:
//!
//! ```text
//! edges:  [ e0=(0,0) e1=(0,1) e2=(1,1) ]
//! node 0: [ 0, 1 ]        slots: pair(0,0)→0, pair(0,1)→1, pair(1,1)→2
//! node 1: [ 1, 2 ]
//! ```
//!
//! Construction is append-only; afterwards the network is read-only apart
//! from choosing the frequency band used by scalar edge summaries.

use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::pairs::PairIndex;
use crate::types::{frequency_bin_count, ConnectivityMeasure};

// ============================================================================
// Edge
// ============================================================================

/// Weighted, undirected edge between two channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    start: usize,
    end: usize,
    weights: Vec<f64>,
    active_bins: (usize, usize),
}

impl NetworkEdge {
    /// Create an edge between `a` and `b` with one weight per frequency bin.
    ///
    /// Endpoints are stored with the lower channel first.
    pub fn new(a: usize, b: usize, weights: Vec<f64>) -> Self {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        let active_bins = (0, weights.len());
        Self { start, end, weights, active_bins }
    }

    /// Lower endpoint
    #[inline]
    pub fn start_node(&self) -> usize {
        self.start
    }

    /// Upper endpoint
    #[inline]
    pub fn end_node(&self) -> usize {
        self.end
    }

    /// Both endpoints, lower first
    #[inline]
    pub fn endpoints(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Whether both endpoints are the same channel
    #[inline]
    pub fn is_self_loop(&self) -> bool {
        self.start == self.end
    }

    /// Endpoint opposite `node`, if `node` is an endpoint
    pub fn other(&self, node: usize) -> Option<usize> {
        if node == self.start {
            Some(self.end)
        } else if node == self.end {
            Some(self.start)
        } else {
            None
        }
    }

    /// Per-bin weights over the full half spectrum
    #[inline]
    pub fn frequency_weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of frequency bins
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.weights.len()
    }

    /// Bin range `[low, high)` used by [`NetworkEdge::weight`]
    #[inline]
    pub fn active_bins(&self) -> (usize, usize) {
        self.active_bins
    }

    /// Mean weight over the active bin range
    pub fn weight(&self) -> f64 {
        let (low, high) = self.active_bins;
        let band = &self.weights[low..high];
        if band.is_empty() {
            return 0.0;
        }
        band.iter().sum::<f64>() / band.len() as f64
    }

    fn set_active_bins(&mut self, low: usize, high: usize) {
        self.active_bins = (low, high);
    }
}

// ============================================================================
// Node
// ============================================================================

/// One channel of the network with the indices of its incident edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    id: usize,
    edges: Vec<usize>,
}

impl NetworkNode {
    fn new(id: usize) -> Self {
        Self { id, edges: Vec::new() }
    }

    /// Channel index of this node
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Indices into [`Network::edges`] of the incident edges
    #[inline]
    pub fn edge_indices(&self) -> &[usize] {
        &self.edges
    }

    /// Number of incident edges, self-loop included
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

// ============================================================================
// Network
// ============================================================================

/// Frequency-resolved connectivity graph over `n` channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Network {
    nodes: Vec<NetworkNode>,
    edges: Vec<NetworkEdge>,
    slots: Vec<Option<usize>>,
    pairs: PairIndex,
    nfft: usize,
    bin_count: usize,
    measure: ConnectivityMeasure,
    sampling_frequency: Option<f64>,
    active_bins: (usize, usize),
}

impl Network {
    /// Create a network with `n_nodes` nodes and no edges.
    ///
    /// Every edge must carry `floor(nfft / 2) + 1` weights.
    pub fn new(n_nodes: usize, nfft: usize, measure: ConnectivityMeasure) -> Self {
        let pairs = PairIndex::new(n_nodes);
        let bin_count = frequency_bin_count(nfft);
        Self {
            nodes: (0..n_nodes).map(NetworkNode::new).collect(),
            edges: Vec::with_capacity(pairs.len()),
            slots: vec![None; pairs.len()],
            pairs,
            nfft,
            bin_count,
            measure,
            sampling_frequency: None,
            active_bins: (0, bin_count),
        }
    }

    /// Attach a sampling frequency so bins can be addressed in Hz
    #[must_use]
    pub fn with_sampling_frequency(mut self, hz: f64) -> Self {
        self.sampling_frequency = Some(hz);
        self
    }

    /// Number of nodes
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the network has no edges
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// FFT length the weights were computed with
    #[inline]
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Weights per edge
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Measure the weights represent
    #[inline]
    pub fn measure(&self) -> ConnectivityMeasure {
        self.measure
    }

    /// Sampling frequency in Hz, if known
    #[inline]
    pub fn sampling_frequency(&self) -> Option<f64> {
        self.sampling_frequency
    }

    /// Bin range `[low, high)` used by scalar edge summaries
    #[inline]
    pub fn active_bins(&self) -> (usize, usize) {
        self.active_bins
    }

    /// All nodes, ordered by channel index
    #[inline]
    pub fn nodes(&self) -> &[NetworkNode] {
        &self.nodes
    }

    /// All edges
    #[inline]
    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }

    /// Node for channel `index`
    #[inline]
    pub fn node_at(&self, index: usize) -> Option<&NetworkNode> {
        self.nodes.get(index)
    }

    /// Edge at position `index` of the edge list
    #[inline]
    pub fn edge(&self, index: usize) -> Option<&NetworkEdge> {
        self.edges.get(index)
    }

    /// Edge connecting `a` and `b`, in either order
    pub fn edge_between(&self, a: usize, b: usize) -> Option<&NetworkEdge> {
        let slot = self.pairs.index(a, b)?;
        self.slots[slot].map(|idx| &self.edges[idx])
    }

    /// Edges incident to `node`
    pub fn edges_of(&self, node: usize) -> impl Iterator<Item = &NetworkEdge> + '_ {
        self.nodes
            .get(node)
            .map(NetworkNode::edge_indices)
            .unwrap_or_default()
            .iter()
            .map(move |&idx| &self.edges[idx])
    }

    /// Append an edge and attach it to both endpoint nodes.
    ///
    /// Returns the edge's position in the edge list. A self-loop is attached
    /// to its node once.
    ///
    /// # Errors
    ///
    /// Fails if an endpoint is out of range, the weight vector length differs
    /// from [`Network::bin_count`], or the pair already has an edge. The
    /// network is unchanged on error.
    pub fn append_edge(&mut self, mut edge: NetworkEdge) -> Result<usize, NetworkError> {
        let (start, end) = edge.endpoints();
        let node_count = self.nodes.len();
        if end >= node_count {
            return Err(NetworkError::NodeOutOfRange { node: end, node_count });
        }
        if edge.bin_count() != self.bin_count {
            return Err(NetworkError::BinCountMismatch {
                expected: self.bin_count,
                got: edge.bin_count(),
            });
        }

        let slot = self
            .pairs
            .index(start, end)
            .ok_or(NetworkError::NodeOutOfRange { node: end, node_count })?;
        if self.slots[slot].is_some() {
            return Err(NetworkError::DuplicateEdge { start, end });
        }

        let idx = self.edges.len();
        edge.set_active_bins(self.active_bins.0, self.active_bins.1);
        self.edges.push(edge);
        self.slots[slot] = Some(idx);
        self.nodes[start].edges.push(idx);
        if start != end {
            self.nodes[end].edges.push(idx);
        }
        Ok(idx)
    }

    /// Reorder edges by pair index and rebuild node adjacency.
    ///
    /// Concurrent construction appends edges in completion order; this gives
    /// every run the same layout regardless of scheduling.
    pub fn canonicalize(&mut self) {
        let mut taken: Vec<Option<NetworkEdge>> = self.edges.drain(..).map(Some).collect();
        for node in &mut self.nodes {
            node.edges.clear();
        }

        for slot in &mut self.slots {
            let Some(old_idx) = *slot else { continue };
            let Some(edge) = taken[old_idx].take() else { continue };
            let (start, end) = edge.endpoints();
            let idx = self.edges.len();
            self.edges.push(edge);
            *slot = Some(idx);
            self.nodes[start].edges.push(idx);
            if start != end {
                self.nodes[end].edges.push(idx);
            }
        }
    }

    /// Restrict scalar summaries to bins `[low, high)`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidFrequencyRange`] if the range is empty
    /// or extends past the last bin.
    pub fn set_bin_range(&mut self, low: usize, high: usize) -> Result<(), NetworkError> {
        if low >= high || high > self.bin_count {
            return Err(NetworkError::InvalidFrequencyRange {
                low,
                high,
                bin_count: self.bin_count,
            });
        }
        self.active_bins = (low, high);
        for edge in &mut self.edges {
            edge.set_active_bins(low, high);
        }
        Ok(())
    }

    /// Restrict scalar summaries to frequencies `[low_hz, high_hz]`.
    ///
    /// Both limits are rounded to the nearest bin; the upper bin is included.
    ///
    /// # Errors
    ///
    /// Fails without a sampling frequency or if the range selects no bins.
    pub fn set_frequency_range(&mut self, low_hz: f64, high_hz: f64) -> Result<(), NetworkError> {
        let fs = self.sampling_frequency.ok_or(NetworkError::MissingSamplingFrequency)?;
        let to_bin = |hz: f64| libm::round(hz.max(0.0) * self.nfft as f64 / fs) as usize;
        let low = to_bin(low_hz);
        let high = to_bin(high_hz).saturating_add(1).min(self.bin_count);
        self.set_bin_range(low, high)
    }

    /// Number of edges to other nodes (self-loop excluded)
    pub fn degree(&self, node: usize) -> usize {
        self.edges_of(node).filter(|e| !e.is_self_loop()).count()
    }

    /// Sum of scalar weights of edges to other nodes (self-loop excluded)
    pub fn strength(&self, node: usize) -> f64 {
        self.edges_of(node).filter(|e| !e.is_self_loop()).map(NetworkEdge::weight).sum()
    }

    /// Smallest and largest scalar edge weight, self-loops excluded
    pub fn min_max_weights(&self) -> Option<(f64, f64)> {
        self.edges
            .iter()
            .filter(|e| !e.is_self_loop())
            .map(NetworkEdge::weight)
            .fold(None, |acc, w| match acc {
                None => Some((w, w)),
                Some((lo, hi)) => Some((lo.min(w), hi.max(w))),
            })
    }

    /// Dense symmetric `n × n` matrix of scalar weights, row-major.
    ///
    /// Pairs without an edge are zero.
    pub fn connectivity_matrix(&self) -> Vec<f64> {
        let n = self.nodes.len();
        let mut matrix = vec![0.0; n * n];
        for edge in &self.edges {
            let (i, j) = edge.endpoints();
            let w = edge.weight();
            matrix[i * n + j] = w;
            matrix[j * n + i] = w;
        }
        matrix
    }

    /// Copy of this network keeping only edges with `|weight| >= threshold`.
    ///
    /// The node set and frequency band are preserved.
    #[must_use]
    pub fn thresholded(&self, threshold: f64) -> Self {
        let mut out = self.clone();
        for slot in &mut out.slots {
            let Some(idx) = *slot else { continue };
            let keep = self.edges[idx].weight().abs() >= threshold;
            if !keep {
                *slot = None;
            }
        }
        // Unreferenced edges are dropped and adjacency rebuilt
        out.canonicalize();
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
