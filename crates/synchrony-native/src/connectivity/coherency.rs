//! Normalization of accumulated spectra into coherency-family measures
//!
//! For each pair `(i, j)` the accumulated cross-spectrum is divided by the
//! product of the square-rooted PSD sums:
//!
//! ```text
//! C_ij(f) = CSD_ij(f) / (sqrt(PSD_i(f)) · sqrt(PSD_j(f)))
//! ```
//!
//! Every trial contributes the same normalization constant to both sums, so
//! the trial count cancels. The measure then selects the complex value, its
//! magnitude, or its imaginary part.

use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use synchrony_core::network::{Network, NetworkEdge};
use synchrony_core::pairs::PairIndex;
use synchrony_core::types::{frequency_bin_count, ConnectivityMeasure};

use crate::error::ConnectivityResult;
use crate::spectral::AccumulatedSpectra;

/// Complex coherency of one pair, bin by bin.
///
/// `psd_i` and `psd_j` are square-rooted PSD sums. A zero denominator (a flat
/// channel) yields zero instead of NaN.
pub fn coherency_row(csd: &[Complex64], psd_i: &[f64], psd_j: &[f64]) -> Vec<Complex64> {
    csd.iter()
        .zip(psd_i.iter().zip(psd_j))
        .map(|(&c, (&a, &b))| {
            let denom = a * b;
            if denom > 0.0 {
                c / denom
            } else {
                Complex64::default()
            }
        })
        .collect()
}

/// Real-valued edge weights for `measure`.
///
/// Returns `None` for [`ConnectivityMeasure::Coherency`], which has no scalar
/// transform.
pub fn edge_weights(measure: ConnectivityMeasure, coherency: &[Complex64]) -> Option<Vec<f64>> {
    match measure {
        ConnectivityMeasure::Coherency => None,
        ConnectivityMeasure::Coherence => Some(coherency.iter().map(|c| c.norm()).collect()),
        ConnectivityMeasure::ImagCoherence => Some(coherency.iter().map(|c| c.im).collect()),
    }
}

/// Complex coherency for every channel pair.
///
/// Rows follow [`PairIndex`] order and hold the upper-triangle value
/// `C_ij`, `i <= j`.
#[derive(Clone, Debug, PartialEq)]
pub struct CoherencyMatrix {
    pairs: PairIndex,
    nfft: usize,
    n_freqs: usize,
    values: Vec<Complex64>,
}

impl CoherencyMatrix {
    /// Normalize finalized spectra, one parallel task per pair.
    ///
    /// Must run on the worker pool that should execute the pair tasks.
    pub fn from_accumulated(spectra: &AccumulatedSpectra, nfft: usize) -> Self {
        debug_assert!(spectra.is_finalized());
        let pairs = PairIndex::new(spectra.n_channels());
        let n_freqs = spectra.n_freqs();
        let psd = spectra.psd_sum();

        let rows: Vec<Vec<Complex64>> = pairs
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .enumerate()
            .map(|(idx, (i, j))| coherency_row(spectra.csd_sum().row(idx), psd.row(i), psd.row(j)))
            .collect();

        Self { pairs, nfft, n_freqs, values: rows.concat() }
    }

    /// Matrix over zero channels
    pub(crate) fn empty(nfft: usize) -> Self {
        Self { pairs: PairIndex::new(0), nfft, n_freqs: frequency_bin_count(nfft), values: Vec::new() }
    }

    /// Whether there are no channel pairs
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of channels
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.pairs.n_channels()
    }

    /// Number of frequency bins
    #[inline]
    pub fn n_freqs(&self) -> usize {
        self.n_freqs
    }

    /// FFT length the spectra were computed with
    #[inline]
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Pair layout
    #[inline]
    pub fn pairs(&self) -> PairIndex {
        self.pairs
    }

    /// Coherency row at linear pair index `idx`
    pub fn pair_row(&self, idx: usize) -> Option<&[Complex64]> {
        let start = idx.checked_mul(self.n_freqs)?;
        self.values.get(start..start + self.n_freqs)
    }

    /// Coherency `C_ij` at every bin.
    ///
    /// Conjugated when `j < i`, since `C_ji = conj(C_ij)`.
    pub fn get(&self, i: usize, j: usize) -> Option<Vec<Complex64>> {
        let row = self.pair_row(self.pairs.index(i, j)?)?;
        if j < i {
            Some(row.iter().map(Complex64::conj).collect())
        } else {
            Some(row.to_vec())
        }
    }

    /// Materialize a graph with the scalar transform of `measure`.
    ///
    /// [`ConnectivityMeasure::Coherency`] falls back to coherence magnitude.
    ///
    /// # Errors
    ///
    /// Propagates graph construction errors, which indicate a layout bug.
    pub fn to_network(&self, measure: ConnectivityMeasure) -> ConnectivityResult<Network> {
        let measure = if measure.produces_network() { measure } else { ConnectivityMeasure::Coherence };
        debug_assert_eq!(frequency_bin_count(self.nfft), self.n_freqs);

        let mut network = Network::new(self.n_channels(), self.nfft, measure);
        for (idx, (i, j)) in self.pairs.iter().enumerate() {
            let Some(row) = self.pair_row(idx) else { continue };
            if let Some(weights) = edge_weights(measure, row) {
                network.append_edge(NetworkEdge::new(i, j, weights))?;
            }
        }
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} vs {b}");
    }

    #[test]
    fn test_coherency_row_normalizes() {
        let csd = [Complex64::new(2.0, 2.0), Complex64::new(0.0, -3.0)];
        let row = coherency_row(&csd, &[2.0, 3.0], &[2.0, 1.0]);
        assert_close(row[0].re, 0.5);
        assert_close(row[0].im, 0.5);
        assert_close(row[1].im, -1.0);
    }

    #[test]
    fn test_zero_psd_gives_zero() {
        let csd = [Complex64::new(1.0, 1.0)];
        let row = coherency_row(&csd, &[0.0], &[1.0]);
        assert_eq!(row[0], Complex64::default());
    }

    #[test]
    fn test_edge_weight_transforms() {
        let q = [Complex64::new(0.6, 0.8), Complex64::new(0.0, -0.5)];
        let mag = edge_weights(ConnectivityMeasure::Coherence, &q).unwrap();
        assert_close(mag[0], 1.0);
        assert_close(mag[1], 0.5);

        let imag = edge_weights(ConnectivityMeasure::ImagCoherence, &q).unwrap();
        assert_close(imag[0], 0.8);
        assert_close(imag[1], -0.5);

        assert!(edge_weights(ConnectivityMeasure::Coherency, &q).is_none());
    }

    fn sample_matrix() -> CoherencyMatrix {
        // 2 channels, nfft 2 → 2 bins, pairs (0,0) (0,1) (1,1)
        let values = vec![
            Complex64::new(1.0, 0.0),
            Complex64::new(1.0, 0.0),
            Complex64::new(0.3, 0.4),
            Complex64::new(0.0, -0.2),
            Complex64::new(1.0, 0.0),
            Complex64::new(1.0, 0.0),
        ];
        CoherencyMatrix { pairs: PairIndex::new(2), nfft: 2, n_freqs: 2, values }
    }

    #[test]
    fn test_get_conjugates_lower_triangle() {
        let matrix = sample_matrix();
        let upper = matrix.get(0, 1).unwrap();
        let lower = matrix.get(1, 0).unwrap();
        assert_eq!(upper[0], Complex64::new(0.3, 0.4));
        assert_eq!(lower[0], Complex64::new(0.3, -0.4));
        assert!(matrix.get(0, 2).is_none());
    }

    #[test]
    fn test_to_network() {
        let network = sample_matrix().to_network(ConnectivityMeasure::ImagCoherence).unwrap();
        assert_eq!(network.edge_count(), 3);
        assert_eq!(network.bin_count(), 2);
        let edge = network.edge_between(1, 0).unwrap();
        assert_close(edge.frequency_weights()[0], 0.4);
        assert_close(edge.frequency_weights()[1], -0.2);

        let fallback = sample_matrix().to_network(ConnectivityMeasure::Coherency).unwrap();
        assert_eq!(fallback.measure(), ConnectivityMeasure::Coherence);
        assert_close(fallback.edge_between(0, 1).unwrap().frequency_weights()[0], 0.5);
    }

    #[test]
    fn test_from_accumulated_rows_follow_pair_order() {
        use crate::spectral::{TaperSet, TrialProcessor};
        use synchrony_core::types::{Trial, WindowType};

        let rows: Vec<Vec<f64>> = (0..4)
            .map(|ch| (0..32).map(|n| ((n * (ch + 2)) as f64 * 0.37).sin() + ch as f64).collect())
            .collect();
        let trial = Trial::from_rows(&rows).unwrap();
        let tapers = TaperSet::generate(32, WindowType::Hanning).unwrap();
        let spectra = TrialProcessor::new(&tapers, 32, 4).compute(&trial);
        let mut accumulated = AccumulatedSpectra::from_trial(&spectra);
        accumulated.finalize();

        let matrix = CoherencyMatrix::from_accumulated(&accumulated, 32);
        assert_eq!(matrix.n_channels(), 4);
        assert_eq!(matrix.n_freqs(), 17);

        let psd = accumulated.psd_sum();
        for (idx, (i, j)) in matrix.pairs().iter().enumerate() {
            let expected = coherency_row(accumulated.csd_sum().row(idx), psd.row(i), psd.row(j));
            assert_eq!(matrix.pair_row(idx).unwrap(), expected.as_slice(), "pair ({i}, {j})");
        }
        // Self-coherency is one wherever the channel has power
        let diagonal = matrix.get(3, 3).unwrap();
        assert!(diagonal.iter().all(|c| (c.norm() - 1.0).abs() < 1e-9 && c.im.abs() < 1e-9));
    }
}
