//! Per-trial multitaper PSD and CSD
//!
//! For every channel the processor removes the mean, applies each taper,
//! takes the half-spectrum FFT of length `nfft`, and scales by the taper
//! weight. PSD rows and upper-triangle CSD rows are then reduced over tapers:
//!
//! ```text
//! PSD_i(f)  = Σ_k |X_ik(f)|²           / (Σ_k w_k² / 2)
//! CSD_ij(f) = Σ_k X_ik(f) · conj X_jk(f) / (Σ_k w_k² / 2)
//! ```
//!
//! Bin 0, and the Nyquist bin when `nfft` is even, are halved once more to
//! undo the doubling implied by folding the spectrum.

use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use synchrony_core::pairs::PairIndex;
use synchrony_core::types::{frequency_bin_count, Trial};

use super::matrix::SpectralMatrix;
use super::tapers::TaperSet;

// ============================================================================
// Trial Spectra
// ============================================================================

/// PSD and CSD of one trial.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialSpectra {
    psd: SpectralMatrix<f64>,
    csd: SpectralMatrix<Complex64>,
}

impl TrialSpectra {
    /// Assemble spectra from precomputed matrices.
    ///
    /// `psd` is `channels × bins`; `csd` is `pairs × bins` in [`PairIndex`]
    /// order.
    #[must_use]
    pub fn from_parts(psd: SpectralMatrix<f64>, csd: SpectralMatrix<Complex64>) -> Self {
        Self { psd, csd }
    }

    /// Number of channels
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.psd.rows()
    }

    /// Number of frequency bins
    #[inline]
    pub fn n_freqs(&self) -> usize {
        self.psd.cols()
    }

    /// `channels × bins` power spectral density
    #[inline]
    pub fn psd(&self) -> &SpectralMatrix<f64> {
        &self.psd
    }

    /// `pairs × bins` cross-spectral density, rows in [`PairIndex`] order
    #[inline]
    pub fn csd(&self) -> &SpectralMatrix<Complex64> {
        &self.csd
    }

    /// Cross-spectrum row for the pair `(i, j)`, `i <= j`
    pub fn csd_pair(&self, i: usize, j: usize) -> Option<&[Complex64]> {
        let idx = PairIndex::new(self.n_channels()).index(i, j)?;
        Some(self.csd.row(idx))
    }

    /// Whether these spectra were computed for the given dimensions
    pub fn matches(&self, n_channels: usize, n_freqs: usize) -> bool {
        self.psd.has_shape(n_channels, n_freqs)
            && self.csd.has_shape(PairIndex::new(n_channels).len(), n_freqs)
    }
}

// ============================================================================
// Trial Data
// ============================================================================

/// A trial together with its memoized spectra.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialData {
    trial: Trial,
    spectra: Option<TrialSpectra>,
}

impl TrialData {
    /// Wrap a trial with no spectra computed yet
    #[must_use]
    pub fn new(trial: Trial) -> Self {
        Self { trial, spectra: None }
    }

    /// The input trial
    #[inline]
    pub fn trial(&self) -> &Trial {
        &self.trial
    }

    /// Memoized spectra, if any run has computed them
    #[inline]
    pub fn spectra(&self) -> Option<&TrialSpectra> {
        self.spectra.as_ref()
    }

    /// Drop memoized spectra
    pub fn clear_spectra(&mut self) {
        self.spectra = None;
    }
}

impl From<Trial> for TrialData {
    fn from(trial: Trial) -> Self {
        Self::new(trial)
    }
}

// ============================================================================
// Trial Processor
// ============================================================================

/// Computes [`TrialSpectra`] for trials sharing one taper set and FFT length.
///
/// The processor is `Sync`: the planned FFT and tapers are read-only, and
/// every call allocates its own buffers.
pub struct TrialProcessor<'a> {
    tapers: &'a TaperSet,
    fft: Arc<dyn Fft<f64>>,
    nfft: usize,
    n_channels: usize,
    n_freqs: usize,
}

impl<'a> TrialProcessor<'a> {
    /// Create a processor for `n_channels`-channel trials.
    ///
    /// `nfft` must be at least the taper length; shorter trials are
    /// zero-padded.
    #[must_use]
    pub fn new(tapers: &'a TaperSet, nfft: usize, n_channels: usize) -> Self {
        debug_assert!(nfft >= tapers.signal_length());
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(nfft);
        Self { tapers, fft, nfft, n_channels, n_freqs: frequency_bin_count(nfft) }
    }

    /// FFT length
    #[inline]
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Half-spectrum bin count
    #[inline]
    pub fn n_freqs(&self) -> usize {
        self.n_freqs
    }

    /// Return memoized spectra for `data`, computing them first if absent
    /// or computed for other dimensions.
    ///
    /// The flag is `true` when the memoized result was reused.
    pub fn process<'t>(&self, data: &'t mut TrialData) -> (&'t TrialSpectra, bool) {
        let TrialData { trial, spectra } = data;
        let cached = spectra
            .as_ref()
            .is_some_and(|s| s.matches(self.n_channels, self.n_freqs));
        if cached {
            tracing::trace!("trial spectra already computed, reusing");
        } else {
            *spectra = None;
        }
        let computed: &'t TrialSpectra = spectra.get_or_insert_with(|| self.compute(trial));
        (computed, cached)
    }

    /// Compute PSD and CSD for one trial.
    ///
    /// The trial must have `n_channels` rows of the taper length.
    pub fn compute(&self, trial: &Trial) -> TrialSpectra {
        let n_tapers = self.tapers.count();
        let denom = self.tapers.weight_energy() / 2.0;
        let nfft_even = self.nfft % 2 == 0;

        let mut buffer = vec![Complex64::default(); self.nfft];
        let mut scratch = vec![Complex64::default(); self.fft.get_inplace_scratch_len()];

        // Row `ch * n_tapers + k` holds channel `ch` under taper `k`
        let mut tapered = SpectralMatrix::<Complex64>::zeros(self.n_channels * n_tapers, self.n_freqs);
        let mut psd = SpectralMatrix::<f64>::zeros(self.n_channels, self.n_freqs);

        for ch in 0..self.n_channels {
            let row = trial.row(ch);
            let mean = if row.is_empty() { 0.0 } else { row.iter().sum::<f64>() / row.len() as f64 };

            for k in 0..n_tapers {
                let taper = self.tapers.taper(k);
                let weight = self.tapers.weights()[k];

                for (slot, (&x, &h)) in buffer.iter_mut().zip(row.iter().zip(taper)) {
                    *slot = Complex64::new((x - mean) * h, 0.0);
                }
                for slot in &mut buffer[row.len()..] {
                    *slot = Complex64::default();
                }
                self.fft.process_with_scratch(&mut buffer, &mut scratch);

                let out = tapered.row_mut(ch * n_tapers + k);
                for (o, &b) in out.iter_mut().zip(&buffer[..self.n_freqs]) {
                    *o = b * weight;
                }
            }

            let psd_row = psd.row_mut(ch);
            for k in 0..n_tapers {
                for (p, x) in psd_row.iter_mut().zip(tapered.row(ch * n_tapers + k)) {
                    *p += x.norm_sqr();
                }
            }
            for p in psd_row.iter_mut() {
                *p /= denom;
            }
            halve_folded_bins(psd_row, nfft_even);
        }

        let pairs = PairIndex::new(self.n_channels);
        let mut csd = SpectralMatrix::<Complex64>::zeros(pairs.len(), self.n_freqs);
        for (idx, (i, j)) in pairs.iter().enumerate() {
            let csd_row = csd.row_mut(idx);
            for k in 0..n_tapers {
                let xi = tapered.row(i * n_tapers + k);
                let xj = tapered.row(j * n_tapers + k);
                for ((c, a), b) in csd_row.iter_mut().zip(xi).zip(xj) {
                    *c += a * b.conj();
                }
            }
            for c in csd_row.iter_mut() {
                *c /= denom;
            }
            halve_folded_bins(csd_row, nfft_even);
        }

        TrialSpectra { psd, csd }
    }
}

/// Halve bin 0 and, for even `nfft`, the Nyquist bin.
fn halve_folded_bins<T: std::ops::DivAssign<f64>>(row: &mut [T], nfft_even: bool) {
    if let Some(first) = row.first_mut() {
        *first /= 2.0;
    }
    if nfft_even && row.len() > 1 {
        if let Some(last) = row.last_mut() {
            *last /= 2.0;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
