//! Running PSD/CSD sums across trials
//!
//! Trial tasks merge their spectra into one shared [`SpectralAccumulator`].
//! The merge is the only critical section; spectral computation runs outside
//! the lock. Addition is commutative, so any completion order yields the same
//! sums up to floating-point rounding.

use parking_lot::Mutex;
use rustfft::num_complex::Complex64;

use synchrony_core::pairs::PairIndex;

use super::matrix::SpectralMatrix;
use super::trial::TrialSpectra;

/// PSD and CSD summed over every merged trial.
#[derive(Clone, Debug, PartialEq)]
pub struct AccumulatedSpectra {
    psd_sum: SpectralMatrix<f64>,
    csd_sum: SpectralMatrix<Complex64>,
    trial_count: usize,
    finalized: bool,
}

impl AccumulatedSpectra {
    /// Start the sums from one trial's spectra
    #[must_use]
    pub fn from_trial(spectra: &TrialSpectra) -> Self {
        Self {
            psd_sum: spectra.psd().clone(),
            csd_sum: spectra.csd().clone(),
            trial_count: 1,
            finalized: false,
        }
    }

    /// Add one trial's spectra element-wise
    pub fn add(&mut self, spectra: &TrialSpectra) {
        debug_assert!(!self.finalized, "merge after finalize");
        self.psd_sum.add_assign_elementwise(spectra.psd());
        self.csd_sum.add_assign_elementwise(spectra.csd());
        self.trial_count += 1;
    }

    /// Take the element-wise square root of the PSD sum.
    ///
    /// Runs once, after the last merge; further calls do nothing.
    pub fn finalize(&mut self) {
        if !self.finalized {
            self.psd_sum.map_in_place(f64::sqrt);
            self.finalized = true;
        }
    }

    /// Whether [`AccumulatedSpectra::finalize`] has run
    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of merged trials
    #[inline]
    pub fn trial_count(&self) -> usize {
        self.trial_count
    }

    /// Number of channels
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.psd_sum.rows()
    }

    /// Number of frequency bins
    #[inline]
    pub fn n_freqs(&self) -> usize {
        self.psd_sum.cols()
    }

    /// Summed PSD (square-rooted once finalized)
    #[inline]
    pub fn psd_sum(&self) -> &SpectralMatrix<f64> {
        &self.psd_sum
    }

    /// Summed CSD, rows in [`PairIndex`] order
    #[inline]
    pub fn csd_sum(&self) -> &SpectralMatrix<Complex64> {
        &self.csd_sum
    }

    /// Summed CSD row for the pair `(i, j)`
    pub fn csd_pair(&self, i: usize, j: usize) -> Option<&[Complex64]> {
        let idx = PairIndex::new(self.n_channels()).index(i, j)?;
        Some(self.csd_sum.row(idx))
    }
}

/// Thread-safe accumulator guarded by a single mutex.
#[derive(Debug, Default)]
pub struct SpectralAccumulator {
    state: Mutex<Option<AccumulatedSpectra>>,
}

impl SpectralAccumulator {
    /// Empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one trial. The first merge copies, later merges add.
    pub fn merge(&self, spectra: &TrialSpectra) {
        let mut state = self.state.lock();
        match state.as_mut() {
            Some(acc) => acc.add(spectra),
            None => *state = Some(AccumulatedSpectra::from_trial(spectra)),
        }
    }

    /// Number of trials merged so far
    pub fn merged_count(&self) -> usize {
        self.state.lock().as_ref().map_or(0, AccumulatedSpectra::trial_count)
    }

    /// Consume the accumulator; `None` if nothing was merged
    pub fn into_inner(self) -> Option<AccumulatedSpectra> {
        self.state.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::tapers::TaperSet;
    use crate::spectral::trial::TrialProcessor;
    use rayon::prelude::*;
    use synchrony_core::types::{Trial, WindowType};

    fn trials(count: usize) -> Vec<Trial> {
        (0..count)
            .map(|t| {
                let rows: Vec<Vec<f64>> = (0..3)
                    .map(|ch| {
                        (0..48)
                            .map(|n| ((n * (ch + 1)) as f64 * 0.21 + t as f64 * 0.7).sin())
                            .collect()
                    })
                    .collect();
                Trial::from_rows(&rows).unwrap()
            })
            .collect()
    }

    fn max_abs_diff(a: &AccumulatedSpectra, b: &AccumulatedSpectra) -> f64 {
        let psd = a.psd_sum().as_slice().iter().zip(b.psd_sum().as_slice()).map(|(x, y)| (x - y).abs());
        let csd = a.csd_sum().as_slice().iter().zip(b.csd_sum().as_slice()).map(|(x, y)| (x - y).norm());
        psd.chain(csd).fold(0.0, f64::max)
    }

    #[test]
    fn test_first_merge_copies() {
        let tapers = TaperSet::generate(48, WindowType::Hanning).unwrap();
        let processor = TrialProcessor::new(&tapers, 64, 3);
        let spectra = processor.compute(&trials(1)[0]);

        let acc = SpectralAccumulator::new();
        acc.merge(&spectra);
        let result = acc.into_inner().unwrap();
        assert_eq!(result.trial_count(), 1);
        assert_eq!(result.psd_sum(), spectra.psd());
        assert_eq!(result.csd_sum(), spectra.csd());
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = SpectralAccumulator::new();
        assert_eq!(acc.merged_count(), 0);
        assert!(acc.into_inner().is_none());
    }

    #[test]
    fn test_order_independence() {
        let tapers = TaperSet::generate(48, WindowType::dpss(2.0)).unwrap();
        let processor = TrialProcessor::new(&tapers, 48, 3);
        let spectra: Vec<_> = trials(6).iter().map(|t| processor.compute(t)).collect();

        let forward = SpectralAccumulator::new();
        spectra.iter().for_each(|s| forward.merge(s));
        let reversed = SpectralAccumulator::new();
        spectra.iter().rev().for_each(|s| reversed.merge(s));
        let parallel = SpectralAccumulator::new();
        spectra.par_iter().for_each(|s| parallel.merge(s));

        let forward = forward.into_inner().unwrap();
        let reversed = reversed.into_inner().unwrap();
        let parallel = parallel.into_inner().unwrap();

        assert_eq!(parallel.trial_count(), 6);
        assert!(max_abs_diff(&forward, &reversed) < 1e-9);
        assert!(max_abs_diff(&forward, &parallel) < 1e-9);
    }

    #[test]
    fn test_finalize_takes_sqrt_once() {
        let tapers = TaperSet::generate(48, WindowType::Hanning).unwrap();
        let processor = TrialProcessor::new(&tapers, 48, 3);
        let spectra: Vec<_> = trials(2).iter().map(|t| processor.compute(t)).collect();

        let acc = SpectralAccumulator::new();
        spectra.iter().for_each(|s| acc.merge(s));
        let mut result = acc.into_inner().unwrap();
        let raw = result.psd_sum().clone();

        result.finalize();
        result.finalize();
        assert!(result.is_finalized());
        for (r, s) in raw.as_slice().iter().zip(result.psd_sum().as_slice()) {
            assert!((r.sqrt() - s).abs() < 1e-12);
        }
    }
}
